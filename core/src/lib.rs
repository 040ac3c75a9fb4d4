//! Unified REST/SOAP API client core.
//!
//! # Overview
//! Callers describe a call as an `ApiRequest` and hand it to the
//! `DispatchService`, which picks a protocol client, resolves a pooled
//! transport from the URL, and folds every outcome into an `ApiResponse`.
//! Nothing on the dispatch path panics or returns an error for a failed
//! call; failures are data on the response.
//!
//! # Design
//! - `RestClient` and `SoapClient` are stateless. Each splits a call into
//!   `build_request` and `parse_response`, so the I/O boundary stays
//!   explicit and both halves are testable without a network.
//! - `Transport` is the only trait that touches the network. The default
//!   implementation is a `ureq` agent per transport profile.
//! - `ProfileRegistry` maps URL patterns to transports: pre-built ones
//!   first, then profile-built ones, then the default.
//! - With mocking enabled, the `MockRouter` answers every call and no
//!   transport is touched.

pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod mock;
pub mod pattern;
pub mod protocol;
pub mod registry;
pub mod request;
pub mod response;
pub mod retry;
pub mod soap;
pub mod transport;

pub use client::RestClient;
pub use config::{ApiConfig, TransportProfile, TransportSettings};
pub use dispatch::{ApiCallback, DispatchService};
pub use error::{codes, ApiError, ConfigError, Result, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use mock::{MockHandler, MockResponse, MockRouter, PaymentMock, UserServiceMock};
pub use protocol::Protocol;
pub use registry::ProfileRegistry;
pub use request::{ApiRequest, Body};
pub use response::{ApiResponse, ErrorDetail};
pub use soap::SoapClient;
pub use transport::{Transport, TransportFactory, UreqTransport, UreqTransportFactory};
