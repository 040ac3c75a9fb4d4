//! Façade that routes a request to a transport and a protocol backend.
//!
//! # Design
//! Synchronous calls run on the caller's thread and never fail: transport,
//! serialization and configuration problems are folded into an error
//! `ApiResponse`. Async calls run on the blocking pool of a runtime owned
//! by the service and report through an `ApiCallback`, which fires on a
//! pool thread. With a mock router attached, every call is answered by the
//! router and no transport is touched.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error, info};

use crate::client::RestClient;
use crate::error::{codes, ApiError, ConfigError, Result};
use crate::mock::MockRouter;
use crate::protocol::{self, Protocol};
use crate::registry::ProfileRegistry;
use crate::request::ApiRequest;
use crate::response::ApiResponse;
use crate::soap::SoapClient;
use crate::transport::Transport;

/// Receives the outcome of an async call. Exactly one method is invoked.
pub trait ApiCallback<T>: Send + 'static {
    /// 2xx response without a recorded error.
    fn on_success(&self, response: ApiResponse<T>);

    /// Non-2xx status or an error recorded on the response.
    fn on_error(&self, response: ApiResponse<T>);

    /// The call produced no response: the transport failed or the body
    /// could not be (de)serialized.
    fn on_exception(&self, error: ApiError);
}

/// Sends requests over the transport the registry picks for their URL.
pub struct DispatchService {
    dispatcher: Dispatcher,
    runtime: Option<Runtime>,
}

#[derive(Debug, Clone)]
struct Dispatcher {
    registry: Arc<ProfileRegistry>,
    mock_router: Option<Arc<MockRouter>>,
    rest: RestClient,
    soap: SoapClient,
}

impl DispatchService {
    /// A service over `registry`. If the registry's config enables mocking,
    /// an empty mock router is attached.
    pub fn new(registry: Arc<ProfileRegistry>) -> std::result::Result<Self, ConfigError> {
        let mock_router = registry
            .config()
            .enable_mocking
            .then(|| Arc::new(MockRouter::new()));
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("api-dispatch")
            .build()
            .map_err(|e| ConfigError::Executor(e.to_string()))?;
        Ok(Self {
            dispatcher: Dispatcher {
                registry,
                mock_router,
                rest: RestClient,
                soap: SoapClient,
            },
            runtime: Some(runtime),
        })
    }

    /// Answer every call from `router` instead of the network.
    pub fn with_mock_router(mut self, router: Arc<MockRouter>) -> Self {
        self.dispatcher.mock_router = Some(router);
        self
    }

    pub fn registry(&self) -> &Arc<ProfileRegistry> {
        &self.dispatcher.registry
    }

    pub fn mock_router(&self) -> Option<&Arc<MockRouter>> {
        self.dispatcher.mock_router.as_ref()
    }

    pub fn is_mocking(&self) -> bool {
        self.dispatcher.mock_router.is_some()
    }

    pub fn execute_rest<T: DeserializeOwned + 'static>(&self, request: &ApiRequest) -> ApiResponse<T> {
        self.dispatcher.run(Protocol::Rest, request, None)
    }

    pub fn execute_rest_with<T: DeserializeOwned + 'static>(
        &self,
        request: &ApiRequest,
        transport: &Arc<dyn Transport>,
    ) -> ApiResponse<T> {
        self.dispatcher.run(Protocol::Rest, request, Some(transport))
    }

    pub fn execute_soap<T: DeserializeOwned + 'static>(&self, request: &ApiRequest) -> ApiResponse<T> {
        self.dispatcher.run(Protocol::Soap, request, None)
    }

    pub fn execute_soap_with<T: DeserializeOwned + 'static>(
        &self,
        request: &ApiRequest,
        transport: &Arc<dyn Transport>,
    ) -> ApiResponse<T> {
        self.dispatcher.run(Protocol::Soap, request, Some(transport))
    }

    /// Detect the protocol, then dispatch.
    pub fn execute_auto<T: DeserializeOwned + 'static>(&self, request: &ApiRequest) -> ApiResponse<T> {
        self.dispatcher.run(protocol::detect(request), request, None)
    }

    pub fn execute_auto_with<T: DeserializeOwned + 'static>(
        &self,
        request: &ApiRequest,
        transport: &Arc<dyn Transport>,
    ) -> ApiResponse<T> {
        self.dispatcher
            .run(protocol::detect(request), request, Some(transport))
    }

    /// Detect the protocol and dispatch on the worker pool.
    pub fn execute_async<T, C>(&self, request: ApiRequest, callback: C)
    where
        T: DeserializeOwned + Send + 'static,
        C: ApiCallback<T>,
    {
        let protocol = protocol::detect(&request);
        self.execute_protocol_async(protocol, request, None, callback);
    }

    pub fn execute_async_with<T, C>(
        &self,
        request: ApiRequest,
        transport: Arc<dyn Transport>,
        callback: C,
    ) where
        T: DeserializeOwned + Send + 'static,
        C: ApiCallback<T>,
    {
        let protocol = protocol::detect(&request);
        self.execute_protocol_async(protocol, request, Some(transport), callback);
    }

    /// Dispatch with an explicit protocol on the worker pool. `transport`
    /// bypasses registry resolution when given.
    pub fn execute_protocol_async<T, C>(
        &self,
        protocol: Protocol,
        request: ApiRequest,
        transport: Option<Arc<dyn Transport>>,
        callback: C,
    ) where
        T: DeserializeOwned + Send + 'static,
        C: ApiCallback<T>,
    {
        let Some(runtime) = &self.runtime else {
            callback.on_exception(ConfigError::Executor("executor is shut down".into()).into());
            return;
        };
        let dispatcher = self.dispatcher.clone();
        runtime.spawn_blocking(move || {
            match dispatcher.try_run::<T>(protocol, &request, transport.as_ref()) {
                Ok(response) if response.success() => callback.on_success(response),
                Ok(response) => callback.on_error(response),
                Err(e) => callback.on_exception(e),
            }
        });
    }
}

impl Drop for DispatchService {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for DispatchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchService")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Sync entry point: failures become error responses.
    fn run<T: DeserializeOwned + 'static>(
        &self,
        protocol: Protocol,
        request: &ApiRequest,
        transport: Option<&Arc<dyn Transport>>,
    ) -> ApiResponse<T> {
        let started = Instant::now();
        match self.try_run(protocol, request, transport) {
            Ok(response) => response,
            Err(e) => {
                error!(
                    protocol = ?protocol,
                    method = %request.method(),
                    url = request.url(),
                    error = %e,
                    "api call failed"
                );
                let mut response = ApiResponse::failed(e.code(failure_code(protocol)), e.to_string());
                response.set_response_time_ms(elapsed_ms(started));
                response
            }
        }
    }

    fn try_run<T: DeserializeOwned + 'static>(
        &self,
        protocol: Protocol,
        request: &ApiRequest,
        transport: Option<&Arc<dyn Transport>>,
    ) -> Result<ApiResponse<T>> {
        if let Some(router) = &self.mock_router {
            debug!(protocol = ?protocol, url = request.url(), "dispatching to mock router");
            return Ok(router.execute_mock(request));
        }

        let resolved;
        let transport: &dyn Transport = match transport {
            Some(t) => t.as_ref(),
            None => {
                resolved = self.registry.resolve_transport(request.url());
                resolved.as_ref()
            }
        };
        let logging = transport.settings().enable_logging;
        if logging {
            info!(
                protocol = ?protocol,
                transport = transport.name(),
                method = %request.method(),
                url = request.url(),
                "api request"
            );
        }

        let started = Instant::now();
        let mut response: ApiResponse<T> = match protocol {
            Protocol::Rest => self.rest.execute(transport, request)?,
            Protocol::Soap => self.soap.execute(transport, request)?,
        };
        response.set_response_time_ms(elapsed_ms(started));

        if logging {
            info!(
                protocol = ?protocol,
                url = request.url(),
                status = response.status_code(),
                elapsed_ms = response.response_time_ms(),
                success = response.success(),
                "api response"
            );
        }
        Ok(response)
    }
}

fn failure_code(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Rest => codes::REST_ERROR,
        Protocol::Soap => codes::SOAP_ERROR,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
