//! Test-mode replacement for the transport layer.
//!
//! # Design
//! `MockRouter::execute_mock` resolves a request in three steps. Custom
//! handlers are asked first, in registration order, each deciding through
//! its own `matches_url`. Generic mocks come next, resolved with the shared
//! URL pattern rules. Anything left over gets a 404 `MOCK_NOT_FOUND`
//! response. Every resolved call bumps a per-URL counter; misses are not
//! counted.
//!
//! Handlers and generic mocks answer with JSON values. The router converts
//! them into the caller's type, so a handler never needs to know what the
//! caller asked for.

mod handler;
pub mod payment;
pub mod user_service;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

pub use handler::{MockHandler, Scenario, ScenarioTable, SCENARIO_HEADER};
pub use payment::PaymentMock;
pub use user_service::{MockUser, UserServiceMock};

use crate::codec;
use crate::error::{codes, ConfigError};
use crate::pattern::{self, UrlPattern};
use crate::request::ApiRequest;
use crate::response::ApiResponse;

/// A canned response served for every URL matching its pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub body: Option<Value>,
    pub headers: HashMap<String, String>,
    pub delay: Duration,
}

impl MockResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            body: None,
            headers: HashMap::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

/// Snapshot of the router's registrations and traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockSummary {
    pub custom_api_mocks: Vec<String>,
    pub general_mock_patterns: Vec<String>,
    pub request_counts: BTreeMap<String, u64>,
    pub total_custom_mocks: usize,
    pub total_general_mocks: usize,
}

#[derive(Debug, Default)]
pub struct MockRouter {
    handlers: RwLock<Vec<(String, Arc<dyn MockHandler>)>>,
    responses: RwLock<Vec<(UrlPattern, MockResponse)>>,
    counts: Mutex<HashMap<String, u64>>,
}

impl MockRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Router with the payment and user-service simulators registered.
    pub fn with_builtin_handlers() -> Self {
        let router = Self::new();
        router.register_api_mock(Arc::new(PaymentMock::new()));
        router.register_api_mock(Arc::new(UserServiceMock::new()));
        router
    }

    pub fn execute_mock<T: DeserializeOwned + 'static>(&self, request: &ApiRequest) -> ApiResponse<T> {
        let url = request.url();

        if let Some(handler) = self.find_handler(url) {
            debug!(url, handler = handler.identifier(), "custom mock");
            self.count(url);
            return convert(handler.execute(request));
        }

        let found = {
            let responses = self.responses.read();
            pattern::resolve(url, responses.iter().map(|(p, r)| (p, r))).cloned()
        };
        let Some(mock) = found else {
            debug!(url, "no mock configured");
            let mut response = ApiResponse::new(404);
            response.mark_as_error(codes::MOCK_NOT_FOUND, "No mock response configured for this URL");
            return response;
        };

        self.count(url);
        if !mock.delay.is_zero() {
            thread::sleep(mock.delay);
        }
        let mut response = ApiResponse::new(mock.status);
        response.set_body(mock.body);
        for (name, value) in mock.headers {
            response.insert_header(name, value);
        }
        response.set_response_time_ms(mock.delay.as_millis() as u64);
        convert(response)
    }

    /// Register `handler` under its identifier, replacing any handler with
    /// the same identifier in place.
    pub fn register_api_mock(&self, handler: Arc<dyn MockHandler>) {
        let id = handler.identifier().to_string();
        let mut handlers = self.handlers.write();
        match handlers.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = handler,
            None => handlers.push((id.clone(), handler)),
        }
        info!(id = %id, "registered custom api mock");
    }

    pub fn remove_api_mock(&self, id: &str) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(existing, _)| existing != id);
        let removed = handlers.len() != before;
        if removed {
            info!(id, "removed custom api mock");
        }
        removed
    }

    pub fn has_api_mock(&self, id: &str) -> bool {
        self.api_mock(id).is_some()
    }

    pub fn api_mock(&self, id: &str) -> Option<Arc<dyn MockHandler>> {
        self.handlers
            .read()
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, h)| Arc::clone(h))
    }

    pub fn api_mock_ids(&self) -> Vec<String> {
        self.handlers.read().iter().map(|(id, _)| id.clone()).collect()
    }

    /// Reset one handler's state. Its registration stays.
    pub fn reset_api_mock(&self, id: &str) -> bool {
        match self.api_mock(id) {
            Some(handler) => {
                handler.reset();
                true
            }
            None => {
                warn!(id, "reset requested for unknown api mock");
                false
            }
        }
    }

    pub fn reset_all_api_mocks(&self) {
        let handlers: Vec<_> = self.handlers.read().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            handler.reset();
        }
    }

    /// Serve `response` for URLs matching `url_pattern`. Re-registering a
    /// pattern replaces its response in place.
    pub fn register_mock_response(
        &self,
        url_pattern: &str,
        response: MockResponse,
    ) -> Result<(), ConfigError> {
        let compiled = UrlPattern::parse(url_pattern)?;
        let mut responses = self.responses.write();
        match responses.iter_mut().find(|(p, _)| p.as_str() == url_pattern) {
            Some(slot) => slot.1 = response,
            None => responses.push((compiled, response)),
        }
        info!(pattern = url_pattern, "registered mock response");
        Ok(())
    }

    /// Drop handlers, generic mocks and counters.
    pub fn clear(&self) {
        self.handlers.write().clear();
        self.responses.write().clear();
        self.counts.lock().clear();
        info!("cleared all mocks");
    }

    /// Drop generic mocks and counters. Handlers stay.
    pub fn clear_general_mock_responses(&self) {
        self.responses.write().clear();
        self.counts.lock().clear();
    }

    pub fn clear_custom_api_mocks(&self) {
        self.handlers.write().clear();
    }

    pub fn request_count(&self, url: &str) -> u64 {
        self.counts.lock().get(url).copied().unwrap_or(0)
    }

    pub fn has_mock_response(&self, url: &str) -> bool {
        self.has_custom_api_mock(url) || self.has_general_mock_response(url)
    }

    pub fn has_general_mock_response(&self, url: &str) -> bool {
        let responses = self.responses.read();
        pattern::resolve(url, responses.iter().map(|(p, r)| (p, r))).is_some()
    }

    pub fn has_custom_api_mock(&self, url: &str) -> bool {
        self.find_handler(url).is_some()
    }

    pub fn summary(&self) -> MockSummary {
        let custom_api_mocks = self.api_mock_ids();
        let general_mock_patterns: Vec<String> = self
            .responses
            .read()
            .iter()
            .map(|(p, _)| p.as_str().to_string())
            .collect();
        MockSummary {
            total_custom_mocks: custom_api_mocks.len(),
            total_general_mocks: general_mock_patterns.len(),
            custom_api_mocks,
            general_mock_patterns,
            request_counts: self.counts.lock().iter().map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }

    fn find_handler(&self, url: &str) -> Option<Arc<dyn MockHandler>> {
        self.handlers
            .read()
            .iter()
            .find(|(_, h)| h.matches_url(url))
            .map(|(_, h)| Arc::clone(h))
    }

    fn count(&self, url: &str) {
        *self.counts.lock().entry(url.to_string()).or_insert(0) += 1;
    }
}

/// Convert a JSON-bodied response into the caller's type. A body that does
/// not fit `T` is dropped. The response is marked `MOCK_CONVERSION_ERROR`
/// only if the mock did not already record an error of its own.
fn convert<T: DeserializeOwned + 'static>(response: ApiResponse<Value>) -> ApiResponse<T> {
    let already_failed = response.error().is_some();
    let mut failure = None;
    let mut out = response
        .map_body(|value| match codec::convert::<T>(value) {
            Ok(body) => Some(body),
            Err(e) => {
                failure = Some(e);
                None
            }
        })
        .flatten();
    match failure {
        Some(e) if already_failed => {
            debug!(error = %e, "error body does not fit the requested type, dropped");
        }
        Some(e) => {
            warn!(error = %e, "mock body does not fit the requested type");
            out.mark_as_error(codes::MOCK_CONVERSION_ERROR, format!("Failed to convert mock response: {e}"));
        }
        None => {}
    }
    out
}
