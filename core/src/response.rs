//! Protocol-agnostic response model.
//!
//! # Design
//! `success` is not stored. It is derived from the status code and from
//! whether an error has been recorded, so there is no way for the two to
//! disagree. `mark_as_error` is sticky: a later `set_status_code(200)` does
//! not turn a failed response back into a successful one.

use std::collections::HashMap;

use serde::Serialize;

/// Error code and message recorded together by `mark_as_error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Result of a dispatched or mocked call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    status_code: u16,
    status_message: Option<String>,
    headers: HashMap<String, String>,
    body: Option<T>,
    error: Option<ErrorDetail>,
    response_time_ms: u64,
    raw_response: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            status_message: None,
            headers: HashMap::new(),
            body: None,
            error: None,
            response_time_ms: 0,
            raw_response: None,
        }
    }

    /// A response for a call that failed before any status was received.
    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        let mut response = Self::new(0);
        response.mark_as_error(code, message);
        response
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn set_status_code(&mut self, status_code: u16) {
        self.status_code = status_code;
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn insert_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn body(&self) -> Option<&T> {
        self.body.as_ref()
    }

    pub fn into_body(self) -> Option<T> {
        self.body
    }

    pub fn set_body(&mut self, body: Option<T>) {
        self.body = body;
    }

    pub fn success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status_code)
    }

    pub fn has_error(&self) -> bool {
        !self.success()
    }

    pub fn error(&self) -> Option<&ErrorDetail> {
        self.error.as_ref()
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    pub fn mark_as_error(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.error = Some(ErrorDetail {
            code: code.into(),
            message: message.into(),
        });
    }

    pub fn response_time_ms(&self) -> u64 {
        self.response_time_ms
    }

    pub fn set_response_time_ms(&mut self, ms: u64) {
        self.response_time_ms = ms;
    }

    pub fn raw_response(&self) -> Option<&str> {
        self.raw_response.as_deref()
    }

    pub fn set_raw_response(&mut self, raw: impl Into<String>) {
        self.raw_response = Some(raw.into());
    }

    /// Convert the body, keeping status, headers, error and timing.
    pub fn map_body<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            status_code: self.status_code,
            status_message: self.status_message,
            headers: self.headers,
            body: self.body.map(f),
            error: self.error,
            response_time_ms: self.response_time_ms,
            raw_response: self.raw_response,
        }
    }
}

impl<T> ApiResponse<Option<T>> {
    pub(crate) fn flatten(self) -> ApiResponse<T> {
        ApiResponse {
            status_code: self.status_code,
            status_message: self.status_message,
            headers: self.headers,
            body: self.body.flatten(),
            error: self.error,
            response_time_ms: self.response_time_ms,
            raw_response: self.raw_response,
        }
    }
}
