//! Protocol-agnostic request model.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::http::HttpMethod;

/// Request body: raw text or a structured JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Text(String),
    Json(Value),
}

impl Body {
    /// The body as a JSON value, parsing text bodies. `None` if the text is
    /// not JSON.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Body::Text(text) => serde_json::from_str(text).ok(),
            Body::Json(value) => Some(value.clone()),
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

/// A single outbound call, REST or SOAP. Built once via `ApiRequestBuilder`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    url: String,
    method: HttpMethod,
    headers: HashMap<String, String>,
    body: Option<Body>,
    parameters: HashMap<String, Value>,
    soap_action: Option<String>,
}

impl ApiRequest {
    pub fn builder(url: impl Into<String>) -> ApiRequestBuilder {
        ApiRequestBuilder {
            url: url.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            body: None,
            parameters: HashMap::new(),
            soap_action: None,
            error: None,
        }
    }

    /// Builder preset for REST calls (GET).
    pub fn rest(url: impl Into<String>) -> ApiRequestBuilder {
        Self::builder(url)
    }

    /// Builder preset for SOAP calls (POST).
    pub fn soap(url: impl Into<String>) -> ApiRequestBuilder {
        Self::builder(url).method(HttpMethod::Post)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn parameters(&self) -> &HashMap<String, Value> {
        &self.parameters
    }

    pub fn soap_action(&self) -> Option<&str> {
        self.soap_action.as_deref()
    }
}

/// Builder for `ApiRequest`.
#[derive(Debug, Clone)]
pub struct ApiRequestBuilder {
    url: String,
    method: HttpMethod,
    headers: HashMap<String, String>,
    body: Option<Body>,
    parameters: HashMap<String, Value>,
    soap_action: Option<String>,
    error: Option<String>,
}

impl ApiRequestBuilder {
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attach any serializable value as a structured body.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => self.body = Some(Body::Json(value)),
            Err(e) => self.error = Some(format!("body is not serializable: {e}")),
        }
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn soap_action(mut self, action: impl Into<String>) -> Self {
        self.soap_action = Some(action.into());
        self
    }

    pub fn build(self) -> Result<ApiRequest> {
        if let Some(error) = self.error {
            return Err(ApiError::InvalidRequest(error));
        }
        if self.url.trim().is_empty() {
            return Err(ApiError::InvalidRequest("url is required".to_string()));
        }
        Ok(ApiRequest {
            url: self.url,
            method: self.method,
            headers: self.headers,
            body: self.body,
            parameters: self.parameters,
            soap_action: self.soap_action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_defaults_are_empty_not_missing() {
        let req = ApiRequest::builder("https://api.example.com/users").build().unwrap();
        assert_eq!(req.method(), HttpMethod::Get);
        assert!(req.headers().is_empty());
        assert!(req.parameters().is_empty());
        assert!(req.body().is_none());
        assert!(req.soap_action().is_none());
    }

    #[test]
    fn blank_url_is_rejected() {
        let err = ApiRequest::builder("  ").build().unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn soap_preset_posts() {
        let req = ApiRequest::soap("http://soap.service.com/endpoint")
            .soap_action("GetData")
            .build()
            .unwrap();
        assert_eq!(req.method(), HttpMethod::Post);
        assert_eq!(req.soap_action(), Some("GetData"));
    }

    #[test]
    fn json_body_is_structured() {
        #[derive(Serialize)]
        struct Charge {
            amount: u32,
        }
        let req = ApiRequest::rest("https://payment.gateway.com/process")
            .method(HttpMethod::Post)
            .json(&Charge { amount: 250 })
            .build()
            .unwrap();
        assert_eq!(req.body(), Some(&Body::Json(json!({"amount": 250}))));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = ApiRequest::builder("https://a.com")
            .header("X-Mock-Scenario", "rate_limit")
            .build()
            .unwrap();
        assert_eq!(req.header("x-mock-scenario"), Some("rate_limit"));
    }

    #[test]
    fn text_body_converts_to_json_when_possible() {
        assert_eq!(Body::from(r#"{"a":1}"#).to_json(), Some(json!({"a": 1})));
        assert_eq!(Body::from("<xml/>").to_json(), None);
    }
}
