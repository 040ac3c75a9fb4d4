//! REST backend: request building and response parsing.
//!
//! # Design
//! `RestClient` carries no state between calls. `build_request` turns an
//! `ApiRequest` into a wire-level `HttpRequest` and `parse_response` turns
//! the `HttpResponse` back into an `ApiResponse<T>`. `execute` joins the two
//! around a transport call; everything either side of the round-trip can be
//! tested without a network.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::codec::{self, Format};
use crate::error::{codes, ApiError, Result, TransportError};
use crate::http::{HttpRequest, HttpResponse};
use crate::request::ApiRequest;
use crate::response::ApiResponse;
use crate::retry;
use crate::transport::Transport;

const JSON: &str = "application/json";

/// Stateless JSON-over-HTTP client.
#[derive(Debug, Default, Clone, Copy)]
pub struct RestClient;

impl RestClient {
    pub fn execute<T: DeserializeOwned + 'static>(
        &self,
        transport: &dyn Transport,
        request: &ApiRequest,
    ) -> Result<ApiResponse<T>> {
        let http = self.build_request(request)?;
        let response = retry::execute(transport, &http)?;
        self.parse_response(response)
    }

    pub fn build_request(&self, request: &ApiRequest) -> Result<HttpRequest> {
        let url = with_query(request.url(), request.parameters())?;

        let mut headers: Vec<(String, String)> = request
            .headers()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        headers.sort();
        if request.header("Content-Type").is_none() {
            headers.push(("Content-Type".to_string(), JSON.to_string()));
        }

        let body = request.body().map(codec::encode_json).transpose()?;

        Ok(HttpRequest {
            method: request.method(),
            url,
            headers,
            body,
        })
    }

    /// Non-2xx statuses become an `HTTP_ERROR` response with no body. A 2xx
    /// body that cannot be decoded is an `Err`.
    pub fn parse_response<T: DeserializeOwned + 'static>(
        &self,
        response: HttpResponse,
    ) -> Result<ApiResponse<T>> {
        let mut parsed = envelope_of(&response);
        if !response.is_success() {
            parsed.mark_as_error(codes::HTTP_ERROR, http_error_message(response.status));
            return Ok(parsed);
        }
        let text = response.body_text();
        if !text.is_empty() {
            parsed.set_body(Some(codec::decode(&text, Format::Json)?));
        }
        Ok(parsed)
    }
}

/// Status, headers and raw text of `response`, without a decoded body.
pub(crate) fn envelope_of<T>(response: &HttpResponse) -> ApiResponse<T> {
    let mut parsed = ApiResponse::new(response.status);
    if let Some(reason) = reason_phrase(response.status) {
        parsed.set_status_message(reason);
    }
    for (name, value) in &response.headers {
        parsed.insert_header(name.clone(), value.clone());
    }
    parsed.set_raw_response(response.body_text());
    parsed
}

pub(crate) fn http_error_message(status: u16) -> String {
    match reason_phrase(status) {
        Some(reason) => format!("HTTP {status} {reason}"),
        None => format!("HTTP {status}"),
    }
}

fn reason_phrase(status: u16) -> Option<&'static str> {
    ureq::http::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
}

/// Append `parameters` to `url` as query pairs, in key order.
fn with_query(url: &str, parameters: &HashMap<String, Value>) -> Result<String> {
    if parameters.is_empty() {
        return Ok(url.to_string());
    }
    let mut parsed = Url::parse(url)
        .map_err(|e| ApiError::Transport(TransportError::InvalidUrl(format!("{url}: {e}"))))?;
    let mut keys: Vec<&String> = parameters.keys().collect();
    keys.sort();
    {
        let mut pairs = parsed.query_pairs_mut();
        for key in keys {
            pairs.append_pair(key, &codec::canonical_text(&parameters[key]));
        }
    }
    Ok(parsed.into())
}
