//! SOAP 1.1 backend over plain HTTP POST.
//!
//! Requests are wrapped in an envelope unless the caller already supplied
//! one. Responses keep the full envelope as the raw text; the decoded body
//! is whatever sits inside the envelope's `Body` element, except for a
//! `String` target which receives the whole envelope.

use serde::de::DeserializeOwned;

use crate::client::{envelope_of, http_error_message};
use crate::codec::{self, Format};
use crate::error::{codes, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::request::ApiRequest;
use crate::response::ApiResponse;
use crate::retry;
use crate::transport::Transport;

const CONTENT_TYPE: &str = "text/xml; charset=utf-8";
const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const DEFAULT_ROOT: &str = "Request";
const BODY_PREFIXES: [&str; 6] = ["soap:", "soapenv:", "SOAP-ENV:", "env:", "S:", ""];

#[derive(Debug, Default, Clone, Copy)]
pub struct SoapClient;

impl SoapClient {
    pub fn execute<T: DeserializeOwned + 'static>(
        &self,
        transport: &dyn Transport,
        request: &ApiRequest,
    ) -> Result<ApiResponse<T>> {
        let http = self.build_request(request)?;
        let response = retry::execute(transport, &http)?;
        self.parse_response(response)
    }

    /// Always a POST, whatever method the request carries.
    pub fn build_request(&self, request: &ApiRequest) -> Result<HttpRequest> {
        let mut headers = vec![
            ("Content-Type".to_string(), CONTENT_TYPE.to_string()),
            (
                "SOAPAction".to_string(),
                request.soap_action().unwrap_or_default().to_string(),
            ),
        ];
        let mut extra: Vec<(String, String)> = request
            .headers()
            .iter()
            .filter(|(k, _)| {
                !k.eq_ignore_ascii_case("Content-Type") && !k.eq_ignore_ascii_case("SOAPAction")
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        extra.sort();
        headers.extend(extra);

        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: request.url().to_string(),
            headers,
            body: Some(self.envelope(request)?.into_bytes()),
        })
    }

    pub fn envelope(&self, request: &ApiRequest) -> Result<String> {
        let payload = match request.body() {
            Some(body) => {
                let root = request
                    .soap_action()
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or(DEFAULT_ROOT);
                codec::encode_xml(body, root)?
            }
            None => String::new(),
        };
        if payload.contains("Envelope") {
            return Ok(payload);
        }
        Ok(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <soap:Envelope xmlns:soap=\"{ENVELOPE_NS}\">\
             <soap:Header/>\
             <soap:Body>{payload}</soap:Body>\
             </soap:Envelope>"
        ))
    }

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
        if codec::is_text::<T>() {
            parsed.set_body(Some(codec::decode(&text, Format::Xml)?));
            return Ok(parsed);
        }
        let content = body_content(&text).unwrap_or(text.as_str()).trim();
        if !content.is_empty() {
            parsed.set_body(Some(codec::decode(content, Format::Xml)?));
        }
        Ok(parsed)
    }
}

/// The inner XML of the envelope's `Body` element, if there is one.
pub fn body_content(envelope: &str) -> Option<&str> {
    for prefix in BODY_PREFIXES {
        let open = format!("<{prefix}Body");
        let mut from = 0;
        while let Some(found) = envelope[from..].find(&open) {
            let start = from + found;
            let after = start + open.len();
            match envelope[after..].chars().next() {
                Some('>') | Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    let tag_end = after + envelope[after..].find('>')?;
                    if envelope[..tag_end].ends_with('/') {
                        return Some("");
                    }
                    let close = format!("</{prefix}Body>");
                    let end = envelope[tag_end..].find(&close)? + tag_end;
                    return Some(&envelope[tag_end + 1..end]);
                }
                Some('/') => return Some(""),
                _ => from = after,
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    const RESPONSE: &str = "<?xml version=\"1.0\"?>\
        <soapenv:Envelope xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\">\
        <soapenv:Body><GetQuoteResponse><symbol>ACME</symbol><price>12.5</price></GetQuoteResponse></soapenv:Body>\
        </soapenv:Envelope>";

    #[derive(Debug, Deserialize, PartialEq)]
    struct GetQuoteResponse {
        symbol: String,
        price: f64,
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: vec![("Content-Type".into(), "text/xml".into())],
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn request_is_posted_with_soap_headers() {
        let req = ApiRequest::builder("http://soap.service.com/endpoint")
            .soap_action("GetData")
            .header("content-type", "application/json")
            .header("X-Trace", "1")
            .body("<GetData/>")
            .build()
            .unwrap();
        let http = SoapClient.build_request(&req).unwrap();
        assert_eq!(http.method, HttpMethod::Post);
        assert_eq!(http.header("Content-Type"), Some(CONTENT_TYPE));
        assert_eq!(http.header("SOAPAction"), Some("GetData"));
        assert_eq!(http.header("X-Trace"), Some("1"));
        assert_eq!(http.headers.len(), 3);
    }

    #[test]
    fn missing_action_sends_empty_header() {
        let req = ApiRequest::soap("http://soap.service.com/endpoint").build().unwrap();
        let http = SoapClient.build_request(&req).unwrap();
        assert_eq!(http.header("SOAPAction"), Some(""));
    }

    #[test]
    fn payload_is_wrapped_once() {
        let req = ApiRequest::soap("http://s.com")
            .body("<Ping/>")
            .build()
            .unwrap();
        let envelope = SoapClient.envelope(&req).unwrap();
        assert!(envelope.contains("<soap:Body><Ping/></soap:Body>"));

        let prewrapped = ApiRequest::soap("http://s.com").body(envelope.clone()).build().unwrap();
        assert_eq!(SoapClient.envelope(&prewrapped).unwrap(), envelope);
    }

    #[test]
    fn structured_payload_is_rooted_at_the_action() {
        let req = ApiRequest::soap("http://s.com")
            .soap_action("GetUser")
            .body(json!({"id": 7}))
            .build()
            .unwrap();
        let envelope = SoapClient.envelope(&req).unwrap();
        assert!(envelope.contains("<soap:Body><GetUser><id>7</id></GetUser></soap:Body>"));
    }

    #[test]
    fn body_content_handles_common_prefixes() {
        assert_eq!(body_content("<soap:Envelope><soap:Body><a/></soap:Body></soap:Envelope>"), Some("<a/>"));
        assert_eq!(body_content("<env:Envelope><env:Body xmlns:x=\"y\"><a/></env:Body></env:Envelope>"), Some("<a/>"));
        assert_eq!(body_content("<Envelope><Body>x</Body></Envelope>"), Some("x"));
        assert_eq!(body_content("<soap:Envelope><soap:Body/></soap:Envelope>"), Some(""));
        assert_eq!(body_content("<BodyPart>x</BodyPart>"), None);
    }

    #[test]
    fn typed_target_decodes_body_content() {
        let parsed: ApiResponse<GetQuoteResponse> = SoapClient.parse_response(ok(RESPONSE)).unwrap();
        assert!(parsed.success());
        assert_eq!(parsed.body().unwrap().symbol, "ACME");
        assert_eq!(parsed.raw_response(), Some(RESPONSE));
    }

    #[test]
    fn string_target_receives_whole_envelope() {
        let parsed: ApiResponse<String> = SoapClient.parse_response(ok(RESPONSE)).unwrap();
        assert_eq!(parsed.body().map(String::as_str), Some(RESPONSE));
    }

    #[test]
    fn fault_status_is_http_error() {
        let mut response = ok("<soap:Envelope><soap:Body><soap:Fault/></soap:Body></soap:Envelope>");
        response.status = 500;
        let parsed: ApiResponse<String> = SoapClient.parse_response(response).unwrap();
        assert_eq!(parsed.error_code(), Some(codes::HTTP_ERROR));
        assert!(parsed.body().is_none());
        assert!(parsed.raw_response().unwrap().contains("Fault"));
    }
}
