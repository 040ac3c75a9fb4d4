//! REST or SOAP, decided from the shape of a request.

use serde::{Deserialize, Serialize};

use crate::request::{ApiRequest, Body};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Rest,
    Soap,
}

/// Classify `request`. Checked in order: a non-blank SOAP action, an XML
/// or SOAP content type, a text body mentioning `Envelope`. Anything else
/// is REST.
///
/// The body check is a plain substring test and will also fire for a JSON
/// document that happens to contain the word.
pub fn detect(request: &ApiRequest) -> Protocol {
    if request.soap_action().is_some_and(|a| !a.trim().is_empty()) {
        return Protocol::Soap;
    }
    if let Some(content_type) = request.header("Content-Type") {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("text/xml") || content_type.contains("application/soap+xml") {
            return Protocol::Soap;
        }
    }
    if let Some(Body::Text(text)) = request.body() {
        if text.contains("Envelope") {
            return Protocol::Soap;
        }
    }
    Protocol::Rest
}
