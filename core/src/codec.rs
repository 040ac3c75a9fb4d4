//! JSON and XML marshalling for request and response bodies.
//!
//! A `String` target is special: it receives the text unchanged instead of
//! being parsed, so callers can ask for the raw payload of any response.

use std::any::TypeId;

use serde::de::value::StrDeserializer;
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::request::Body;

/// Wire format of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Xml,
}

/// Decode `text` into `T`.
pub fn decode<T: DeserializeOwned + 'static>(text: &str, format: Format) -> Result<T> {
    if is_text::<T>() {
        let de: StrDeserializer<'_, serde::de::value::Error> = text.into_deserializer();
        return T::deserialize(de).map_err(|e| ApiError::Serialization(e.to_string()));
    }
    match format {
        Format::Json => Ok(serde_json::from_str(text)?),
        Format::Xml => {
            quick_xml::de::from_str(text).map_err(|e| ApiError::Serialization(e.to_string()))
        }
    }
}

/// Convert a structured mock body into `T`. A `String` target receives the
/// canonical text of the value (strings verbatim, anything else as JSON).
pub fn convert<T: DeserializeOwned + 'static>(value: Value) -> Result<T> {
    if is_text::<T>() {
        return decode(&canonical_text(&value), Format::Json);
    }
    Ok(serde_json::from_value(value)?)
}

pub fn canonical_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Bytes for a REST body. Text goes out verbatim.
pub fn encode_json(body: &Body) -> Result<Vec<u8>> {
    match body {
        Body::Text(text) => Ok(text.as_bytes().to_vec()),
        Body::Json(value) => Ok(serde_json::to_vec(value)?),
    }
}

/// XML for a SOAP payload. Text goes out verbatim; structured values are
/// serialized under `root`.
pub fn encode_xml(body: &Body, root: &str) -> Result<String> {
    match body {
        Body::Text(text) => Ok(text.clone()),
        Body::Json(value) => quick_xml::se::to_string_with_root(root, value)
            .map_err(|e| ApiError::Serialization(e.to_string())),
    }
}

pub(crate) fn is_text<T: 'static>() -> bool {
    TypeId::of::<T>() == TypeId::of::<String>()
}
