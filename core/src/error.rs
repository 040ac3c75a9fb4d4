//! Error types for the dispatch core.
//!
//! # Design
//! Only setup-time problems are returned as `Err` to callers: an invalid
//! transport profile (`ConfigError`) or a request that cannot be built
//! (`ApiError::InvalidRequest`). Transport and serialization failures are
//! produced internally as `ApiError` values and then folded into an error
//! `ApiResponse` by the dispatch service, each with its own error code so a
//! malformed body stays distinguishable from a dead socket.

use thiserror::Error;

/// Result type for fallible core operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Error codes carried on `ApiResponse::error_code`.
pub mod codes {
    pub const REST_ERROR: &str = "REST_ERROR";
    pub const SOAP_ERROR: &str = "SOAP_ERROR";
    pub const HTTP_ERROR: &str = "HTTP_ERROR";
    pub const SERIALIZATION_ERROR: &str = "SERIALIZATION_ERROR";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const CONFIGURATION_ERROR: &str = "CONFIGURATION_ERROR";
    pub const MOCK_NOT_FOUND: &str = "MOCK_NOT_FOUND";
    pub const MOCK_CONVERSION_ERROR: &str = "MOCK_CONVERSION_ERROR";
}

/// An invalid transport profile, reported at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Per-route pool limit larger than the total pool limit.
    #[error("profile '{name}': max connections per route ({per_route}) exceeds max connections ({total})")]
    PerRouteExceedsTotal {
        name: String,
        per_route: usize,
        total: usize,
    },

    /// A timeout resolved to zero.
    #[error("profile '{name}': {field} must be positive")]
    ZeroTimeout { name: String, field: &'static str },

    /// A pool size resolved to zero.
    #[error("profile '{name}': {field} must be positive")]
    ZeroConnections { name: String, field: &'static str },

    /// A URL pattern could not be compiled.
    #[error("invalid url pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The worker pool for async dispatch could not be started.
    #[error("failed to start dispatch executor: {0}")]
    Executor(String),
}

/// Failure below HTTP: the request never produced a status line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("i/o failure: {0}")]
    Io(String),

    /// The transport was removed from its registry and its pool dropped.
    #[error("transport '{0}' has been released")]
    Released(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Connection and timeout failures are worth another attempt; malformed
    /// URLs and released transports are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Connect(_) | TransportError::Timeout(_) | TransportError::Io(_)
        )
    }
}

/// Umbrella error for the crate.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// A request or response body could not be marshalled or unmarshalled.
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// The response error code used when this error is folded into an
    /// `ApiResponse`. `transport_code` distinguishes REST from SOAP failures.
    pub fn code(&self, transport_code: &'static str) -> &'static str {
        match self {
            ApiError::Configuration(_) => codes::CONFIGURATION_ERROR,
            ApiError::Transport(_) => transport_code,
            ApiError::Serialization(_) => codes::SERIALIZATION_ERROR,
            ApiError::InvalidRequest(_) => codes::INVALID_REQUEST,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_map_to_the_backend_code() {
        let err = ApiError::from(TransportError::Connect("refused".into()));
        assert_eq!(err.code(codes::REST_ERROR), "REST_ERROR");
        assert_eq!(err.code(codes::SOAP_ERROR), "SOAP_ERROR");
    }

    #[test]
    fn serialization_errors_keep_their_own_code() {
        let err = ApiError::Serialization("bad json".into());
        assert_eq!(err.code(codes::REST_ERROR), codes::SERIALIZATION_ERROR);
    }

    #[test]
    fn config_error_names_the_violated_invariant() {
        let err = ConfigError::PerRouteExceedsTotal {
            name: "payment".into(),
            per_route: 50,
            total: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("payment"));
        assert!(msg.contains("per route (50)"));
        assert!(msg.contains("(10)"));
    }

    #[test]
    fn only_network_failures_are_retryable() {
        assert!(TransportError::Timeout("read".into()).is_retryable());
        assert!(TransportError::Connect("refused".into()).is_retryable());
        assert!(!TransportError::InvalidUrl("x".into()).is_retryable());
        assert!(!TransportError::Released("default".into()).is_retryable());
    }
}
