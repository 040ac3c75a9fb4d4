//! Exponential backoff around a single transport exchange.

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::TransportSettings;
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::Transport;

const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Retry schedule derived from a transport's settings.
///
/// `max_attempts` counts the first call, so a value of 1 disables retries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &TransportSettings) -> Self {
        Self {
            max_attempts: settings.max_retry_attempts.max(1),
            initial_delay: settings.retry_delay,
            backoff_factor: BACKOFF_FACTOR,
            max_delay: MAX_DELAY,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }

    /// Whether `err` on `request` may be retried. Requests that were
    /// possibly delivered are only repeated when the method is idempotent.
    pub fn should_retry(&self, request: &HttpRequest, err: &TransportError) -> bool {
        match err {
            TransportError::Connect(_) => true,
            e if e.is_retryable() => matches!(
                request.method,
                HttpMethod::Get | HttpMethod::Delete | HttpMethod::Put
            ),
            _ => false,
        }
    }
}

/// Run `request` on `transport`, retrying transport failures per the
/// transport's own settings. HTTP statuses are never retried here; a 503
/// is a response, not a failure.
pub fn execute(transport: &dyn Transport, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
    let policy = RetryPolicy::from_settings(transport.settings());
    let mut attempt = 1;
    loop {
        match transport.execute(request) {
            Ok(response) => {
                if attempt > 1 {
                    debug!(transport = transport.name(), attempt, "request succeeded after retry");
                }
                return Ok(response);
            }
            Err(err) if attempt < policy.max_attempts && policy.should_retry(request, &err) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    transport = transport.name(),
                    url = %request.url,
                    attempt,
                    ?delay,
                    error = %err,
                    "transport failure, retrying"
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => {
                if attempt > 1 {
                    warn!(transport = transport.name(), attempts = attempt, "giving up after retries");
                }
                return Err(err);
            }
        }
    }
}
