//! HTTP transports and the factory that builds them from settings.
//!
//! # Design
//! A `Transport` owns one connection pool configured from a
//! `TransportSettings`. The registry shares transports as `Arc<dyn
//! Transport>` and calls `release` when a registration is evicted. The
//! production implementation wraps a `ureq::Agent`; tests plug in fakes
//! through `TransportFactory`.

use std::fmt;
use std::io::ErrorKind;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use ureq::Agent;

use crate::config::TransportSettings;
use crate::error::{ConfigError, TransportError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes plain HTTP exchanges over a pooled connection set.
pub trait Transport: Send + Sync + fmt::Debug {
    fn settings(&self) -> &TransportSettings;

    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Drop pooled connections. Later calls to `execute` fail.
    fn release(&self) -> Result<(), TransportError>;

    fn name(&self) -> &str {
        &self.settings().name
    }
}

/// Builds a transport for resolved settings.
pub trait TransportFactory: Send + Sync + fmt::Debug {
    fn build(&self, settings: &TransportSettings) -> Result<Arc<dyn Transport>, ConfigError>;
}

/// Transport backed by a `ureq` agent.
///
/// `ureq` pools idle connections only, so the total and per-route limits
/// bound the idle pool rather than in-flight requests.
pub struct UreqTransport {
    settings: TransportSettings,
    agent: Mutex<Option<Agent>>,
}

impl UreqTransport {
    pub fn new(settings: TransportSettings) -> Self {
        let agent = Agent::config_builder()
            .timeout_connect(Some(settings.connect_timeout))
            .timeout_recv_response(Some(settings.read_timeout))
            .timeout_recv_body(Some(settings.read_timeout))
            .max_idle_connections(settings.max_connections)
            .max_idle_connections_per_host(settings.max_connections_per_route)
            .http_status_as_error(false)
            .build()
            .new_agent();
        debug!(
            transport = %settings.name,
            connect_timeout = ?settings.connect_timeout,
            read_timeout = ?settings.read_timeout,
            max_connections = settings.max_connections,
            "built http transport"
        );
        Self {
            settings,
            agent: Mutex::new(Some(agent)),
        }
    }

    fn agent(&self) -> Result<Agent, TransportError> {
        self.agent
            .lock()
            .clone()
            .ok_or_else(|| TransportError::Released(self.settings.name.clone()))
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("name", &self.settings.name)
            .field("released", &self.agent.lock().is_none())
            .finish()
    }
}

impl Transport for UreqTransport {
    fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent()?;
        let url = request.url.as_str();
        let body = request.body.as_deref();

        let result = match request.method {
            HttpMethod::Get => with_headers(agent.get(url), &request.headers).call(),
            HttpMethod::Delete => with_headers(agent.delete(url), &request.headers).call(),
            HttpMethod::Post => {
                let builder = with_headers(agent.post(url), &request.headers);
                match body {
                    Some(bytes) => builder.send(bytes),
                    None => builder.send_empty(),
                }
            }
            HttpMethod::Put => {
                let builder = with_headers(agent.put(url), &request.headers);
                match body {
                    Some(bytes) => builder.send(bytes),
                    None => builder.send_empty(),
                }
            }
            HttpMethod::Patch => {
                let builder = with_headers(agent.patch(url), &request.headers);
                match body {
                    Some(bytes) => builder.send(bytes),
                    None => builder.send_empty(),
                }
            }
        };
        let mut response = result.map_err(map_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_vec().map_err(map_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn release(&self) -> Result<(), TransportError> {
        match self.agent.lock().take() {
            Some(_) => {
                debug!(transport = %self.settings.name, "released http transport");
                Ok(())
            }
            None => Err(TransportError::Released(self.settings.name.clone())),
        }
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn map_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(which) => TransportError::Timeout(format!("{which:?}")),
        ureq::Error::ConnectionFailed => TransportError::Connect("connection failed".to_string()),
        ureq::Error::HostNotFound => TransportError::Connect("host not found".to_string()),
        ureq::Error::BadUri(uri) => TransportError::InvalidUrl(uri),
        ureq::Error::Io(e) if e.kind() == ErrorKind::ConnectionRefused => {
            TransportError::Connect(e.to_string())
        }
        ureq::Error::Io(e) if e.kind() == ErrorKind::TimedOut => {
            TransportError::Timeout(e.to_string())
        }
        ureq::Error::Io(e) => TransportError::Io(e.to_string()),
        other => TransportError::Other(other.to_string()),
    }
}

/// Builds `UreqTransport`s.
#[derive(Debug, Default, Clone, Copy)]
pub struct UreqTransportFactory;

impl TransportFactory for UreqTransportFactory {
    fn build(&self, settings: &TransportSettings) -> Result<Arc<dyn Transport>, ConfigError> {
        Ok(Arc::new(UreqTransport::new(settings.clone())))
    }
}
