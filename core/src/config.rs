//! Global defaults and per-destination transport profiles.
//!
//! # Design
//! `ApiConfig` is the resolved configuration a host hands to the core at
//! startup; the core never reads files itself. A `TransportProfile` leaves
//! any field unset to inherit the global value, and is turned into concrete
//! `TransportSettings` by `TransportProfile::resolve`, which is also where
//! the pool-size invariant is enforced.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/// Process-wide defaults for transports and mocking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_max_connections_per_route")]
    pub max_connections_per_route: usize,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_enable_logging")]
    pub enable_logging: bool,

    /// Route every dispatch through the mock router instead of the network.
    #[serde(default)]
    pub enable_mocking: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            max_connections: default_max_connections(),
            max_connections_per_route: default_max_connections_per_route(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            enable_logging: default_enable_logging(),
            enable_mocking: false,
        }
    }
}

impl ApiConfig {
    /// Settings for the fallback transport used when no pattern matches.
    pub fn default_settings(&self) -> Result<TransportSettings, ConfigError> {
        TransportProfile::builder("default").build().resolve(self)
    }

    pub fn with_mocking(mut self, enabled: bool) -> Self {
        self.enable_mocking = enabled;
        self
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_read_timeout_ms() -> u64 {
    30_000
}

fn default_max_connections() -> usize {
    100
}

fn default_max_connections_per_route() -> usize {
    20
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_enable_logging() -> bool {
    true
}

/// Declarative transport settings for one destination. Unset fields fall
/// back to `ApiConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportProfile {
    name: String,
    connect_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
    max_connections: Option<usize>,
    max_connections_per_route: Option<usize>,
    max_retry_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
    enable_logging: Option<bool>,
}

impl TransportProfile {
    pub fn builder(name: impl Into<String>) -> TransportProfileBuilder {
        TransportProfileBuilder {
            profile: TransportProfile {
                name: name.into(),
                connect_timeout_ms: None,
                read_timeout_ms: None,
                max_connections: None,
                max_connections_per_route: None,
                max_retry_attempts: None,
                retry_delay_ms: None,
                enable_logging: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fill unset fields from `defaults` and check the result.
    pub fn resolve(&self, defaults: &ApiConfig) -> Result<TransportSettings, ConfigError> {
        let settings = TransportSettings {
            name: self.name.clone(),
            connect_timeout: Duration::from_millis(
                self.connect_timeout_ms.unwrap_or(defaults.connect_timeout_ms),
            ),
            read_timeout: Duration::from_millis(
                self.read_timeout_ms.unwrap_or(defaults.read_timeout_ms),
            ),
            max_connections: self.max_connections.unwrap_or(defaults.max_connections),
            max_connections_per_route: self
                .max_connections_per_route
                .unwrap_or(defaults.max_connections_per_route),
            max_retry_attempts: self
                .max_retry_attempts
                .unwrap_or(defaults.max_retry_attempts),
            retry_delay: Duration::from_millis(
                self.retry_delay_ms.unwrap_or(defaults.retry_delay_ms),
            ),
            enable_logging: self.enable_logging.unwrap_or(defaults.enable_logging),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Short timeouts and a single retry, for latency-sensitive calls.
    pub fn fast_api() -> Self {
        Self::builder("fast-api")
            .connect_timeout_ms(2_000)
            .read_timeout_ms(5_000)
            .max_retry_attempts(1)
            .retry_delay_ms(500)
            .build()
    }

    /// Long read timeout and patient retries.
    pub fn slow_api() -> Self {
        Self::builder("slow-api")
            .connect_timeout_ms(10_000)
            .read_timeout_ms(120_000)
            .max_retry_attempts(5)
            .retry_delay_ms(2_000)
            .build()
    }

    pub fn external_api() -> Self {
        Self::builder("external-api")
            .connect_timeout_ms(5_000)
            .read_timeout_ms(30_000)
            .max_connections(20)
            .max_connections_per_route(5)
            .enable_logging(true)
            .build()
    }

    pub fn payment_api() -> Self {
        Self::builder("payment-api")
            .connect_timeout_ms(2_000)
            .read_timeout_ms(5_000)
            .max_connections(50)
            .max_connections_per_route(10)
            .enable_logging(true)
            .build()
    }

    pub fn batch_api() -> Self {
        Self::builder("batch-api")
            .connect_timeout_ms(10_000)
            .read_timeout_ms(300_000)
            .max_connections(10)
            .max_connections_per_route(2)
            .enable_logging(false)
            .build()
    }

    pub fn high_volume_api() -> Self {
        Self::builder("high-volume-api")
            .connect_timeout_ms(3_000)
            .read_timeout_ms(15_000)
            .max_connections(100)
            .max_connections_per_route(20)
            .enable_logging(false)
            .build()
    }
}

/// Builder for `TransportProfile`.
#[derive(Debug, Clone)]
pub struct TransportProfileBuilder {
    profile: TransportProfile,
}

impl TransportProfileBuilder {
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.profile.connect_timeout_ms = Some(ms);
        self
    }

    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.profile.read_timeout_ms = Some(ms);
        self
    }

    pub fn max_connections(mut self, n: usize) -> Self {
        self.profile.max_connections = Some(n);
        self
    }

    pub fn max_connections_per_route(mut self, n: usize) -> Self {
        self.profile.max_connections_per_route = Some(n);
        self
    }

    pub fn max_retry_attempts(mut self, n: u32) -> Self {
        self.profile.max_retry_attempts = Some(n);
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.profile.retry_delay_ms = Some(ms);
        self
    }

    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.profile.enable_logging = Some(enabled);
        self
    }

    pub fn build(self) -> TransportProfile {
        self.profile
    }
}

/// Fully resolved settings a transport is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub name: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub max_connections: usize,
    pub max_connections_per_route: usize,
    pub max_retry_attempts: u32,
    pub retry_delay: Duration,
    pub enable_logging: bool,
}

impl TransportSettings {
    /// Hard invariants fail; questionable but legal values only warn.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout {
                name: self.name.clone(),
                field: "connect timeout",
            });
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout {
                name: self.name.clone(),
                field: "read timeout",
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::ZeroConnections {
                name: self.name.clone(),
                field: "max connections",
            });
        }
        if self.max_connections_per_route == 0 {
            return Err(ConfigError::ZeroConnections {
                name: self.name.clone(),
                field: "max connections per route",
            });
        }
        if self.max_connections_per_route > self.max_connections {
            return Err(ConfigError::PerRouteExceedsTotal {
                name: self.name.clone(),
                per_route: self.max_connections_per_route,
                total: self.max_connections,
            });
        }

        if self.connect_timeout < Duration::from_secs(1) {
            warn!(profile = %self.name, timeout = ?self.connect_timeout, "very short connect timeout");
        }
        if self.read_timeout < Duration::from_secs(2) {
            warn!(profile = %self.name, timeout = ?self.read_timeout, "very short read timeout");
        }
        if self.max_connections > 1_000 {
            warn!(profile = %self.name, max = self.max_connections, "very high max connections");
        }
        Ok(())
    }
}

/// The stock pattern-to-profile mappings, in registration order.
pub fn standard_profiles() -> Vec<(&'static str, TransportProfile)> {
    vec![
        ("https://payment.gateway.com/*", TransportProfile::payment_api()),
        ("https://*/payment/*", TransportProfile::payment_api()),
        ("https://batch.processor.com/*", TransportProfile::batch_api()),
        ("https://*/batch/*", TransportProfile::batch_api()),
        ("https://*.external.com/*", TransportProfile::external_api()),
        ("https://partner-*.com/*", TransportProfile::external_api()),
        ("https://high-volume.api.com/*", TransportProfile::high_volume_api()),
        ("https://*/stream/*", TransportProfile::high_volume_api()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ApiConfig::default();
        assert_eq!(config.connect_timeout_ms, 5_000);
        assert_eq!(config.read_timeout_ms, 30_000);
        assert_eq!(config.max_connections, 100);
        assert_eq!(config.max_connections_per_route, 20);
        assert_eq!(config.max_retry_attempts, 3);
        assert!(config.enable_logging);
        assert!(!config.enable_mocking);
    }

    #[test]
    fn config_deserializes_with_partial_fields() {
        let config: ApiConfig =
            serde_json::from_str(r#"{"read_timeout_ms":1234,"enable_mocking":true}"#).unwrap();
        assert_eq!(config.read_timeout_ms, 1234);
        assert_eq!(config.connect_timeout_ms, 5_000);
        assert!(config.enable_mocking);
    }

    #[test]
    fn unset_profile_fields_inherit_defaults() {
        let profile = TransportProfile::builder("partial")
            .read_timeout_ms(9_000)
            .build();
        let settings = profile.resolve(&ApiConfig::default()).unwrap();
        assert_eq!(settings.name, "partial");
        assert_eq!(settings.read_timeout, Duration::from_millis(9_000));
        assert_eq!(settings.connect_timeout, Duration::from_millis(5_000));
        assert_eq!(settings.max_connections, 100);
        assert_eq!(settings.retry_delay, Duration::from_millis(1_000));
    }

    #[test]
    fn per_route_above_total_is_rejected() {
        let profile = TransportProfile::builder("broken")
            .max_connections(10)
            .max_connections_per_route(11)
            .build();
        let err = profile.resolve(&ApiConfig::default()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::PerRouteExceedsTotal {
                name: "broken".into(),
                per_route: 11,
                total: 10
            }
        );
    }

    #[test]
    fn inherited_values_are_checked_too() {
        // per-route default is 20, so a total of 5 breaks the invariant
        let profile = TransportProfile::builder("small").max_connections(5).build();
        assert!(matches!(
            profile.resolve(&ApiConfig::default()),
            Err(ConfigError::PerRouteExceedsTotal { .. })
        ));
    }

    #[test]
    fn zero_timeouts_and_pools_are_rejected() {
        let defaults = ApiConfig::default();
        let zero_read = TransportProfile::builder("z").read_timeout_ms(0).build();
        assert!(matches!(
            zero_read.resolve(&defaults),
            Err(ConfigError::ZeroTimeout { field: "read timeout", .. })
        ));
        let zero_pool = TransportProfile::builder("z")
            .max_connections_per_route(0)
            .build();
        assert!(matches!(
            zero_pool.resolve(&defaults),
            Err(ConfigError::ZeroConnections { .. })
        ));
    }

    #[test]
    fn every_preset_is_valid() {
        let defaults = ApiConfig::default();
        for (pattern, profile) in standard_profiles() {
            assert!(profile.resolve(&defaults).is_ok(), "{pattern}");
        }
        assert!(TransportProfile::fast_api().resolve(&defaults).is_ok());
        assert!(TransportProfile::slow_api().resolve(&defaults).is_ok());
    }
}
