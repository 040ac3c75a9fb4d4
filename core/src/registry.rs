//! URL-pattern registry that picks a transport per destination.
//!
//! # Design
//! Registrations live in two tiers. Pre-built transports are consulted
//! first, then transports built from profiles, then the default transport.
//! Within a tier the shared pattern rules apply (exact first, then the
//! first wildcard in registration order). Tier order is absolute: a
//! wildcard in the first tier beats an exact match in the second.
//!
//! Each profile is resolved and validated before anything is stored, so a
//! rejected profile leaves the registry untouched.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{standard_profiles, ApiConfig, TransportProfile};
use crate::error::ConfigError;
use crate::pattern::{self, UrlPattern};
use crate::transport::{Transport, TransportFactory, UreqTransportFactory};

/// Which tier a registration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Transport,
    Profile,
}

/// One line of a registry summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub pattern: String,
    pub tier: Tier,
    pub transport: String,
}

#[derive(Debug)]
struct ProfileEntry {
    pattern: UrlPattern,
    profile: TransportProfile,
    transport: Arc<dyn Transport>,
}

/// Maps URL patterns to transports.
#[derive(Debug)]
pub struct ProfileRegistry {
    config: ApiConfig,
    factory: Arc<dyn TransportFactory>,
    transports: RwLock<Vec<(UrlPattern, Arc<dyn Transport>)>>,
    profiles: RwLock<Vec<ProfileEntry>>,
    default_transport: Arc<dyn Transport>,
}

impl ProfileRegistry {
    /// Registry producing `ureq` transports.
    pub fn new(config: ApiConfig) -> Result<Self, ConfigError> {
        Self::with_factory(config, Arc::new(UreqTransportFactory))
    }

    pub fn with_factory(
        config: ApiConfig,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<Self, ConfigError> {
        let default_transport = factory.build(&config.default_settings()?)?;
        Ok(Self {
            config,
            factory,
            transports: RwLock::new(Vec::new()),
            profiles: RwLock::new(Vec::new()),
            default_transport,
        })
    }

    /// Registry preloaded with the stock profile mappings.
    pub fn with_standard_profiles(config: ApiConfig) -> Result<Self, ConfigError> {
        let registry = Self::new(config)?;
        for (pattern, profile) in standard_profiles() {
            registry.register_profile(pattern, profile)?;
        }
        Ok(registry)
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn default_transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.default_transport)
    }

    /// Register a pre-built transport. Replaces any earlier transport under
    /// the same pattern, keeping its position.
    pub fn register_transport(
        &self,
        pattern: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<(), ConfigError> {
        let compiled = UrlPattern::parse(pattern)?;
        let mut transports = self.transports.write();
        match transports.iter_mut().find(|(p, _)| p.as_str() == pattern) {
            Some(slot) => slot.1 = transport,
            None => transports.push((compiled, transport)),
        }
        info!(pattern, "registered transport");
        Ok(())
    }

    /// Resolve, validate and build a transport for `profile`.
    pub fn register_profile(
        &self,
        pattern: &str,
        profile: TransportProfile,
    ) -> Result<(), ConfigError> {
        let compiled = UrlPattern::parse(pattern)?;
        let settings = profile.resolve(&self.config)?;
        let transport = self.factory.build(&settings)?;

        let replaced = {
            let mut profiles = self.profiles.write();
            match profiles.iter_mut().find(|e| e.pattern.as_str() == pattern) {
                Some(entry) => {
                    entry.profile = profile;
                    Some(std::mem::replace(&mut entry.transport, transport))
                }
                None => {
                    profiles.push(ProfileEntry {
                        pattern: compiled,
                        profile,
                        transport,
                    });
                    None
                }
            }
        };
        if let Some(old) = replaced {
            release(pattern, &old);
        }
        info!(pattern, profile = %settings.name, "registered transport profile");
        Ok(())
    }

    /// Remove a pre-built transport and release it. Returns whether the
    /// pattern was registered.
    pub fn remove_transport(&self, pattern: &str) -> bool {
        let removed = {
            let mut transports = self.transports.write();
            transports
                .iter()
                .position(|(p, _)| p.as_str() == pattern)
                .map(|idx| transports.remove(idx))
        };
        match removed {
            Some((_, transport)) => {
                release(pattern, &transport);
                true
            }
            None => false,
        }
    }

    /// Remove a profile registration and release its transport.
    pub fn remove_profile(&self, pattern: &str) -> bool {
        let removed = {
            let mut profiles = self.profiles.write();
            profiles
                .iter()
                .position(|e| e.pattern.as_str() == pattern)
                .map(|idx| profiles.remove(idx))
        };
        match removed {
            Some(entry) => {
                release(pattern, &entry.transport);
                true
            }
            None => false,
        }
    }

    /// Drop every registration in both tiers and release each transport,
    /// the same as removing them one by one.
    pub fn clear(&self) {
        let transports = std::mem::take(&mut *self.transports.write());
        let profiles = std::mem::take(&mut *self.profiles.write());
        for (pattern, transport) in &transports {
            release(pattern.as_str(), transport);
        }
        for entry in &profiles {
            release(entry.pattern.as_str(), &entry.transport);
        }
        debug!(
            transports = transports.len(),
            profiles = profiles.len(),
            "cleared transport registry"
        );
    }

    /// The transport for `url`. Always yields one.
    pub fn resolve_transport(&self, url: &str) -> Arc<dyn Transport> {
        if let Some(transport) = pattern::resolve(
            url,
            self.transports.read().iter().map(|(p, t)| (p, t)),
        ) {
            debug!(url, transport = transport.name(), "resolved pre-built transport");
            return Arc::clone(transport);
        }
        let profiles = self.profiles.read();
        if let Some(transport) = pattern::resolve(
            url,
            profiles.iter().map(|e| (&e.pattern, &e.transport)),
        ) {
            debug!(url, transport = transport.name(), "resolved profile transport");
            return Arc::clone(transport);
        }
        Arc::clone(&self.default_transport)
    }

    /// The profile registered under exactly `pattern`.
    pub fn profile(&self, pattern: &str) -> Option<TransportProfile> {
        self.profiles
            .read()
            .iter()
            .find(|e| e.pattern.as_str() == pattern)
            .map(|e| e.profile.clone())
    }

    /// Every registration in resolution order.
    pub fn entries(&self) -> Vec<RegistryEntry> {
        let mut out: Vec<RegistryEntry> = self
            .transports
            .read()
            .iter()
            .map(|(p, t)| RegistryEntry {
                pattern: p.as_str().to_string(),
                tier: Tier::Transport,
                transport: t.name().to_string(),
            })
            .collect();
        out.extend(self.profiles.read().iter().map(|e| RegistryEntry {
            pattern: e.pattern.as_str().to_string(),
            tier: Tier::Profile,
            transport: e.transport.name().to_string(),
        }));
        out
    }
}

fn release(pattern: &str, transport: &Arc<dyn Transport>) {
    if let Err(e) = transport.release() {
        warn!(pattern, transport = transport.name(), error = %e, "failed to release transport");
    }
}
