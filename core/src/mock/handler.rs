//! Pluggable per-API mock handlers and their scenario tables.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::request::ApiRequest;
use crate::response::ApiResponse;

/// Header naming the scenario a handler should play.
pub const SCENARIO_HEADER: &str = "X-Mock-Scenario";

/// A stateful simulator for one API.
///
/// A handler answers with a JSON body; the router converts it into the
/// caller's response type. Handlers are shared across threads, so any
/// state they keep lives behind their own locks.
pub trait MockHandler: Send + Sync + fmt::Debug {
    /// Stable key the handler is registered under.
    fn identifier(&self) -> &str;

    fn matches_url(&self, url: &str) -> bool;

    fn execute(&self, request: &ApiRequest) -> ApiResponse<Value>;

    /// Populate the scenario table. Called once during construction.
    fn setup_scenarios(&mut self);

    /// Restore initial state. Scenarios and registration are kept.
    fn reset(&self);
}

/// One canned outcome a handler can play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub status: u16,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub delay: Duration,
}

impl Scenario {
    pub fn success(name: &str, status: u16) -> Self {
        Self {
            name: name.to_string(),
            status,
            error_code: None,
            error_message: None,
            delay: Duration::ZERO,
        }
    }

    pub fn failure(name: &str, status: u16, code: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status,
            error_code: Some(code.to_string()),
            error_message: Some(message.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Scenarios by name, in setup order.
#[derive(Debug, Clone, Default)]
pub struct ScenarioTable {
    scenarios: Vec<Scenario>,
}

impl ScenarioTable {
    pub fn insert(&mut self, scenario: Scenario) {
        match self.scenarios.iter_mut().find(|s| s.name == scenario.name) {
            Some(slot) => *slot = scenario,
            None => self.scenarios.push(scenario),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    /// The scenario named by the request's scenario header, if it is known.
    /// Unknown names are ignored.
    pub fn requested(&self, request: &ApiRequest) -> Option<&Scenario> {
        request
            .header(SCENARIO_HEADER)
            .and_then(|name| self.get(name.trim()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ScenarioTable {
        let mut table = ScenarioTable::default();
        table.insert(Scenario::success("ok", 200));
        table.insert(Scenario::failure("down", 503, "DOWN", "service down").with_delay_ms(10));
        table
    }

    #[test]
    fn header_selects_known_scenario() {
        let request = ApiRequest::builder("https://x.com")
            .header("x-mock-scenario", "down")
            .build()
            .unwrap();
        let scenario = table().requested(&request).cloned().unwrap();
        assert_eq!(scenario.status, 503);
        assert_eq!(scenario.delay, Duration::from_millis(10));
        assert!(!scenario.is_success());
    }

    #[test]
    fn unknown_header_value_is_ignored() {
        let request = ApiRequest::builder("https://x.com")
            .header(SCENARIO_HEADER, "meteor_strike")
            .build()
            .unwrap();
        assert!(table().requested(&request).is_none());
    }

    #[test]
    fn insert_replaces_by_name() {
        let mut table = table();
        table.insert(Scenario::success("ok", 204));
        assert_eq!(table.names(), vec!["ok", "down"]);
        assert_eq!(table.get("ok").unwrap().status, 204);
    }
}
