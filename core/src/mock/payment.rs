//! Payment gateway simulator.
//!
//! Scenario selection: the scenario header, then the charge itself (tiny
//! amounts bounce, test card numbers fail, huge amounts time out), then
//! plain success. Every call consumes a transaction number.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::handler::{MockHandler, Scenario, ScenarioTable};
use crate::request::ApiRequest;
use crate::response::ApiResponse;

pub const IDENTIFIER: &str = "payment-api";
pub const BASE_URL: &str = "https://payment.gateway.com";

const FIRST_TRANSACTION: u64 = 1000;
const INVALID_CARD: &str = "4000000000000002";
const EXPIRED_CARD: &str = "4000000000000069";
const DEFAULT_AMOUNT: f64 = 100.0;

#[derive(Debug)]
pub struct PaymentMock {
    scenarios: ScenarioTable,
    transactions: AtomicU64,
}

impl PaymentMock {
    pub fn new() -> Self {
        let mut mock = Self {
            scenarios: ScenarioTable::default(),
            transactions: AtomicU64::new(FIRST_TRANSACTION),
        };
        mock.setup_scenarios();
        mock
    }

    /// The last transaction number handed out.
    pub fn last_transaction(&self) -> u64 {
        self.transactions.load(Ordering::SeqCst)
    }

    /// The scenario `request` would play, without playing it.
    pub fn scenario_for(&self, request: &ApiRequest) -> Scenario {
        if let Some(scenario) = self.scenarios.requested(request) {
            return scenario.clone();
        }
        let inferred = request
            .body()
            .and_then(|b| b.to_json())
            .and_then(|charge| infer(&charge))
            .unwrap_or("process_success");
        self.scenarios
            .get(inferred)
            .cloned()
            .unwrap_or_else(|| Scenario::success(inferred, 200))
    }
}

impl Default for PaymentMock {
    fn default() -> Self {
        Self::new()
    }
}

fn infer(charge: &Value) -> Option<&'static str> {
    let amount = charge.get("amount").and_then(Value::as_f64);
    let card = charge.get("cardNumber").and_then(Value::as_str);
    if amount.is_some_and(|a| a <= 1.0) {
        return Some("insufficient_funds");
    }
    if card == Some(INVALID_CARD) {
        return Some("invalid_card");
    }
    if card == Some(EXPIRED_CARD) {
        return Some("expired_card");
    }
    if amount.is_some_and(|a| a >= 999_999.0) {
        return Some("network_timeout");
    }
    if charge.get("test").and_then(Value::as_str) == Some("slow") {
        return Some("process_slow");
    }
    None
}

impl MockHandler for PaymentMock {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn matches_url(&self, url: &str) -> bool {
        url.contains(BASE_URL)
    }

    fn execute(&self, request: &ApiRequest) -> ApiResponse<Value> {
        let scenario = self.scenario_for(request);
        let transaction = self.transactions.fetch_add(1, Ordering::SeqCst) + 1;
        let endpoint = request.url().replacen(BASE_URL, "", 1);
        debug!(scenario = %scenario.name, %endpoint, transaction, "payment mock");

        if !scenario.delay.is_zero() {
            thread::sleep(scenario.delay);
        }

        let mut body = Map::new();
        if scenario.is_success() {
            let amount = request
                .body()
                .and_then(|b| b.to_json())
                .and_then(|c| c.get("amount").and_then(Value::as_f64))
                .unwrap_or(DEFAULT_AMOUNT);
            body.insert("transactionId".into(), json!(format!("txn_{transaction}")));
            body.insert("status".into(), json!("completed"));
            body.insert("amount".into(), json!(amount));
            body.insert("currency".into(), json!("USD"));
            body.insert("message".into(), json!("Payment processed successfully"));
        } else {
            body.insert("error".into(), json!(scenario.error_code));
            body.insert("message".into(), json!(scenario.error_message));
            if scenario.status == 429 {
                body.insert("retryAfter".into(), json!(60));
            }
        }
        body.insert("timestamp".into(), json!(now_millis()));

        let mut response = ApiResponse::new(scenario.status);
        response.set_body(Some(Value::Object(body)));
        response.set_response_time_ms(scenario.delay.as_millis() as u64);
        response.insert_header("X-Payment-Gateway", "Mock-Gateway-v2.0");
        response.insert_header("X-Transaction-Id", transaction.to_string());
        if let (Some(code), Some(message)) = (&scenario.error_code, &scenario.error_message) {
            response.mark_as_error(code.clone(), message.clone());
        }
        response
    }

    fn setup_scenarios(&mut self) {
        let table = &mut self.scenarios;
        table.insert(Scenario::success("process_success", 200));
        table.insert(Scenario::success("process_slow", 200).with_delay_ms(3_000));
        table.insert(
            Scenario::failure("insufficient_funds", 400, "INSUFFICIENT_FUNDS", "Insufficient funds in account")
                .with_delay_ms(100),
        );
        table.insert(
            Scenario::failure("invalid_card", 400, "INVALID_CARD", "Invalid card number").with_delay_ms(50),
        );
        table.insert(
            Scenario::failure("expired_card", 400, "EXPIRED_CARD", "Card has expired").with_delay_ms(50),
        );
        table.insert(
            Scenario::failure("network_timeout", 504, "GATEWAY_TIMEOUT", "Payment gateway timeout")
                .with_delay_ms(5_000),
        );
        table.insert(
            Scenario::failure(
                "service_unavailable",
                503,
                "SERVICE_UNAVAILABLE",
                "Payment service temporarily unavailable",
            )
            .with_delay_ms(100),
        );
        table.insert(
            Scenario::failure("rate_limit", 429, "RATE_LIMIT_EXCEEDED", "Too many payment requests")
                .with_delay_ms(100),
        );
        info!(scenarios = ?table.names(), "payment mock scenarios ready");
    }

    fn reset(&self) {
        self.transactions.store(FIRST_TRANSACTION, Ordering::SeqCst);
        info!("payment mock state reset");
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
