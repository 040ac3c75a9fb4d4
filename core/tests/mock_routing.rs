//! Mock mode through the public dispatch API. No sockets are opened.

use std::sync::Arc;

use api_client_core::mock::{payment, user_service};
use api_client_core::{
    codes, ApiConfig, ApiRequest, ApiResponse, DispatchService, HttpMethod, MockResponse,
    MockRouter, ProfileRegistry,
};
use serde::Deserialize;
use serde_json::{json, Value};

fn mocked() -> (DispatchService, Arc<MockRouter>) {
    let registry = ProfileRegistry::new(ApiConfig::default().with_mocking(true)).unwrap();
    let router = Arc::new(MockRouter::with_builtin_handlers());
    let service = DispatchService::new(Arc::new(registry))
        .unwrap()
        .with_mock_router(Arc::clone(&router));
    (service, router)
}

#[test]
fn unregistered_url_is_mock_not_found() {
    let (service, _) = mocked();
    let request = ApiRequest::rest("https://nothing.example.com/x").build().unwrap();
    let response: ApiResponse<Value> = service.execute_rest(&request);
    assert_eq!(response.status_code(), 404);
    assert_eq!(response.error_code(), Some(codes::MOCK_NOT_FOUND));
    assert!(!response.success());
}

#[test]
fn generic_users_mock_end_to_end() {
    #[derive(Debug, Deserialize)]
    struct MockedUser {
        id: String,
        name: String,
    }

    let (service, router) = mocked();
    router
        .register_mock_response(
            "https://api.example.com/users/*",
            MockResponse::new(200).with_body(json!({"id": "any", "name": "Mock User"})),
        )
        .unwrap();

    let request = ApiRequest::rest("https://api.example.com/users/456").build().unwrap();
    let response: ApiResponse<MockedUser> = service.execute_auto(&request);
    assert!(response.success());
    assert_eq!(response.status_code(), 200);
    let user = response.body().unwrap();
    assert_eq!(user.name, "Mock User");
    assert_eq!(user.id, "any");
    assert_eq!(router.request_count("https://api.example.com/users/456"), 1);
}

#[test]
fn exact_mock_wins_regardless_of_order() {
    let (service, router) = mocked();
    router
        .register_mock_response("https://api.example.com/*", MockResponse::new(200).with_body(json!("wild")))
        .unwrap();
    router
        .register_mock_response(
            "https://api.example.com/exact",
            MockResponse::new(200).with_body(json!("exact")),
        )
        .unwrap();

    let request = ApiRequest::rest("https://api.example.com/exact").build().unwrap();
    let response: ApiResponse<String> = service.execute_rest(&request);
    assert_eq!(response.body().map(String::as_str), Some("exact"));
}

#[test]
fn scenario_header_beats_payment_inference() {
    let (service, _) = mocked();
    let request = ApiRequest::rest(format!("{}/process", payment::BASE_URL))
        .method(HttpMethod::Post)
        .header("X-Mock-Scenario", "insufficient_funds")
        .body(json!({"amount": 500.0, "cardNumber": "4111111111111111"}))
        .build()
        .unwrap();
    let response: ApiResponse<Value> = service.execute_rest(&request);
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.error_code(), Some("INSUFFICIENT_FUNDS"));
}

#[test]
fn reset_keeps_handler_and_restores_counters() {
    let (service, router) = mocked();
    let charge = ApiRequest::rest(format!("{}/process", payment::BASE_URL))
        .method(HttpMethod::Post)
        .body(json!({"amount": 25.0}))
        .build()
        .unwrap();

    let first: ApiResponse<Value> = service.execute_rest(&charge);
    let second: ApiResponse<Value> = service.execute_rest(&charge);
    assert_eq!(first.body().unwrap()["transactionId"], "txn_1001");
    assert_eq!(second.body().unwrap()["transactionId"], "txn_1002");

    assert!(router.reset_api_mock(payment::IDENTIFIER));
    assert!(router.has_api_mock(payment::IDENTIFIER));

    let after: ApiResponse<Value> = service.execute_rest(&charge);
    assert!(after.success());
    assert_eq!(after.body().unwrap()["transactionId"], "txn_1001");
}

#[test]
fn user_service_delete_then_get_is_not_found() {
    let (service, _) = mocked();
    let url = format!("{}/users/1", user_service::BASE_URL);

    let delete = ApiRequest::rest(&url).method(HttpMethod::Delete).build().unwrap();
    let deleted: ApiResponse<Value> = service.execute_rest(&delete);
    assert_eq!(deleted.status_code(), 200);
    assert_eq!(deleted.body().unwrap()["message"], "User deleted successfully");

    let get = ApiRequest::rest(&url).build().unwrap();
    let missing: ApiResponse<Value> = service.execute_rest(&get);
    assert_eq!(missing.status_code(), 404);
    assert_eq!(missing.error_code(), Some("USER_NOT_FOUND"));
}

#[test]
fn handler_body_converts_into_typed_target() {
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Profile {
        id: String,
        first_name: String,
    }

    let (service, _) = mocked();
    let request = ApiRequest::rest(format!("{}/users/2", user_service::BASE_URL))
        .build()
        .unwrap();
    let response: ApiResponse<Profile> = service.execute_rest(&request);
    let profile = response.body().unwrap();
    assert_eq!(profile.id, "2");
    assert_eq!(profile.first_name, "Jane");
}

#[test]
fn mock_mode_also_answers_soap_calls() {
    let (service, router) = mocked();
    router
        .register_mock_response(
            "https://ws.example.com/weather",
            MockResponse::new(200).with_body(json!({"temperature": 21})),
        )
        .unwrap();
    let request = ApiRequest::soap("https://ws.example.com/weather")
        .soap_action("GetWeather")
        .body(r#"{"city": "Oslo"}"#)
        .build()
        .unwrap();
    let response: ApiResponse<Value> = service.execute_auto(&request);
    assert_eq!(response.body().unwrap()["temperature"], 21);
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResult {
    transaction_id: String,
    amount: f64,
}

#[test]
fn typed_payment_failure_keeps_scenario_code() {
    let (service, _) = mocked();
    let request = ApiRequest::rest(format!("{}/process", payment::BASE_URL))
        .method(HttpMethod::Post)
        .header("X-Mock-Scenario", "insufficient_funds")
        .body(json!({"amount": 500.0}))
        .build()
        .unwrap();
    let response: ApiResponse<PaymentResult> = service.execute_rest(&request);
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.error_code(), Some("INSUFFICIENT_FUNDS"));
    assert!(response.body().is_none());

    let ok = ApiRequest::rest(format!("{}/process", payment::BASE_URL))
        .method(HttpMethod::Post)
        .body(json!({"amount": 75.0}))
        .build()
        .unwrap();
    let paid: ApiResponse<PaymentResult> = service.execute_rest(&ok);
    let result = paid.body().unwrap();
    assert!(result.transaction_id.starts_with("txn_"));
    assert_eq!(result.amount, 75.0);
}

#[test]
fn typed_user_lookup_after_delete_is_user_not_found() {
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct User {
        id: String,
        email: String,
    }

    let (service, _) = mocked();
    let url = format!("{}/users/1", user_service::BASE_URL);
    let get = ApiRequest::rest(&url).build().unwrap();

    let before: ApiResponse<User> = service.execute_rest(&get);
    let user = before.body().unwrap();
    assert_eq!(user.id, "1");
    assert_eq!(user.email, "john.doe@example.com");

    let delete = ApiRequest::rest(&url).method(HttpMethod::Delete).build().unwrap();
    let _: ApiResponse<Value> = service.execute_rest(&delete);

    let after: ApiResponse<User> = service.execute_rest(&get);
    assert_eq!(after.status_code(), 404);
    assert_eq!(after.error_code(), Some("USER_NOT_FOUND"));
    assert!(after.body().is_none());
}
