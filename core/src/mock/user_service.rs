//! In-memory user service simulator.
//!
//! Routes `/users` CRUD and `/auth/{login,logout}` below its base URL. State
//! is a small user table seeded on construction and restored by `reset`.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::handler::{MockHandler, Scenario, ScenarioTable};
use super::payment::now_millis;
use crate::http::HttpMethod;
use crate::request::ApiRequest;
use crate::response::ApiResponse;

pub const IDENTIFIER: &str = "user-service";
pub const BASE_URL: &str = "https://user-service.example.com";

const RESPONSE_TIME_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockUser {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
}

impl MockUser {
    fn new(id: &str, email: &str, first_name: &str, last_name: &str, status: &str) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            status: status.to_string(),
        }
    }
}

fn seed() -> BTreeMap<u64, MockUser> {
    [
        MockUser::new("1", "john.doe@example.com", "John", "Doe", "active"),
        MockUser::new("2", "jane.smith@example.com", "Jane", "Smith", "active"),
        MockUser::new("3", "bob.wilson@example.com", "Bob", "Wilson", "inactive"),
        MockUser::new("999", "test.user@example.com", "Test", "User", "suspended"),
    ]
    .into_iter()
    .filter_map(|u| u.id.parse().ok().map(|id| (id, u)))
    .collect()
}

/// A handler outcome before headers are attached.
struct Outcome {
    status: u16,
    body: Value,
    error: Option<(&'static str, String)>,
}

impl Outcome {
    fn ok(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            error: None,
        }
    }

    fn fail(status: u16, code: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status,
            body: json!({
                "error": true,
                "statusCode": status,
                "message": message,
                "timestamp": now_millis(),
            }),
            error: Some((code, message)),
        }
    }
}

#[derive(Debug)]
pub struct UserServiceMock {
    scenarios: ScenarioTable,
    users: Mutex<BTreeMap<u64, MockUser>>,
}

impl UserServiceMock {
    pub fn new() -> Self {
        let mut mock = Self {
            scenarios: ScenarioTable::default(),
            users: Mutex::new(seed()),
        };
        mock.setup_scenarios();
        mock
    }

    pub fn user(&self, id: u64) -> Option<MockUser> {
        self.users.lock().get(&id).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().len()
    }

    fn route(&self, request: &ApiRequest, path: &str) -> Outcome {
        if path == "/users" || path.starts_with("/users/") {
            if let Some(scenario) = self.scenarios.requested(request) {
                if scenario.status >= 400 {
                    let message = scenario.error_message.clone().unwrap_or_default();
                    return Outcome::fail(scenario.status, "USER_SERVICE_ERROR", message);
                }
            }
            return self.users_endpoint(request, path);
        }
        if path.starts_with("/auth") {
            return self.auth_endpoint(request.method(), path);
        }
        Outcome::fail(404, "ENDPOINT_NOT_FOUND", format!("Endpoint not found: {path}"))
    }

    fn users_endpoint(&self, request: &ApiRequest, path: &str) -> Outcome {
        let id = match path.strip_prefix("/users/") {
            None => None,
            Some(raw) => match parse_id(raw) {
                Some(id) => Some(id),
                None => return Outcome::fail(400, "INVALID_ENDPOINT", "Invalid users endpoint"),
            },
        };
        match (request.method(), id) {
            (HttpMethod::Get, None) => self.list(),
            (HttpMethod::Get, Some(id)) => self.get(id),
            (HttpMethod::Post, None) => self.create(request),
            (HttpMethod::Put, Some(id)) => self.update(request, id),
            (HttpMethod::Delete, Some(id)) => self.delete(id),
            (HttpMethod::Post, Some(_)) | (HttpMethod::Put, None) | (HttpMethod::Delete, None) => {
                Outcome::fail(400, "INVALID_ENDPOINT", "Invalid users endpoint")
            }
            (method, _) => {
                Outcome::fail(405, "METHOD_NOT_ALLOWED", format!("Method not allowed: {method}"))
            }
        }
    }

    fn list(&self) -> Outcome {
        let users = self.users.lock();
        let all: Vec<&MockUser> = users.values().collect();
        Outcome::ok(
            200,
            json!({ "users": all, "total": users.len(), "page": 1, "limit": 10 }),
        )
    }

    fn get(&self, id: u64) -> Outcome {
        match self.users.lock().get(&id) {
            Some(user) => Outcome::ok(200, json!(user)),
            None => Outcome::fail(404, "USER_NOT_FOUND", format!("User not found: {id}")),
        }
    }

    fn create(&self, request: &ApiRequest) -> Outcome {
        let Some(fields) = object_body(request) else {
            return Outcome::fail(400, "INVALID_REQUEST", "Invalid request body");
        };
        let (Some(email), Some(first_name)) = (text(&fields, "email"), text(&fields, "firstName"))
        else {
            return Outcome::fail(400, "VALIDATION_ERROR", "Missing required fields: email, firstName");
        };

        let mut users = self.users.lock();
        let id = users.keys().next_back().map_or(1, |max| max + 1);
        let user = MockUser {
            id: id.to_string(),
            email,
            first_name,
            last_name: text(&fields, "lastName").unwrap_or_default(),
            status: "active".to_string(),
        };
        users.insert(id, user.clone());
        Outcome::ok(201, json!({ "user": user, "message": "User created successfully" }))
    }

    fn update(&self, request: &ApiRequest, id: u64) -> Outcome {
        let mut users = self.users.lock();
        let Some(existing) = users.get_mut(&id) else {
            return Outcome::fail(404, "USER_NOT_FOUND", "User not found");
        };
        let Some(fields) = object_body(request) else {
            return Outcome::fail(400, "INVALID_REQUEST", "Invalid request body");
        };
        if let Some(v) = text(&fields, "email") {
            existing.email = v;
        }
        if let Some(v) = text(&fields, "firstName") {
            existing.first_name = v;
        }
        if let Some(v) = text(&fields, "lastName") {
            existing.last_name = v;
        }
        if let Some(v) = text(&fields, "status") {
            existing.status = v;
        }
        Outcome::ok(200, json!({ "user": existing, "message": "User updated successfully" }))
    }

    fn delete(&self, id: u64) -> Outcome {
        match self.users.lock().remove(&id) {
            Some(_) => Outcome::ok(
                200,
                json!({ "message": "User deleted successfully", "userId": id.to_string() }),
            ),
            None => Outcome::fail(404, "USER_NOT_FOUND", "User not found"),
        }
    }

    fn auth_endpoint(&self, method: HttpMethod, path: &str) -> Outcome {
        match (method, path) {
            (HttpMethod::Post, "/auth/login") => {
                let stamp = now_millis();
                Outcome::ok(
                    200,
                    json!({
                        "token": format!("mock_jwt_token_{stamp}"),
                        "expiresIn": 3600,
                        "refreshToken": format!("mock_refresh_token_{stamp}"),
                    }),
                )
            }
            (HttpMethod::Post, "/auth/logout") => {
                Outcome::ok(200, json!({ "message": "Logout successful" }))
            }
            _ => Outcome::fail(404, "ENDPOINT_NOT_FOUND", "Auth endpoint not found"),
        }
    }
}

impl Default for UserServiceMock {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_id(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn object_body(request: &ApiRequest) -> Option<Map<String, Value>> {
    match request.body()?.to_json()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

impl MockHandler for UserServiceMock {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn matches_url(&self, url: &str) -> bool {
        url.contains(BASE_URL)
    }

    fn execute(&self, request: &ApiRequest) -> ApiResponse<Value> {
        let endpoint = request.url().replacen(BASE_URL, "", 1);
        let path = endpoint.split(['?', '#']).next().unwrap_or_default();
        debug!(method = %request.method(), path, "user service mock");

        let outcome = self.route(request, path);
        let mut response = ApiResponse::new(outcome.status);
        response.set_body(Some(outcome.body));
        if let Some((code, message)) = outcome.error {
            response.mark_as_error(code, message);
        }
        response.insert_header("X-User-Service", "Mock-Service-v1.0");
        response.insert_header("X-Request-Id", Uuid::new_v4().to_string());
        response.set_response_time_ms(RESPONSE_TIME_MS);
        response
    }

    fn setup_scenarios(&mut self) {
        let table = &mut self.scenarios;
        table.insert(Scenario::success("success", 200));
        table.insert(Scenario::failure("user_not_found", 404, "USER_NOT_FOUND", "User not found"));
        table.insert(Scenario::failure("validation_error", 400, "VALIDATION_ERROR", "Validation failed"));
        table.insert(Scenario::failure("unauthorized", 401, "UNAUTHORIZED", "Unauthorized access"));
        table.insert(Scenario::failure("forbidden", 403, "FORBIDDEN", "Access forbidden"));
        table.insert(Scenario::failure("server_error", 500, "SERVER_ERROR", "Internal server error"));
        info!(scenarios = ?table.names(), "user service mock scenarios ready");
    }

    fn reset(&self) {
        *self.users.lock() = seed();
        info!("user service mock data reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(mock: &UserServiceMock, method: HttpMethod, path: &str, body: Option<Value>) -> ApiResponse<Value> {
        let mut builder = ApiRequest::rest(format!("{BASE_URL}{path}")).method(method);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        mock.execute(&builder.build().unwrap())
    }

    #[test]
    fn list_returns_seed_users() {
        let mock = UserServiceMock::new();
        let response = call(&mock, HttpMethod::Get, "/users", None);
        assert!(response.success());
        let body = response.body().unwrap();
        assert_eq!(body["total"], 4);
        assert_eq!(body["users"][0]["firstName"], "John");
        assert_eq!(response.header("X-User-Service"), Some("Mock-Service-v1.0"));
        assert!(response.header("X-Request-Id").is_some());
        assert_eq!(response.response_time_ms(), 100);
    }

    #[test]
    fn get_missing_user_is_not_found() {
        let mock = UserServiceMock::new();
        let response = call(&mock, HttpMethod::Get, "/users/42", None);
        assert_eq!(response.status_code(), 404);
        assert_eq!(response.error_code(), Some("USER_NOT_FOUND"));
    }

    #[test]
    fn non_numeric_id_is_invalid_endpoint() {
        let mock = UserServiceMock::new();
        let response = call(&mock, HttpMethod::Get, "/users/abc", None);
        assert_eq!(response.status_code(), 400);
        assert_eq!(response.error_code(), Some("INVALID_ENDPOINT"));
    }

    #[test]
    fn create_assigns_next_id_after_max() {
        let mock = UserServiceMock::new();
        let response = call(
            &mock,
            HttpMethod::Post,
            "/users",
            Some(json!({"email": "new@example.com", "firstName": "New"})),
        );
        assert_eq!(response.status_code(), 201);
        assert_eq!(response.body().unwrap()["user"]["id"], "1000");
        assert_eq!(mock.user(1000).unwrap().last_name, "");
    }

    #[test]
    fn create_requires_email_and_first_name() {
        let mock = UserServiceMock::new();
        let response = call(&mock, HttpMethod::Post, "/users", Some(json!({"email": "x@y.z"})));
        assert_eq!(response.status_code(), 400);
        assert_eq!(response.error_code(), Some("VALIDATION_ERROR"));
        assert_eq!(mock.user_count(), 4);
    }

    #[test]
    fn create_with_unparsable_body_is_invalid_request() {
        let mock = UserServiceMock::new();
        let response = call(&mock, HttpMethod::Post, "/users", Some(Value::from("{oops")));
        assert_eq!(response.error_code(), Some("INVALID_REQUEST"));
    }

    #[test]
    fn update_merges_given_fields() {
        let mock = UserServiceMock::new();
        let response = call(&mock, HttpMethod::Put, "/users/2", Some(json!({"status": "inactive"})));
        assert!(response.success());
        let user = mock.user(2).unwrap();
        assert_eq!(user.status, "inactive");
        assert_eq!(user.email, "jane.smith@example.com");
    }

    #[test]
    fn update_missing_user_is_not_found() {
        let mock = UserServiceMock::new();
        let response = call(&mock, HttpMethod::Put, "/users/77", Some(json!({"status": "x"})));
        assert_eq!(response.error_code(), Some("USER_NOT_FOUND"));
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let mock = UserServiceMock::new();
        let deleted = call(&mock, HttpMethod::Delete, "/users/3", None);
        assert_eq!(deleted.body().unwrap()["userId"], "3");
        let again = call(&mock, HttpMethod::Get, "/users/3", None);
        assert_eq!(again.status_code(), 404);
        let twice = call(&mock, HttpMethod::Delete, "/users/3", None);
        assert_eq!(twice.error_code(), Some("USER_NOT_FOUND"));
    }

    #[test]
    fn patch_is_not_allowed() {
        let mock = UserServiceMock::new();
        let response = call(&mock, HttpMethod::Patch, "/users/1", Some(json!({})));
        assert_eq!(response.status_code(), 405);
        assert_eq!(response.error_code(), Some("METHOD_NOT_ALLOWED"));
    }

    #[test]
    fn failing_scenario_header_short_circuits() {
        let mock = UserServiceMock::new();
        let request = ApiRequest::rest(format!("{BASE_URL}/users/1"))
            .method(HttpMethod::Delete)
            .header("X-Mock-Scenario", "forbidden")
            .build()
            .unwrap();
        let response = mock.execute(&request);
        assert_eq!(response.status_code(), 403);
        assert_eq!(response.error_code(), Some("USER_SERVICE_ERROR"));
        assert!(mock.user(1).is_some());
    }

    #[test]
    fn auth_endpoints() {
        let mock = UserServiceMock::new();
        let login = call(&mock, HttpMethod::Post, "/auth/login", None);
        assert_eq!(login.body().unwrap()["expiresIn"], 3600);
        let logout = call(&mock, HttpMethod::Post, "/auth/logout", None);
        assert!(logout.success());
        let other = call(&mock, HttpMethod::Get, "/auth/login", None);
        assert_eq!(other.status_code(), 404);
    }

    #[test]
    fn unknown_endpoint() {
        let mock = UserServiceMock::new();
        let response = call(&mock, HttpMethod::Get, "/orders", None);
        assert_eq!(response.error_code(), Some("ENDPOINT_NOT_FOUND"));
    }

    #[test]
    fn reset_restores_seed_data() {
        let mock = UserServiceMock::new();
        call(&mock, HttpMethod::Delete, "/users/1", None);
        assert!(mock.user(1).is_none());
        mock.reset();
        assert!(mock.user(1).is_some());
        assert_eq!(mock.user_count(), 4);
    }
}
