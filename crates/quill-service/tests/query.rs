//! Query proxy integration tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "sk-privileged-do-not-leak";

async fn select_backend(harness: &TestHarness, endpoint: &str) {
    harness
        .server
        .put(&harness.account_path("/backend"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "project_ref": "proj-test",
            "public_endpoint": endpoint,
            "public_key": "anon-key",
            "privileged_key": SECRET,
        }))
        .await
        .assert_status_ok();
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn validation_failures_carry_their_code() {
    let harness = TestHarness::new();

    let cases = [
        (json!({"operation": "drop", "table": "users"}), "unsupported_operation"),
        (json!({"operation": "select", "table": "users; --"}), "invalid_identifier"),
        (json!({"operation": "delete", "table": "users"}), "missing_filter"),
        (json!({"operation": "insert", "table": "users"}), "missing_data"),
        (json!({"operation": "select", "table": "users", "limit": 5000}), "limit_exceeded"),
        (
            json!({"operation": "insert", "table": "users", "data": {"tags": ["a"]}}),
            "invalid_value_type",
        ),
        (
            json!({"operation": "select", "table": "users", "data": {"a": 1}}),
            "unexpected_field",
        ),
    ];

    for (request, code) in cases {
        let response = harness
            .server
            .post(&harness.account_path("/query"))
            .add_header("x-api-key", harness.service_api_key.clone())
            .json(&request)
            .await;

        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"]["code"], code, "request: {request}");
    }
}

#[tokio::test]
async fn valid_query_without_selection_is_conflict() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post(&harness.account_path("/query"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({"operation": "select", "table": "todos"}))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "no_backend_selected");
}

#[tokio::test]
async fn invalid_query_is_rejected_before_the_backend() {
    let harness = TestHarness::new();
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;
    select_backend(&harness, &server.uri()).await;

    harness
        .server
        .post(&harness.account_path("/query"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({"operation": "delete", "table": "todos"}))
        .await
        .assert_status_bad_request();
}

// ============================================================================
// Execution
// ============================================================================

#[tokio::test]
async fn select_is_proxied_with_privileged_key() {
    let harness = TestHarness::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/todos"))
        .and(query_param("select", "id,title"))
        .and(query_param("owner", "eq.u1"))
        .and(header("apikey", SECRET))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "title": "write tests"}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    select_backend(&harness, &server.uri()).await;

    let response = harness
        .server
        .post(&harness.account_path("/query"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "operation": "select",
            "table": "todos",
            "columns": ["id", "title"],
            "filters": {"owner": "u1"}
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["operation"], "select");
    assert_eq!(body["count"], 1);
    assert_eq!(body["rows"][0]["title"], "write tests");
}

#[tokio::test]
async fn update_matching_nothing_is_empty_success() {
    let harness = TestHarness::new();
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/todos"))
        .and(query_param("id", "eq.999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    select_backend(&harness, &server.uri()).await;

    let response = harness
        .server
        .post(&harness.account_path("/query"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "operation": "update",
            "table": "todos",
            "filters": {"id": 999},
            "data": {"done": true}
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["count"], 0);
    assert_eq!(body["rows"], json!([]));
}

#[tokio::test]
async fn provider_rejection_is_reported_without_the_key() {
    let harness = TestHarness::new();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/todos"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": format!("duplicate key, auth {SECRET}"),
            "details": null,
            "hint": null
        })))
        .mount(&server)
        .await;
    select_backend(&harness, &server.uri()).await;

    let response = harness
        .server
        .post(&harness.account_path("/query"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({
            "operation": "insert",
            "table": "todos",
            "data": {"id": 1}
        }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!response.text().contains(SECRET));
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "provider_rejected");
    assert_eq!(body["error"]["details"]["provider_status"], 409);
    assert_eq!(body["error"]["details"]["provider_code"], "23505");
}

#[tokio::test]
async fn provider_outage_is_bad_gateway() {
    let harness = TestHarness::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    select_backend(&harness, &server.uri()).await;

    let response = harness
        .server
        .post(&harness.account_path("/query"))
        .add_header("x-api-key", harness.service_api_key.clone())
        .json(&json!({"operation": "select", "table": "todos"}))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "provider_error");
}

#[tokio::test]
async fn query_requires_service_key() {
    let harness = TestHarness::new();

    harness
        .server
        .post(&harness.account_path("/query"))
        .json(&json!({"operation": "select", "table": "todos"}))
        .await
        .assert_status_unauthorized();
}
