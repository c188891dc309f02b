//! End-to-end tests: HTTP transport, JSON-RPC routing, dispatch and
//! compaction, with upstream APIs served by a local mock server.
//!
//! Run with: cargo test --test server_tests

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use devlink_mcp::api::{create_router, ServerState};
use devlink_mcp::{build_server, Config};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config with every upstream pointed at `base`; JIRA and Slack enabled,
/// Google Calendar left unconfigured.
fn config_for(base: &str) -> Config {
    Config {
        server_port: 0,
        upstream_timeout_secs: 5,
        github_token: Some("ghp_test".into()),
        github_api_url: base.to_string(),
        jira_base_url: Some(base.to_string()),
        jira_email: Some("dev@acme.test".into()),
        jira_api_token: Some("secret".into()),
        slack_bot_token: Some("xoxb-test".into()),
        slack_team_id: None,
        slack_api_url: base.to_string(),
        google_client_id: None,
        google_client_secret: None,
        google_refresh_token: None,
        google_token_url: format!("{}/token", base),
        google_calendar_api_url: base.to_string(),
    }
}

fn app(config: &Config) -> Router {
    let server = build_server(config).unwrap();
    create_router(Arc::new(ServerState { mcp: server }))
}

async fn post_rpc(app: Router, body: String) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn call_tool(app: Router, name: &str, arguments: Value) -> Value {
    let frame = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    });
    let (status, body) = post_rpc(app, frame.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    body
}

fn envelope_text(response: &Value) -> &str {
    response["result"]["content"][0]["text"].as_str().unwrap()
}

// ============================================================================
// Transport
// ============================================================================

#[tokio::test]
async fn test_health_reports_integrations() {
    let app = app(&config_for("http://127.0.0.1:9"));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert_eq!(body["integrations"]["github"], true);
    assert_eq!(body["integrations"]["jira"], true);
    assert_eq!(body["integrations"]["slack"], true);
    assert_eq!(body["integrations"]["google_calendar"], false);
}

#[tokio::test]
async fn test_tools_list_over_http() {
    let app = app(&config_for("http://127.0.0.1:9"));
    let (status, body) = post_rpc(
        app,
        r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#.to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "a");
    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 20);
    assert!(tools.iter().any(|t| t["name"] == "mapGitHubPrToJiraIssues"));
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let app = app(&config_for("http://127.0.0.1:9"));
    let (status, body) = post_rpc(app, "{not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn test_notification_is_accepted_without_body() {
    let app = app(&config_for("http://127.0.0.1:9"));
    let (status, body) = post_rpc(
        app,
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#.to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, Value::Null);
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_string_length_counts_code_points() {
    let app = app(&config_for("http://127.0.0.1:9"));
    let response = call_tool(app, "getStringLength", json!({"input": "Hello 👋 World"})).await;
    assert_eq!(envelope_text(&response), "13");
    assert_eq!(response["result"]["isError"], false);
}

#[tokio::test]
async fn test_unknown_tool_envelope() {
    let app = app(&config_for("http://127.0.0.1:9"));
    let response = call_tool(app, "doesNotExist", json!({})).await;
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(envelope_text(&response), "Unknown tool: doesNotExist");
}

#[tokio::test]
async fn test_missing_required_argument_is_invalid_params() {
    let app = app(&config_for("http://127.0.0.1:9"));
    let response = call_tool(app, "getGitHubRepoInfo", json!({"owner": "octocat"})).await;
    assert_eq!(response["error"]["code"], -32602);
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .contains("repo"));
}

#[tokio::test]
async fn test_pull_requests_are_compacted() {
    let server = MockServer::start().await;
    let prs: Vec<Value> = (1..=5)
        .map(|n| {
            json!({
                "number": n,
                "title": format!("PROJ-{} change {}", n, n),
                "state": "open",
                "created_at": "2024-03-01T10:00:00Z",
                "updated_at": "2024-03-02T10:00:00Z",
                "merged_at": null,
                "user": {"login": "octocat", "id": 1, "avatar_url": "https://avatars/1"},
                "labels": [{"name": "bug", "color": "d73a4a"}],
                "html_url": format!("https://github.com/o/r/pull/{}", n),
                "body": "x".repeat(2000),
                "_links": {"self": {"href": "https://api.github.com/repos/o/r/pulls/1"}}
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/repos/o/r/pulls"))
        .and(query_param("per_page", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(prs)))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&config_for(&server.uri()));
    let response = call_tool(app, "getGitHubPullRequests", json!({"owner": "o", "repo": "r"})).await;
    assert_eq!(response["result"]["isError"], false);

    let items: Value = serde_json::from_str(envelope_text(&response)).unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 5);
    assert_eq!(items[0]["number"], 1);
    assert_eq!(items[4]["number"], 5);
    assert_eq!(items[0]["user"], json!({"login": "octocat"}));
    assert_eq!(items[0]["labels"], json!(["bug"]));
    assert!(items[0].get("body").is_none());
    assert!(items[0].get("_links").is_none());
}

#[tokio::test]
async fn test_pull_requests_with_pagination_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/pulls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"number": 1, "title": "a"},
            {"number": 2, "title": "b"}
        ])))
        .mount(&server)
        .await;

    let app = app(&config_for(&server.uri()));
    let response = call_tool(
        app,
        "getGitHubPullRequests",
        json!({"owner": "o", "repo": "r", "per_page": 2, "include_pagination": true}),
    )
    .await;
    let body: Value = serde_json::from_str(envelope_text(&response)).unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["per_page"], 2);
    assert_eq!(body["pagination"]["total_items"], "unknown");
}

#[tokio::test]
async fn test_upstream_failure_becomes_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/o/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&server)
        .await;

    let app = app(&config_for(&server.uri()));
    let response = call_tool(app, "getGitHubRepoInfo", json!({"owner": "o", "repo": "gone"})).await;
    assert_eq!(response["result"]["isError"], true);
    let text = envelope_text(&response);
    assert!(text.contains("GitHub API error: 404"));
    assert!(text.contains("Not Found"));
}

#[tokio::test]
async fn test_unconfigured_integration_names_settings() {
    let app = app(&config_for("http://127.0.0.1:9"));
    let response = call_tool(
        app,
        "google_calendar_get_events",
        json!({"calendarId": "primary"}),
    )
    .await;
    assert_eq!(response["result"]["isError"], true);
    assert!(envelope_text(&response).contains("GOOGLE_REFRESH_TOKEN"));
}

#[tokio::test]
async fn test_pr_to_jira_mapping_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/o/r/pulls"))
        .and(query_param("state", "all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "number": 7,
                "title": "PROJ-12: fix login",
                "body": "Also touches PROJ-13 and OTHER-1",
                "state": "closed",
                "html_url": "https://github.com/o/r/pull/7",
                "user": {"login": "dev"}
            },
            {"number": 8, "title": "chore: bump deps", "body": null, "state": "open"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/api/3/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issues": [
                {"key": "PROJ-12", "fields": {"summary": "Login broken", "status": {"name": "Done"}}},
                {"key": "PROJ-13", "fields": {"summary": "Session expiry", "status": {"name": "To Do"}}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = app(&config_for(&server.uri()));
    let response = call_tool(
        app,
        "mapGitHubPrToJiraIssues",
        json!({"owner": "o", "repo": "r", "projectKey": "PROJ"}),
    )
    .await;
    assert_eq!(response["result"]["isError"], false);

    let report: Value = serde_json::from_str(envelope_text(&response)).unwrap();
    assert_eq!(report["repository"], "o/r");
    assert_eq!(report["jira_project"], "PROJ");
    assert_eq!(report["total_mapped_prs"], 1);
    assert_eq!(report["total_jira_issues"], 2);
    let mapping = &report["mappings"][0];
    assert_eq!(mapping["pr_number"], 7);
    assert_eq!(mapping["jira_keys"], json!(["PROJ-12", "PROJ-13"]));
    assert_eq!(mapping["jira_issues"][0]["status"], "Done");
}
