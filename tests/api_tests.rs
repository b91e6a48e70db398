use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use onessa::clients::ldap::{
    BindOutcome, DirectoryAuthenticator, DirectoryError, DirectorySource,
};
use onessa::config::Config;
use onessa::db::Store;
use onessa::models::directory::{DirectoryComputer, DirectoryUser};
use onessa::state::{DirectoryBackend, SharedState};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

/// Knows one account: `jdoe` / `secret`.
struct FakeDirectory;

#[async_trait::async_trait]
impl DirectorySource for FakeDirectory {
    async fn fetch_users(&self) -> Result<Vec<DirectoryUser>, DirectoryError> {
        Ok(vec![])
    }

    async fn fetch_computers(&self) -> Result<Vec<DirectoryComputer>, DirectoryError> {
        Ok(vec![])
    }
}

#[async_trait::async_trait]
impl DirectoryAuthenticator for FakeDirectory {
    async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> Result<BindOutcome, DirectoryError> {
        Ok(match (login, password) {
            ("jdoe", "secret") => BindOutcome::Authenticated,
            ("jdoe", _) => BindOutcome::InvalidPassword,
            _ => BindOutcome::UnknownLogin,
        })
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    let path = std::env::temp_dir().join(format!("onessa-api-{}.sqlite", uuid::Uuid::new_v4()));
    config.general.database_path = format!("sqlite:{}", path.display());
    config.server.static_dir = std::env::temp_dir()
        .join("onessa-no-static")
        .display()
        .to_string();
    config.session.secret = "integration-secret".to_string();
    config
}

async fn build_app(config: Config, with_directory: bool) -> Router {
    let store = Store::new(&config.database_url())
        .await
        .expect("Failed to open store");

    let backend = with_directory.then(|| {
        let directory = Arc::new(FakeDirectory);
        DirectoryBackend {
            source: directory.clone(),
            authenticator: directory,
        }
    });

    let shared = SharedState::with_backend(config, store, backend).expect("Failed to build state");
    onessa::api::router(onessa::api::create_app_state(Arc::new(shared)))
}

/// Directory switched off: authentication disabled.
async fn spawn_open_app() -> Router {
    build_app(test_config(), false).await
}

/// Directory configured, optional write token.
async fn spawn_gated_app(write_token: Option<&str>) -> Router {
    let mut config = test_config();
    config.directory.url = "ldap://directory.invalid".to_string();
    config.directory.base_dn = "dc=corp,dc=example".to_string();
    config.auth.write_api_token = write_token.map(str::to_string);
    build_app(config, true).await
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response is not JSON")
}

fn location(response: &axum::response::Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

/// `name=value` part of the first `Set-Cookie` header.
fn session_cookie(response: &axum::response::Response) -> String {
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(post_form("/login", "username=jdoe&password=secret&next=%2F"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    session_cookie(&response)
}

#[tokio::test]
async fn test_healthz_is_public() {
    let app = spawn_gated_app(None).await;

    let response = app.clone().oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = spawn_gated_app(None).await;

    let response = app.clone().oneshot(get("/api/state")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());

    let request = Request::builder()
        .uri("/healthz")
        .header("x-request-id", "edge-42")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "edge-42");
}

#[tokio::test]
async fn test_gate_lets_writes_through_and_redirects_reads() {
    let app = spawn_gated_app(None).await;

    // Reaches the handler, which rejects the zero ids.
    let response = app
        .clone()
        .oneshot(post_json("/api/assign", &json!({"user_id": 0, "license_id": 0})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.clone().oneshot(get("/api/state")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login?next=%2Fapi%2Fstate");
}

#[tokio::test]
async fn test_gate_redirect_keeps_query() {
    let app = spawn_gated_app(None).await;

    let response = app
        .clone()
        .oneshot(get("/meetings.html?week=3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        "/login?next=%2Fmeetings.html%3Fweek%3D3"
    );
}

#[tokio::test]
async fn test_write_token_required_when_configured() {
    let app = spawn_gated_app(Some("t0ken")).await;
    let body = json!({"licenses": [{"key": "AAA-111"}]});

    let response = app
        .clone()
        .oneshot(post_json("/api/licenses/import", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await["error"],
        "invalid or missing API token"
    );

    let mut request = post_json("/api/licenses/import", &body);
    request
        .headers_mut()
        .insert("X-API-Token", "wrong".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = post_json("/api/licenses/import", &body);
    request
        .headers_mut()
        .insert("X-API-Token", "t0ken".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["licenses_imported"], 1);
}

#[tokio::test]
async fn test_session_bypasses_write_token() {
    let app = spawn_gated_app(Some("t0ken")).await;
    let cookie = login(&app).await;

    let mut request = post_json("/api/licenses/import", &json!({"licenses": [{"key": "K"}]}));
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_sets_cookie_and_opens_reads() {
    let app = spawn_gated_app(None).await;

    let response = app
        .clone()
        .oneshot(post_form(
            "/login",
            "username=CORP%5CJDoe&password=secret&next=%2Fimport.html",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/import.html");

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("cp_session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));
    assert!(!set_cookie.contains("Secure"));

    let cookie = session_cookie(&response);
    let mut request = get("/api/state");
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert!(body["users"].is_array());
    assert!(body["licenses"].is_array());
}

#[tokio::test]
async fn test_login_rejections_redirect_back() {
    let app = spawn_gated_app(None).await;

    let response = app
        .clone()
        .oneshot(post_form(
            "/login",
            "username=jdoe&password=nope&next=%2Fdashboard",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        "/login?next=%2Fdashboard&err=invalid%20login%2Fpassword%20or%20no%20access"
    );
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let response = app
        .clone()
        .oneshot(post_form(
            "/login",
            "username=ghost&password=secret&next=%2F",
        ))
        .await
        .unwrap();
    assert!(location(&response).starts_with("/login?next=%2F&err="));
}

#[tokio::test]
async fn test_login_never_redirects_off_site() {
    let app = spawn_gated_app(None).await;

    let response = app
        .clone()
        .oneshot(post_form(
            "/login",
            "username=jdoe&password=secret&next=https%3A%2F%2Fevil.example%2Fx",
        ))
        .await
        .unwrap();
    assert_eq!(location(&response), "/");

    let cookie = session_cookie(&response);
    let mut request = get("/login?next=%2F%2Fevil.example");
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_login_page_served_without_session() {
    let app = spawn_gated_app(None).await;

    let response = app.clone().oneshot(get("/login")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn test_tampered_cookie_is_rejected() {
    let app = spawn_gated_app(None).await;
    let cookie = login(&app).await;

    let tampered = format!("{}x", cookie);
    let mut request = get("/api/state");
    request
        .headers_mut()
        .insert(header::COOKIE, tampered.parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = spawn_gated_app(None).await;

    let response = app.clone().oneshot(get("/logout")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login");

    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("cp_session=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_auth_disabled_without_directory() {
    let app = spawn_open_app().await;

    let response = app.clone().oneshot(get("/api/state")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get("/login?next=%2Fmeetings.html"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/meetings.html");
}

#[tokio::test]
async fn test_unknown_api_route_is_json_404() {
    let app = spawn_open_app().await;

    let response = app.clone().oneshot(get("/api/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "not found");
}

#[tokio::test]
async fn test_license_import_reports_duplicates() {
    let app = spawn_open_app().await;

    let body = json!({"licenses": [
        {"key": "AAA-111", "comment": "office"},
        {"key": "AAA-111"},
        {"key": "   "},
    ]});
    let response = app
        .clone()
        .oneshot(post_json("/api/licenses/import", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["licenses_imported"], 1);
    assert_eq!(
        body["warnings"],
        json!(["duplicate key: AAA-111", "skipped a license without key"])
    );

    // Re-importing the same key is still not an error.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/licenses/import",
            &json!({"licenses": [{"key": "AAA-111"}]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["licenses_imported"], 0);
}

#[tokio::test]
async fn test_empty_imports_are_rejected() {
    let app = spawn_open_app().await;

    for (uri, body) in [
        ("/api/licenses/import", json!({"licenses": []})),
        ("/api/users/import", json!({"users": []})),
        ("/api/meetings/import", json!({"exported_at": "x", "items": []})),
    ] {
        let response = app.clone().oneshot(post_json(uri, &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert!(json_body(response).await["error"].is_string());
    }
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = spawn_open_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/assign")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_manual_user_import_disabled_with_directory() {
    let app = spawn_gated_app(None).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/users/import",
            &json!({"users": [{"name": "Alice", "email": "alice@corp.example"}]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_assign_update_unassign_flow() {
    let app = spawn_open_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/users/import",
            &json!({"users": [
                {"name": "Alice", "email": "Alice@Corp.Example"},
                {"name": "", "email": ""},
            ]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["users_imported"], 1);
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);

    app.clone()
        .oneshot(post_json(
            "/api/licenses/import",
            &json!({"licenses": [{"key": "KEY-1"}]}),
        ))
        .await
        .unwrap();

    let state = json_body(app.clone().oneshot(get("/api/state")).await.unwrap()).await;
    let user_id = state["users"][0]["id"].as_i64().unwrap();
    let license_id = state["licenses"][0]["id"].as_i64().unwrap();
    assert_eq!(state["users"][0]["email"], "alice@corp.example");
    assert!(state["licenses"][0]["assigned_user_id"].is_null());

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/assign",
            &json!({"user_id": user_id, "license_id": license_id}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/license/update",
            &json!({"license_id": license_id, "comment": "  laptop  ", "pc": "WS-01"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let state = json_body(app.clone().oneshot(get("/api/state")).await.unwrap()).await;
    assert_eq!(state["licenses"][0]["assigned_user_id"], user_id);
    assert_eq!(state["licenses"][0]["comment"], "laptop");
    assert_eq!(state["licenses"][0]["pc"], "WS-01");

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/license/unassign",
            &json!({"license_id": license_id}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let state = json_body(app.clone().oneshot(get("/api/state")).await.unwrap()).await;
    assert!(state["licenses"][0]["assigned_user_id"].is_null());
}

#[tokio::test]
async fn test_assign_unknown_targets_is_bad_request() {
    let app = spawn_open_app().await;

    app.clone()
        .oneshot(post_json(
            "/api/licenses/import",
            &json!({"licenses": [{"key": "KEY-1"}]}),
        ))
        .await
        .unwrap();
    let state = json_body(app.clone().oneshot(get("/api/state")).await.unwrap()).await;
    let license_id = state["licenses"][0]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/assign",
            &json!({"user_id": 999, "license_id": license_id}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/license/unassign",
            &json!({"license_id": 999}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_meetings_snapshot_replaced() {
    let app = spawn_open_app().await;

    let first = json!({
        "exported_at": "2025-03-01T08:00:00Z",
        "items": [
            {"id": "m1", "subject": "Standup", "start": "2025-03-03T09:00:00", "end": "2025-03-03T09:15:00"},
            {"id": "", "subject": "no id"},
        ]
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/meetings/import", &first))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["meetings_imported"], 1);

    let second = json!({
        "exported_at": "2025-03-02T08:00:00Z",
        "items": [
            {"id": "m3", "subject": "Review", "start": "2025-03-04T10:00:00", "is_recurring": true},
            {"id": "m2", "subject": "Planning", "start": "2025-03-03T11:00:00", "is_canceled": true},
        ]
    });
    app.clone()
        .oneshot(post_json("/api/meetings/import", &second))
        .await
        .unwrap();

    let snapshot = json_body(app.clone().oneshot(get("/api/meetings")).await.unwrap()).await;
    assert_eq!(snapshot["exported_at"], "2025-03-02T08:00:00Z");

    let items = snapshot["items"].as_array().unwrap();
    let ids: Vec<&str> = items.iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["m2", "m3"]);
    assert_eq!(items[0]["is_canceled"], true);
    assert_eq!(items[1]["is_recurring"], true);
}

#[tokio::test]
async fn test_meetings_repeated_id_counted_once() {
    let app = spawn_open_app().await;

    let body = json!({
        "exported_at": "2025-03-01T08:00:00Z",
        "items": [
            {"id": "x", "subject": "Draft"},
            {"id": "x", "subject": "Final"},
            {"id": "y", "subject": "Other"},
        ]
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/meetings/import", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["meetings_imported"], 2);

    let snapshot = json_body(app.clone().oneshot(get("/api/meetings")).await.unwrap()).await;
    let items = snapshot["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let x = items.iter().find(|m| m["id"] == "x").unwrap();
    assert_eq!(x["subject"], "Final");
}

#[tokio::test]
async fn test_computers_listing_starts_empty() {
    let app = spawn_open_app().await;

    let response = app.clone().oneshot(get("/api/computers")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["computers"], json!([]));
}
