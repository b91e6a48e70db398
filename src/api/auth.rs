use axum::{
    Form,
    extract::{Query, Request, State, rejection::FormRejection},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use cookie::time::Duration as CookieAge;
use cookie::{Cookie, SameSite};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{error, info};

use super::{ApiError, AppState};
use crate::constants::{http, session};
use crate::services::normalize_login;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginQuery {
    pub next: String,
    pub err: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub next: String,
}

// ============================================================================
// Access policy
// ============================================================================

/// What a request needs before it reaches a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Directory not configured; authentication is off.
    Open,
    Public,
    /// API write. Passes without a session unless a write token is configured.
    Write,
    Session,
}

#[must_use]
pub fn required_access(auth_enabled: bool, method: &Method, path: &str) -> Access {
    if !auth_enabled {
        return Access::Open;
    }
    if http::PUBLIC_PATHS.contains(&path) {
        return Access::Public;
    }
    if path.starts_with("/api/") && *method != Method::GET && *method != Method::HEAD {
        return Access::Write;
    }
    Access::Session
}

/// Keeps only in-application absolute paths; anything else becomes `/`.
#[must_use]
pub fn safe_next(raw: &str) -> String {
    let next = raw.trim();
    if next.is_empty()
        || next.starts_with("http://")
        || next.starts_with("https://")
        || !next.starts_with('/')
        || next.starts_with("//")
        || next.starts_with("/\\")
    {
        return "/".to_string();
    }
    next.to_string()
}

// ============================================================================
// Middleware
// ============================================================================

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let access = required_access(
        state.shared.auth_enabled(),
        request.method(),
        request.uri().path(),
    );

    match access {
        Access::Open | Access::Public => next.run(request).await,
        Access::Write => {
            if session_user(&state, request.headers()).is_some()
                || write_token_accepted(&state, request.headers())
            {
                next.run(request).await
            } else {
                ApiError::unauthorized("invalid or missing API token").into_response()
            }
        }
        Access::Session => {
            if session_user(&state, request.headers()).is_some() {
                return next.run(request).await;
            }
            let target = request
                .uri()
                .path_and_query()
                .map_or("/", |pq| pq.as_str());
            login_redirect(target, None)
        }
    }
}

fn write_token_accepted(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(expected) = state.config().auth.write_api_token.as_deref() else {
        return true;
    };
    headers
        .get(http::WRITE_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|given| bool::from(given.as_bytes().ct_eq(expected.as_bytes())))
}

/// Username from a valid session cookie.
fn session_user(state: &AppState, headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .filter(|c| c.name() == session::COOKIE_NAME)
        .find_map(|c| state.sessions().validate(c.value()))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /login
pub async fn login_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
) -> Response {
    if !state.shared.auth_enabled() || session_user(&state, &headers).is_some() {
        return found(&safe_next(&query.next));
    }

    let path = Path::new(&state.config().server.static_dir).join("login.html");
    let page = tokio::fs::read_to_string(&path)
        .await
        .unwrap_or_else(|_| FALLBACK_LOGIN_PAGE.to_string());

    (
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Html(page),
    )
        .into_response()
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Response {
    let Ok(Form(form)) = form else {
        return login_redirect("/", Some(http::LOGIN_BAD_FORM));
    };
    let next = safe_next(&form.next);

    let Some(verifier) = state.shared.verifier.as_ref() else {
        return found(&next);
    };

    match verifier.verify(&form.username, &form.password).await {
        Ok(true) => {
            let login = normalize_login(&form.username);
            let token = state.sessions().issue(&login);
            info!(login = %login, "Session issued");

            let cookie = session_cookie(&state, token);
            let mut response = found(&next);
            append_cookie(&mut response, &cookie);
            response
        }
        Ok(false) => login_redirect(&next, Some(http::LOGIN_REJECTED)),
        Err(e) => {
            error!(error = %e, "Login failed on directory error");
            login_redirect(&next, Some(http::LOGIN_FAILED))
        }
    }
}

/// GET /logout
pub async fn logout(State(state): State<Arc<AppState>>) -> Response {
    let mut cookie = session_cookie(&state, String::new());
    cookie.set_max_age(CookieAge::ZERO);

    let mut response = found("/login");
    append_cookie(&mut response, &cookie);
    response
}

// ============================================================================
// Helpers
// ============================================================================

fn session_cookie(state: &AppState, value: String) -> Cookie<'static> {
    let ttl = i64::try_from(state.sessions().ttl().as_secs()).unwrap_or(i64::MAX);
    Cookie::build((session::COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config().session.secure_cookie)
        .max_age(CookieAge::seconds(ttl))
        .build()
}

fn append_cookie(response: &mut Response, cookie: &Cookie<'_>) {
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}

fn login_redirect(next: &str, err: Option<&str>) -> Response {
    let mut location = format!("/login?next={}", urlencoding::encode(&safe_next(next)));
    if let Some(err) = err {
        location.push_str("&err=");
        location.push_str(&urlencoding::encode(err));
    }
    found(&location)
}

/// 302 with a `Location` header.
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => (
            StatusCode::FOUND,
            [(header::LOCATION, HeaderValue::from_static("/"))],
        )
            .into_response(),
    }
}

const FALLBACK_LOGIN_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<form method="post" action="/login">
  <input name="username" placeholder="Login" autocomplete="username" required>
  <input name="password" type="password" placeholder="Password" autocomplete="current-password" required>
  <input name="next" type="hidden" id="next">
  <button type="submit">Sign in</button>
  <p id="err"></p>
</form>
<script>
  const q = new URLSearchParams(location.search);
  document.getElementById("next").value = q.get("next") || "/";
  document.getElementById("err").textContent = q.get("err") || "";
</script>
</body>
</html>
"#;
