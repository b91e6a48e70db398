use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    middleware,
    routing::{get, post},
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::services::SessionCodec;
use crate::state::SharedState;

pub mod auth;
mod error;
mod licenses;
mod meetings;
mod system;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionCodec {
        &self.shared.sessions
    }
}

#[must_use]
pub fn create_app_state(shared: Arc<SharedState>) -> Arc<AppState> {
    Arc::new(AppState { shared })
}

pub fn router(state: Arc<AppState>) -> Router {
    let (static_dir, request_timeout) = {
        let server = &state.config().server;
        (
            server.static_dir.clone(),
            Duration::from_secs(server.request_timeout_seconds.max(1)),
        )
    };

    let api_router = Router::new()
        .route("/state", get(licenses::get_state))
        .route("/users/all", get(users::list_all_users))
        .route("/users/import", post(users::import_users))
        .route("/computers", get(users::list_computers))
        .route("/licenses/import", post(licenses::import_licenses))
        .route("/assign", post(licenses::assign))
        .route("/license/update", post(licenses::update))
        .route("/license/unassign", post(licenses::unassign))
        .route("/meetings/import", post(meetings::import_meetings))
        .route("/meetings", get(meetings::get_meetings))
        .fallback(api_not_found);

    let index = Path::new(&static_dir).join("index.html");
    let static_files = ServeDir::new(&static_dir).fallback(ServeFile::new(index));

    Router::new()
        .route("/healthz", get(system::healthz))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout))
        .nest("/api", api_router)
        .fallback_service(static_files)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

async fn api_not_found() -> ApiError {
    ApiError::not_found("not found")
}
