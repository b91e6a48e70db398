use axum::{
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use std::sync::Arc;

use super::AppState;

/// GET /healthz
pub async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = if state.store().ping().await.is_ok() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
    };

    (
        status.0,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        status.1,
    )
}
