use axum::{Json, extract::State, extract::rejection::JsonRejection};
use std::sync::Arc;
use tracing::info;

use super::validation::validate_not_empty;
use super::{ApiError, AppState, ImportMeetingsRequest, ImportMeetingsResponse};
use crate::models::inventory::MeetingsSnapshot;

/// POST /api/meetings/import
///
/// Replaces the stored calendar export wholesale.
pub async fn import_meetings(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ImportMeetingsRequest>, JsonRejection>,
) -> Result<Json<ImportMeetingsResponse>, ApiError> {
    let Json(request) = payload?;
    validate_not_empty("items", &request.items)?;

    let imported = state
        .store()
        .replace_meetings(request.exported_at.trim(), &request.items)
        .await?;
    info!(imported, exported_at = %request.exported_at, "Meetings snapshot replaced");

    Ok(Json(ImportMeetingsResponse {
        status: "ok",
        meetings_imported: imported,
    }))
}

/// GET /api/meetings
pub async fn get_meetings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MeetingsSnapshot>, ApiError> {
    Ok(Json(state.store().meetings_snapshot().await?))
}
