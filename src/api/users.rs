use axum::{Json, extract::State, extract::rejection::JsonRejection};
use std::sync::Arc;
use tracing::info;

use super::validation::validate_not_empty;
use super::{
    AllUsersResponse, ApiError, AppState, ComputersResponse, ImportUsersRequest,
    ImportUsersResponse,
};

/// GET /api/users/all
pub async fn list_all_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AllUsersResponse>, ApiError> {
    let users = state.store().list_all_users().await?;
    Ok(Json(AllUsersResponse { users }))
}

/// POST /api/users/import
///
/// Manual fallback for deployments without a directory.
pub async fn import_users(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ImportUsersRequest>, JsonRejection>,
) -> Result<Json<ImportUsersResponse>, ApiError> {
    if state.config().directory.is_configured() {
        return Err(ApiError::validation(
            "users are synchronized from the directory; manual import is disabled",
        ));
    }

    let Json(request) = payload?;
    validate_not_empty("users", &request.users)?;

    let report = state.store().import_manual_users(&request.users).await?;
    info!(
        imported = report.imported,
        warnings = report.warnings.len(),
        "Manual users imported"
    );

    Ok(Json(ImportUsersResponse {
        users_imported: report.imported,
        warnings: report.warnings,
    }))
}

/// GET /api/computers
pub async fn list_computers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ComputersResponse>, ApiError> {
    let computers = state.store().list_active_computers().await?;
    Ok(Json(ComputersResponse { computers }))
}
