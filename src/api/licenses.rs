use axum::{Json, extract::State, extract::rejection::JsonRejection};
use std::sync::Arc;
use tracing::info;

use super::validation::{validate_id, validate_not_empty};
use super::{
    ApiError, AppState, AssignRequest, ImportLicensesRequest, ImportLicensesResponse,
    StateResponse, StatusResponse, UnassignRequest, UpdateLicenseRequest,
};

/// GET /api/state
///
/// Active users plus every license, enough to render the assignment table.
pub async fn get_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StateResponse>, ApiError> {
    let users = state.store().list_active_users().await?;
    let licenses = state.store().list_licenses().await?;
    Ok(Json(StateResponse { users, licenses }))
}

/// POST /api/licenses/import
pub async fn import_licenses(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ImportLicensesRequest>, JsonRejection>,
) -> Result<Json<ImportLicensesResponse>, ApiError> {
    let Json(request) = payload?;
    validate_not_empty("licenses", &request.licenses)?;

    let report = state.store().import_licenses(&request.licenses).await?;
    info!(
        imported = report.imported,
        warnings = report.warnings.len(),
        "Licenses imported"
    );

    Ok(Json(ImportLicensesResponse {
        licenses_imported: report.imported,
        warnings: report.warnings,
    }))
}

/// POST /api/assign
pub async fn assign(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AssignRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(request) = payload?;
    let user_id = validate_id("user_id", request.user_id)?;
    let license_id = validate_id("license_id", request.license_id)?;

    state.store().assign_license(user_id, license_id).await?;
    info!(user_id, license_id, "License assigned");

    Ok(Json(StatusResponse::OK))
}

/// POST /api/license/update
pub async fn update(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpdateLicenseRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(request) = payload?;
    let license_id = validate_id("license_id", request.license_id)?;

    state
        .store()
        .update_license(license_id, &request.comment, &request.pc)
        .await?;

    Ok(Json(StatusResponse::OK))
}

/// POST /api/license/unassign
pub async fn unassign(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UnassignRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(request) = payload?;
    let license_id = validate_id("license_id", request.license_id)?;

    state.store().unassign_license(license_id).await?;
    info!(license_id, "License unassigned");

    Ok(Json(StatusResponse::OK))
}
