use serde::{Deserialize, Serialize};

use crate::db::{ComputerRecord, LicenseRecord, UserRecord, UserSummary};
use crate::models::inventory::{LicenseInput, ManualUserInput, Meeting};

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub const OK: Self = Self { status: "ok" };
}

// ============================================================================
// Users & licenses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub users: Vec<UserSummary>,
    pub licenses: Vec<LicenseRecord>,
}

#[derive(Debug, Serialize)]
pub struct AllUsersResponse {
    pub users: Vec<UserRecord>,
}

#[derive(Debug, Serialize)]
pub struct ComputersResponse {
    pub computers: Vec<ComputerRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImportUsersRequest {
    pub users: Vec<ManualUserInput>,
}

#[derive(Debug, Serialize)]
pub struct ImportUsersResponse {
    pub users_imported: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImportLicensesRequest {
    pub licenses: Vec<LicenseInput>,
}

#[derive(Debug, Serialize)]
pub struct ImportLicensesResponse {
    pub licenses_imported: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AssignRequest {
    pub user_id: i32,
    pub license_id: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateLicenseRequest {
    pub license_id: i32,
    pub comment: String,
    pub pc: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UnassignRequest {
    pub license_id: i32,
}

// ============================================================================
// Meetings
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImportMeetingsRequest {
    pub exported_at: String,
    pub items: Vec<Meeting>,
}

#[derive(Debug, Serialize)]
pub struct ImportMeetingsResponse {
    pub status: &'static str,
    pub meetings_imported: u64,
}
