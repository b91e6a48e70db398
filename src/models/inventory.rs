use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ManualUserInput {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LicenseInput {
    pub key: String,
    pub comment: String,
    pub pc: String,
}

/// One calendar item of a meetings snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meeting {
    pub id: String,
    pub subject: String,
    pub start: String,
    pub end: String,
    pub location: String,
    pub is_recurring: bool,
    pub is_canceled: bool,
    pub link: String,
    pub participants: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MeetingsSnapshot {
    pub exported_at: String,
    pub items: Vec<Meeting>,
}

/// Per-item problems collected during an import that did not abort it.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub imported: u64,
    pub warnings: Vec<String>,
}
