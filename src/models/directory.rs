use serde::Serialize;

/// Provenance of a local user or computer row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Ldap,
    Manual,
}

impl Source {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ldap => "ldap",
            Self::Manual => "manual",
        }
    }
}

/// A user entry as returned by the directory, before it touches the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub login: String,
    pub display_name: String,
    pub email: String,
}

impl DirectoryUser {
    #[must_use]
    pub fn identity(&self) -> String {
        format!("ldap:{}", self.login.trim().to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryComputer {
    pub name: String,
    pub host_address: String,
    pub description: String,
}

impl DirectoryComputer {
    #[must_use]
    pub fn identity(&self) -> String {
        format!("ldap:{}", self.name.trim().to_lowercase())
    }
}

/// Identity for manually imported users: email wins over name.
///
/// Returns `None` when both are blank.
#[must_use]
pub fn manual_identity(name: &str, email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    if !email.is_empty() {
        return Some(format!("email:{email}"));
    }

    let name = name.trim().to_lowercase();
    if !name.is_empty() {
        return Some(format!("name:{name}"));
    }

    None
}

/// Result of one reconciliation pass over a single entity type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub synced: u64,
    pub deactivated: u64,
}
