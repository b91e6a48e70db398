//! Domain service for signing users in against the directory.
//!
//! Logins are normalized before any comparison, so `CORP\jdoe`,
//! `jdoe@corp.example` and `JDoe` all refer to the same account.

use thiserror::Error;

use crate::clients::ldap::DirectoryError;

/// Errors specific to credential verification.
///
/// Wrong passwords, unknown logins and allow-list misses are not errors;
/// [`CredentialVerifier::verify`] reports them as `Ok(false)`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(#[from] DirectoryError),
}

/// Domain service trait for credential checks.
#[async_trait::async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Checks `password` for `username` and returns whether sign-in is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DirectoryUnavailable`] when the directory cannot be queried.
    async fn verify(&self, username: &str, password: &str) -> Result<bool, AuthError>;
}

/// Strips a leading `DOMAIN\` and a trailing `@domain`, then lowercases.
#[must_use]
pub fn normalize_login(raw: &str) -> String {
    let mut login = raw.trim();

    if let Some((_, rest)) = login.split_once('\\')
        && !rest.is_empty()
    {
        login = rest;
    }

    if let Some((local, _)) = login.split_once('@') {
        login = local;
    }

    login.trim().to_lowercase()
}

/// Logins permitted to sign in. An empty list permits everyone.
#[derive(Debug, Clone, Default)]
pub struct LoginAllowList {
    logins: Vec<String>,
}

impl LoginAllowList {
    pub fn new<I, S>(logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let logins = logins
            .into_iter()
            .map(|l| normalize_login(l.as_ref()))
            .filter(|l| !l.is_empty())
            .collect();
        Self { logins }
    }

    #[must_use]
    pub fn permits(&self, login: &str) -> bool {
        if self.logins.is_empty() {
            return true;
        }
        let login = normalize_login(login);
        self.logins.iter().any(|allowed| *allowed == login)
    }
}
