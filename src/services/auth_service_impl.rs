//! Directory-backed implementation of the `CredentialVerifier` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clients::ldap::{BindOutcome, DirectoryAuthenticator};
use crate::services::auth_service::{
    AuthError, CredentialVerifier, LoginAllowList, normalize_login,
};

pub struct DirectoryCredentialVerifier {
    directory: Arc<dyn DirectoryAuthenticator>,
    allow_list: LoginAllowList,
}

impl DirectoryCredentialVerifier {
    #[must_use]
    pub fn new(directory: Arc<dyn DirectoryAuthenticator>, allow_list: LoginAllowList) -> Self {
        Self {
            directory,
            allow_list,
        }
    }
}

#[async_trait]
impl CredentialVerifier for DirectoryCredentialVerifier {
    async fn verify(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            return Ok(false);
        }

        let login = normalize_login(username);
        // '|' separates session token fields.
        if login.is_empty() || login.contains('|') {
            warn!(raw = %username.trim(), "Rejected malformed login");
            return Ok(false);
        }

        if !self.allow_list.permits(&login) {
            warn!(login = %login, "Login is not on the allow-list");
            return Ok(false);
        }

        match self.directory.authenticate(&login, password).await? {
            BindOutcome::Authenticated => {
                info!(login = %login, "Directory login succeeded");
                Ok(true)
            }
            BindOutcome::UnknownLogin => {
                warn!(login = %login, "Login not found in directory");
                Ok(false)
            }
            BindOutcome::InvalidPassword => {
                warn!(login = %login, "Directory rejected password");
                Ok(false)
            }
        }
    }
}
