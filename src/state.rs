use std::sync::Arc;
use std::time::Duration;

use crate::clients::ldap::{DirectoryAuthenticator, DirectorySource, LdapDirectory};
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    CredentialVerifier, DirectoryCredentialVerifier, LoginAllowList, Reconciler, SessionCodec,
};

/// The two directory roles the rest of the application depends on.
#[derive(Clone)]
pub struct DirectoryBackend {
    pub source: Arc<dyn DirectorySource>,
    pub authenticator: Arc<dyn DirectoryAuthenticator>,
}

impl DirectoryBackend {
    pub fn ldap(directory: LdapDirectory) -> Self {
        let directory = Arc::new(directory);
        Self {
            source: directory.clone(),
            authenticator: directory,
        }
    }
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub sessions: SessionCodec,

    /// `None` while the directory is not configured, which disables authentication.
    pub verifier: Option<Arc<dyn CredentialVerifier>>,

    pub reconciler: Option<Reconciler>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.database_url(),
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let backend = if config.directory.is_configured() {
            let directory = LdapDirectory::new(config.directory.clone())
                .map_err(|e| anyhow::anyhow!("Failed to set up directory client: {e}"))?;
            Some(DirectoryBackend::ldap(directory))
        } else {
            None
        };

        Self::with_backend(config, store, backend)
    }

    pub fn with_backend(
        config: Config,
        store: Store,
        backend: Option<DirectoryBackend>,
    ) -> anyhow::Result<Self> {
        let sessions = SessionCodec::new(
            &config.session.secret,
            Duration::from_secs(config.session.ttl_hours * 60 * 60),
        )?;

        let (verifier, reconciler) = match backend {
            Some(backend) => {
                let allow_list = LoginAllowList::new(&config.auth.allowed_logins);
                let verifier: Arc<dyn CredentialVerifier> = Arc::new(
                    DirectoryCredentialVerifier::new(backend.authenticator, allow_list),
                );
                let reconciler = Reconciler::new(store.clone(), backend.source);
                (Some(verifier), Some(reconciler))
            }
            None => (None, None),
        };

        Ok(Self {
            config: Arc::new(config),
            store,
            sessions,
            verifier,
            reconciler,
        })
    }

    #[must_use]
    pub const fn auth_enabled(&self) -> bool {
        self.verifier.is_some()
    }
}
