//! LDAP directory client.
//!
//! Every operation opens its own connection, binds as the configured service
//! identity (anonymous when none is set), runs its searches and unbinds. The
//! whole exchange is bounded by the configured timeout.

use async_trait::async_trait;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry, SearchOptions};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{DirectoryConfig, DirectoryTlsConfig};
use crate::constants::directory::{INVALID_CREDENTIALS, SIZE_LIMIT_EXCEEDED};
use crate::models::directory::{DirectoryComputer, DirectoryUser};

/// Transport and protocol failures. All of them mean the directory is unavailable.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("cannot connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: LdapError,
    },

    #[error("service bind failed: {0}")]
    ServiceBind(#[source] LdapError),

    #[error("search failed: {0}")]
    Search(#[source] LdapError),

    #[error("bind failed: {0}")]
    Bind(#[source] LdapError),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("no answer within {0:?}")]
    Timeout(Duration),
}

/// Outcome of checking a password against the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Authenticated,
    UnknownLogin,
    InvalidPassword,
}

/// Authoritative list of users and computers.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the directory cannot be reached or refuses the search.
    async fn fetch_users(&self) -> Result<Vec<DirectoryUser>, DirectoryError>;

    async fn fetch_computers(&self) -> Result<Vec<DirectoryComputer>, DirectoryError>;
}

/// Password check against a directory entry.
#[async_trait]
pub trait DirectoryAuthenticator: Send + Sync {
    /// Looks up `login` and binds as the found entry with `password`.
    ///
    /// A missing entry or a rejected bind is an [`BindOutcome`], not an error.
    async fn authenticate(&self, login: &str, password: &str)
    -> Result<BindOutcome, DirectoryError>;
}

pub struct LdapDirectory {
    config: DirectoryConfig,
    tls: native_tls::TlsConnector,
}

impl LdapDirectory {
    pub fn new(config: DirectoryConfig) -> Result<Self, DirectoryError> {
        let tls = build_tls_connector(&config.tls)?;

        if config.tls.insecure_skip_verify {
            warn!("Directory TLS certificate verification is disabled");
        }

        Ok(Self { config, tls })
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, DirectoryError>
    where
        F: Future<Output = Result<T, DirectoryError>>,
    {
        let limit = self.config.timeout();
        tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| DirectoryError::Timeout(limit))?
    }

    async fn connect(&self) -> Result<Ldap, DirectoryError> {
        let url = self.config.url.trim();

        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.timeout())
            .set_connector(self.tls.clone());

        debug!(url = %url, "Connecting to directory");

        let (conn, ldap) = LdapConnAsync::with_settings(settings, url)
            .await
            .map_err(|source| DirectoryError::Connect {
                url: url.to_string(),
                source,
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        Ok(ldap)
    }

    /// Connects and binds as the service identity if one is configured.
    async fn open_session(&self) -> Result<Ldap, DirectoryError> {
        let mut ldap = self.connect().await?;

        let bind_dn = self.config.bind_dn.trim();
        if !bind_dn.is_empty() {
            ldap.simple_bind(bind_dn, &self.config.bind_password)
                .await
                .and_then(ldap3::LdapResult::success)
                .map_err(DirectoryError::ServiceBind)?;
        }

        Ok(ldap)
    }

    async fn search_paged(
        &self,
        ldap: &mut Ldap,
        base: &str,
        filter: &str,
        attrs: Vec<&str>,
    ) -> Result<Vec<SearchEntry>, DirectoryError> {
        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(self.config.page_size)),
        ];

        let mut search = ldap
            .streaming_search_with(adapters, base, Scope::Subtree, filter, attrs)
            .await
            .map_err(DirectoryError::Search)?;

        let mut entries = Vec::new();
        while let Some(entry) = search.next().await.map_err(DirectoryError::Search)? {
            entries.push(SearchEntry::construct(entry));
        }

        search
            .finish()
            .await
            .success()
            .map_err(DirectoryError::Search)?;

        Ok(entries)
    }

    async fn load_users(&self) -> Result<Vec<DirectoryUser>, DirectoryError> {
        let login_attr = self.config.effective_user_attribute();
        let attrs = vec![login_attr, "mail", "displayName", "cn", "givenName", "sn"];

        let mut ldap = self.open_session().await?;
        let entries = self
            .search_paged(
                &mut ldap,
                self.config.base_dn.trim(),
                self.config.effective_users_filter(),
                attrs,
            )
            .await;
        close(ldap).await;

        let users: Vec<DirectoryUser> = entries?
            .iter()
            .filter_map(|entry| user_from_entry(entry, login_attr))
            .collect();

        info!(count = users.len(), "Fetched users from directory");
        Ok(users)
    }

    async fn load_computers(&self) -> Result<Vec<DirectoryComputer>, DirectoryError> {
        let attrs = vec!["cn", "dNSHostName", "description"];

        let mut ldap = self.open_session().await?;
        let entries = self
            .search_paged(
                &mut ldap,
                self.config.effective_computers_base_dn(),
                self.config.effective_computers_filter(),
                attrs,
            )
            .await;
        close(ldap).await;

        let computers: Vec<DirectoryComputer> =
            entries?.iter().filter_map(computer_from_entry).collect();

        info!(count = computers.len(), "Fetched computers from directory");
        Ok(computers)
    }

    async fn check_password(
        &self,
        login: &str,
        password: &str,
    ) -> Result<BindOutcome, DirectoryError> {
        let mut ldap = self.open_session().await?;
        let outcome = self.find_and_bind(&mut ldap, login, password).await;
        close(ldap).await;
        outcome
    }

    async fn find_and_bind(
        &self,
        ldap: &mut Ldap,
        login: &str,
        password: &str,
    ) -> Result<BindOutcome, DirectoryError> {
        let filter = login_filter(self.config.effective_user_attribute(), login);
        debug!(base_dn = %self.config.base_dn, filter = %filter, "Looking up login");

        let ldap3::SearchResult(entries, result) = ldap
            .with_search_options(SearchOptions::new().sizelimit(1))
            .search(self.config.base_dn.trim(), Scope::Subtree, &filter, vec!["dn"])
            .await
            .map_err(DirectoryError::Search)?;

        // A size-limit hit still carries the first match.
        if result.rc != 0 && result.rc != SIZE_LIMIT_EXCEEDED {
            return Err(DirectoryError::Search(LdapError::LdapResult { result }));
        }

        let Some(entry) = entries.into_iter().next() else {
            return Ok(BindOutcome::UnknownLogin);
        };
        let dn = SearchEntry::construct(entry).dn;
        debug!(login = %login, dn = %dn, "Login found in directory");

        let result = ldap
            .simple_bind(&dn, password)
            .await
            .map_err(DirectoryError::Bind)?;

        if result.rc == 0 {
            return Ok(BindOutcome::Authenticated);
        }

        if result.rc != INVALID_CREDENTIALS {
            debug!(login = %login, rc = result.rc, text = %result.text, "Bind as user rejected");
        }
        Ok(BindOutcome::InvalidPassword)
    }
}

#[async_trait]
impl DirectorySource for LdapDirectory {
    async fn fetch_users(&self) -> Result<Vec<DirectoryUser>, DirectoryError> {
        self.bounded(self.load_users()).await
    }

    async fn fetch_computers(&self) -> Result<Vec<DirectoryComputer>, DirectoryError> {
        self.bounded(self.load_computers()).await
    }
}

#[async_trait]
impl DirectoryAuthenticator for LdapDirectory {
    async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> Result<BindOutcome, DirectoryError> {
        self.bounded(self.check_password(login, password)).await
    }
}

async fn close(mut ldap: Ldap) {
    if let Err(e) = ldap.unbind().await {
        debug!(error = %e, "LDAP unbind failed");
    }
}

/// Trust policy: system store, plus an optional CA bundle, or nothing at all
/// when verification is switched off.
fn build_tls_connector(
    tls: &DirectoryTlsConfig,
) -> Result<native_tls::TlsConnector, DirectoryError> {
    let mut builder = native_tls::TlsConnector::builder();

    if tls.insecure_skip_verify {
        builder.danger_accept_invalid_certs(true);
    }

    if let Some(path) = tls.ca_file.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        match std::fs::read(path) {
            Ok(pem) => match native_tls::Certificate::from_pem(&pem) {
                Ok(cert) => {
                    builder.add_root_certificate(cert);
                    info!(ca_file = %path, "Trusting additional directory CA");
                }
                Err(e) => warn!(ca_file = %path, error = %e, "No usable certificate in CA file"),
            },
            Err(e) => warn!(
                ca_file = %path,
                error = %e,
                "Cannot read CA file, using system trust store"
            ),
        }
    }

    Ok(builder.build()?)
}

#[must_use]
pub fn login_filter(attribute: &str, login: &str) -> String {
    format!(
        "(&(|(objectClass=user)(objectClass=person))({attribute}={}))",
        ldap3::ldap_escape(login)
    )
}

/// First value of `name`, matched case-insensitively, trimmed.
fn attr<'e>(entry: &'e SearchEntry, name: &str) -> &'e str {
    entry
        .attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map_or("", |v| v.trim())
}

/// displayName, then cn, then "givenName sn", then whichever half exists.
#[must_use]
pub fn pick_name(entry: &SearchEntry) -> String {
    for name in ["displayName", "cn"] {
        let value = attr(entry, name);
        if !value.is_empty() {
            return value.to_string();
        }
    }

    let given = attr(entry, "givenName");
    let surname = attr(entry, "sn");
    match (given.is_empty(), surname.is_empty()) {
        (false, false) => format!("{given} {surname}"),
        (false, true) => given.to_string(),
        (true, false) => surname.to_string(),
        (true, true) => String::new(),
    }
}

#[must_use]
pub fn user_from_entry(entry: &SearchEntry, login_attribute: &str) -> Option<DirectoryUser> {
    let login = attr(entry, login_attribute);
    if login.is_empty() {
        return None;
    }

    Some(DirectoryUser {
        login: login.to_string(),
        display_name: pick_name(entry),
        email: attr(entry, "mail").to_string(),
    })
}

#[must_use]
pub fn computer_from_entry(entry: &SearchEntry) -> Option<DirectoryComputer> {
    let name = attr(entry, "cn");
    if name.is_empty() {
        return None;
    }

    Some(DirectoryComputer {
        name: name.to_string(),
        host_address: attr(entry, "dNSHostName").to_string(),
        description: attr(entry, "description").to_string(),
    })
}
