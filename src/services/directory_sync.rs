use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::clients::ldap::DirectorySource;
use crate::db::Store;
use crate::models::directory::SyncOutcome;

/// Outcome of a combined users + computers pass. A side that failed is `None`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub users: Option<SyncOutcome>,
    pub computers: Option<SyncOutcome>,
}

impl SyncReport {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.users.is_some() && self.computers.is_some()
    }
}

/// Mirrors directory membership into the local store.
#[derive(Clone)]
pub struct Reconciler {
    store: Store,
    source: Arc<dyn DirectorySource>,
}

impl Reconciler {
    pub fn new(store: Store, source: Arc<dyn DirectorySource>) -> Self {
        Self { store, source }
    }

    pub async fn sync_users(&self) -> Result<SyncOutcome> {
        let records = self
            .source
            .fetch_users()
            .await
            .context("Failed to fetch users from directory")?;

        let outcome = self
            .store
            .replace_directory_users(&records)
            .await
            .context("Failed to store directory users")?;

        info!(
            synced = outcome.synced,
            deactivated = outcome.deactivated,
            "Directory users synchronized"
        );
        Ok(outcome)
    }

    pub async fn sync_computers(&self) -> Result<SyncOutcome> {
        let records = self
            .source
            .fetch_computers()
            .await
            .context("Failed to fetch computers from directory")?;

        let outcome = self
            .store
            .replace_directory_computers(&records)
            .await
            .context("Failed to store directory computers")?;

        info!(
            synced = outcome.synced,
            deactivated = outcome.deactivated,
            "Directory computers synchronized"
        );
        Ok(outcome)
    }

    /// Runs both passes in order. Failures are logged and never abort the other pass.
    pub async fn sync_all(&self) -> SyncReport {
        let start = Instant::now();
        info!(event = "job_started", job_name = "directory_sync", "Starting directory sync");

        let users = match self.sync_users().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(event = "job_failed", job_name = "sync_users", error = %format!("{e:#}"), "User sync failed");
                None
            }
        };

        let computers = match self.sync_computers().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(event = "job_failed", job_name = "sync_computers", error = %format!("{e:#}"), "Computer sync failed");
                None
            }
        };

        info!(
            event = "job_finished",
            job_name = "directory_sync",
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Directory sync finished"
        );

        SyncReport { users, computers }
    }
}
