use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::models::directory::{DirectoryComputer, DirectoryUser, SyncOutcome};
use crate::models::inventory::{
    ImportReport, LicenseInput, ManualUserInput, Meeting, MeetingsSnapshot,
};

pub mod migrator;
pub mod repositories;

pub use repositories::computer::ComputerRecord;
pub use repositories::license::LicenseRecord;
pub use repositories::user::{UserRecord, UserSummary};

/// Outcomes of license mutations that callers branch on.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user {0} not found or inactive")]
    UserNotFound(i32),

    #[error("license {0} not found")]
    LicenseNotFound(i32),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if let Some(path) = sqlite_file(db_url) {
            create_sqlite_file(path)
                .await
                .with_context(|| format!("Failed to create database file {}", path.display()))?;
        }

        // sqlx opens SQLite with foreign keys on, WAL journaling and a 5s busy timeout.
        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections.max(1))
            .min_connections(min_connections.min(max_connections.max(1)))
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt)
            .await
            .context("Failed to open database")?;
        migrator::Migrator::up(&conn, None)
            .await
            .context("Failed to apply migrations")?;

        info!(
            pool_min = min_connections,
            pool_max = max_connections,
            "Store ready"
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn computer_repo(&self) -> repositories::computer::ComputerRepository {
        repositories::computer::ComputerRepository::new(self.conn.clone())
    }

    fn license_repo(&self) -> repositories::license::LicenseRepository {
        repositories::license::LicenseRepository::new(self.conn.clone())
    }

    fn meeting_repo(&self) -> repositories::meeting::MeetingRepository {
        repositories::meeting::MeetingRepository::new(self.conn.clone())
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn list_active_users(&self) -> Result<Vec<UserSummary>> {
        self.user_repo().list_active().await
    }

    pub async fn list_all_users(&self) -> Result<Vec<UserRecord>> {
        self.user_repo().list_all().await
    }

    pub async fn replace_directory_users(&self, records: &[DirectoryUser]) -> Result<SyncOutcome> {
        self.user_repo().replace_directory_users(records).await
    }

    pub async fn import_manual_users(&self, items: &[ManualUserInput]) -> Result<ImportReport> {
        self.user_repo().import_manual(items).await
    }

    // ========================================================================
    // Computers
    // ========================================================================

    pub async fn list_active_computers(&self) -> Result<Vec<ComputerRecord>> {
        self.computer_repo().list_active().await
    }

    pub async fn replace_directory_computers(
        &self,
        records: &[DirectoryComputer],
    ) -> Result<SyncOutcome> {
        self.computer_repo()
            .replace_directory_computers(records)
            .await
    }

    // ========================================================================
    // Licenses
    // ========================================================================

    pub async fn list_licenses(&self) -> Result<Vec<LicenseRecord>> {
        self.license_repo().list().await
    }

    pub async fn import_licenses(&self, items: &[LicenseInput]) -> Result<ImportReport> {
        self.license_repo().import(items).await
    }

    pub async fn assign_license(&self, user_id: i32, license_id: i32) -> Result<(), StoreError> {
        self.license_repo().assign(user_id, license_id).await
    }

    pub async fn update_license(
        &self,
        license_id: i32,
        comment: &str,
        pc: &str,
    ) -> Result<(), StoreError> {
        self.license_repo().update(license_id, comment, pc).await
    }

    pub async fn unassign_license(&self, license_id: i32) -> Result<(), StoreError> {
        self.license_repo().unassign(license_id).await
    }

    // ========================================================================
    // Meetings
    // ========================================================================

    pub async fn replace_meetings(&self, exported_at: &str, items: &[Meeting]) -> Result<u64> {
        self.meeting_repo().replace_snapshot(exported_at, items).await
    }

    pub async fn meetings_snapshot(&self) -> Result<MeetingsSnapshot> {
        self.meeting_repo().snapshot().await
    }
}

/// File behind a `sqlite:` URL, or `None` for in-memory databases.
fn sqlite_file(db_url: &str) -> Option<&Path> {
    if db_url.contains(":memory:") {
        return None;
    }
    let path = db_url.trim_start_matches("sqlite:");
    let path = path.split_once('?').map_or(path, |(file, _)| file);
    Some(Path::new(path))
}

async fn create_sqlite_file(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    if !tokio::fs::try_exists(path).await? {
        tokio::fs::File::create(path).await?;
    }
    Ok(())
}
