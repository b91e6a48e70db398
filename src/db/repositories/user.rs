use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::warn;

use crate::entities::{prelude::*, users};
use crate::models::directory::{DirectoryUser, Source, SyncOutcome, manual_identity};
use crate::models::inventory::{ImportReport, ManualUserInput};

/// Active user as shown in the assignment UI.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: i32,
    pub name: String,
    pub email: String,
}

impl From<users::Model> for UserSummary {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub login: String,
    pub source: String,
    pub active: bool,
}

impl From<users::Model> for UserRecord {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            login: model.login,
            source: model.source,
            active: model.active,
        }
    }
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_active(&self) -> Result<Vec<UserSummary>> {
        let rows = Users::find()
            .filter(users::Column::Active.eq(true))
            .order_by_asc(users::Column::Name)
            .order_by_asc(users::Column::Email)
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list active users")?;

        Ok(rows.into_iter().map(UserSummary::from).collect())
    }

    pub async fn list_all(&self) -> Result<Vec<UserRecord>> {
        let rows = Users::find()
            .order_by_desc(users::Column::Active)
            .order_by_asc(users::Column::Name)
            .order_by_asc(users::Column::Email)
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(rows.into_iter().map(UserRecord::from).collect())
    }

    /// Converges the `ldap` partition of the users table to `records`.
    ///
    /// Every directory row is deactivated first, then each fetched record is
    /// upserted by identity, which reactivates it. Rows are never deleted, so
    /// license assignments keep pointing at users that left the directory.
    /// The whole pass runs in a single transaction.
    pub async fn replace_directory_users(&self, records: &[DirectoryUser]) -> Result<SyncOutcome> {
        let txn = self.conn.begin().await?;

        let before = count_active_directory_users(&txn).await?;

        Users::update_many()
            .col_expr(users::Column::Active, Expr::value(false))
            .filter(users::Column::Source.eq(Source::Ldap.as_str()))
            .exec(&txn)
            .await
            .context("Failed to deactivate directory users")?;

        let now = chrono::Utc::now().to_rfc3339();
        let mut synced = 0;

        for record in records {
            let login = record.login.trim();
            if login.is_empty() {
                continue;
            }

            let model = users::ActiveModel {
                identity: Set(record.identity()),
                name: Set(record.display_name.trim().to_string()),
                email: Set(record.email.trim().to_lowercase()),
                login: Set(login.to_string()),
                source: Set(Source::Ldap.as_str().to_string()),
                active: Set(true),
                updated_at: Set(now.clone()),
                ..Default::default()
            };

            Users::insert(model)
                .on_conflict(
                    OnConflict::column(users::Column::Identity)
                        .update_columns([
                            users::Column::Name,
                            users::Column::Email,
                            users::Column::Login,
                            users::Column::Active,
                            users::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .with_context(|| format!("Failed to upsert directory user {login}"))?;

            synced += 1;
        }

        let after = count_active_directory_users(&txn).await?;

        txn.commit().await?;

        Ok(SyncOutcome {
            synced,
            deactivated: before.saturating_sub(after),
        })
    }

    /// Upserts manually supplied users keyed on email, falling back to name.
    pub async fn import_manual(&self, items: &[ManualUserInput]) -> Result<ImportReport> {
        let txn = self.conn.begin().await?;
        let now = chrono::Utc::now().to_rfc3339();
        let mut report = ImportReport::default();

        for item in items {
            let name = item.name.trim();
            let email = item.email.trim().to_lowercase();

            let Some(identity) = manual_identity(name, &email) else {
                warn!("Skipping imported user without name and email");
                report
                    .warnings
                    .push("skipped a record without name and email".to_string());
                continue;
            };

            let model = users::ActiveModel {
                identity: Set(identity),
                name: Set(name.to_string()),
                email: Set(email),
                login: Set(String::new()),
                source: Set(Source::Manual.as_str().to_string()),
                active: Set(true),
                updated_at: Set(now.clone()),
                ..Default::default()
            };

            Users::insert(model)
                .on_conflict(
                    OnConflict::column(users::Column::Identity)
                        .update_columns([
                            users::Column::Name,
                            users::Column::Email,
                            users::Column::Active,
                            users::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .context("Failed to upsert imported user")?;

            report.imported += 1;
        }

        txn.commit().await?;
        Ok(report)
    }
}

async fn count_active_directory_users<C: ConnectionTrait>(conn: &C) -> Result<u64, DbErr> {
    Users::find()
        .filter(users::Column::Source.eq(Source::Ldap.as_str()))
        .filter(users::Column::Active.eq(true))
        .count(conn)
        .await
}
