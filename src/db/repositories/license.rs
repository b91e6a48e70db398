use anyhow::Context;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::warn;

use crate::db::StoreError;
use crate::entities::{licenses, prelude::*, users};
use crate::models::inventory::{ImportReport, LicenseInput};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LicenseRecord {
    pub id: i32,
    pub key: String,
    pub assigned_user_id: Option<i32>,
    pub comment: String,
    pub pc: String,
}

impl From<licenses::Model> for LicenseRecord {
    fn from(model: licenses::Model) -> Self {
        Self {
            id: model.id,
            key: model.key,
            assigned_user_id: model.assigned_user_id,
            comment: model.comment,
            pc: model.pc,
        }
    }
}

pub struct LicenseRepository {
    conn: DatabaseConnection,
}

impl LicenseRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> anyhow::Result<Vec<LicenseRecord>> {
        let rows = Licenses::find()
            .order_by_asc(licenses::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list licenses")?;

        Ok(rows.into_iter().map(LicenseRecord::from).collect())
    }

    /// Inserts new license keys. Blank and already known keys become warnings.
    pub async fn import(&self, items: &[LicenseInput]) -> anyhow::Result<ImportReport> {
        let txn = self.conn.begin().await?;
        let now = chrono::Utc::now().to_rfc3339();
        let mut report = ImportReport::default();

        for item in items {
            let key = item.key.trim();
            if key.is_empty() {
                warn!("Skipping imported license without key");
                report.warnings.push("skipped a license without key".to_string());
                continue;
            }

            let model = licenses::ActiveModel {
                key: Set(key.to_string()),
                assigned_user_id: Set(None),
                comment: Set(item.comment.trim().to_string()),
                pc: Set(item.pc.trim().to_string()),
                created_at: Set(now.clone()),
                ..Default::default()
            };

            let inserted = Licenses::insert(model)
                .on_conflict(
                    OnConflict::column(licenses::Column::Key)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .with_context(|| format!("Failed to insert license {key}"))?;

            if inserted == 0 {
                warn!(key = %key, "Duplicate license key in import");
                report.warnings.push(format!("duplicate key: {key}"));
                continue;
            }

            report.imported += 1;
        }

        txn.commit().await?;
        Ok(report)
    }

    /// Points a license at an active user, replacing any previous holder.
    pub async fn assign(&self, user_id: i32, license_id: i32) -> Result<(), StoreError> {
        let txn = self.conn.begin().await?;

        let user = Users::find_by_id(user_id)
            .filter(users::Column::Active.eq(true))
            .one(&txn)
            .await?;
        if user.is_none() {
            return Err(StoreError::UserNotFound(user_id));
        }

        let result = Licenses::update_many()
            .col_expr(licenses::Column::AssignedUserId, Expr::value(user_id))
            .filter(licenses::Column::Id.eq(license_id))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::LicenseNotFound(license_id));
        }

        txn.commit().await?;
        Ok(())
    }

    pub async fn update(&self, license_id: i32, comment: &str, pc: &str) -> Result<(), StoreError> {
        let result = Licenses::update_many()
            .col_expr(licenses::Column::Comment, Expr::value(comment.trim()))
            .col_expr(licenses::Column::Pc, Expr::value(pc.trim()))
            .filter(licenses::Column::Id.eq(license_id))
            .exec(&self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::LicenseNotFound(license_id));
        }
        Ok(())
    }

    pub async fn unassign(&self, license_id: i32) -> Result<(), StoreError> {
        let result = Licenses::update_many()
            .col_expr(licenses::Column::AssignedUserId, Expr::value(Option::<i32>::None))
            .filter(licenses::Column::Id.eq(license_id))
            .exec(&self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(StoreError::LicenseNotFound(license_id));
        }
        Ok(())
    }
}
