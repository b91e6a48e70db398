use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;

use crate::entities::{computers, prelude::*};
use crate::models::directory::{DirectoryComputer, Source, SyncOutcome};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComputerRecord {
    pub id: i32,
    pub name: String,
    pub dns_host_name: String,
    pub description: String,
}

impl From<computers::Model> for ComputerRecord {
    fn from(model: computers::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            dns_host_name: model.dns_host_name,
            description: model.description,
        }
    }
}

pub struct ComputerRepository {
    conn: DatabaseConnection,
}

impl ComputerRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list_active(&self) -> Result<Vec<ComputerRecord>> {
        let rows = Computers::find()
            .filter(computers::Column::Active.eq(true))
            .order_by_asc(computers::Column::Name)
            .order_by_asc(computers::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list computers")?;

        Ok(rows.into_iter().map(ComputerRecord::from).collect())
    }

    /// Same deactivate-then-upsert pass as for users, over the computers table.
    pub async fn replace_directory_computers(
        &self,
        records: &[DirectoryComputer],
    ) -> Result<SyncOutcome> {
        let txn = self.conn.begin().await?;

        let before = count_active_directory_computers(&txn).await?;

        Computers::update_many()
            .col_expr(computers::Column::Active, Expr::value(false))
            .filter(computers::Column::Source.eq(Source::Ldap.as_str()))
            .exec(&txn)
            .await
            .context("Failed to deactivate directory computers")?;

        let now = chrono::Utc::now().to_rfc3339();
        let mut synced = 0;

        for record in records {
            let name = record.name.trim();
            if name.is_empty() {
                continue;
            }

            let model = computers::ActiveModel {
                identity: Set(record.identity()),
                name: Set(name.to_string()),
                dns_host_name: Set(record.host_address.trim().to_string()),
                description: Set(record.description.trim().to_string()),
                source: Set(Source::Ldap.as_str().to_string()),
                active: Set(true),
                updated_at: Set(now.clone()),
                ..Default::default()
            };

            Computers::insert(model)
                .on_conflict(
                    OnConflict::column(computers::Column::Identity)
                        .update_columns([
                            computers::Column::Name,
                            computers::Column::DnsHostName,
                            computers::Column::Description,
                            computers::Column::Active,
                            computers::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .with_context(|| format!("Failed to upsert directory computer {name}"))?;

            synced += 1;
        }

        let after = count_active_directory_computers(&txn).await?;

        txn.commit().await?;

        Ok(SyncOutcome {
            synced,
            deactivated: before.saturating_sub(after),
        })
    }
}

async fn count_active_directory_computers<C: ConnectionTrait>(conn: &C) -> Result<u64, DbErr> {
    Computers::find()
        .filter(computers::Column::Source.eq(Source::Ldap.as_str()))
        .filter(computers::Column::Active.eq(true))
        .count(conn)
        .await
}
