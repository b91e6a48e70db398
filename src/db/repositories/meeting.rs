use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::entities::{meetings, meetings_meta, prelude::*};
use crate::models::inventory::{Meeting, MeetingsSnapshot};

const SNAPSHOT_ROW_ID: i32 = 1;

impl From<meetings::Model> for Meeting {
    fn from(model: meetings::Model) -> Self {
        Self {
            id: model.id,
            subject: model.subject,
            start: model.start,
            end: model.end,
            location: model.location,
            is_recurring: model.is_recurring,
            is_canceled: model.is_canceled,
            link: model.link,
            participants: model.participants,
        }
    }
}

pub struct MeetingRepository {
    conn: DatabaseConnection,
}

impl MeetingRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Swaps the stored snapshot for `items` in one transaction.
    ///
    /// Items without an id are dropped and a repeated id keeps its last
    /// occurrence. Returns the number of stored rows.
    pub async fn replace_snapshot(&self, exported_at: &str, items: &[Meeting]) -> Result<u64> {
        let txn = self.conn.begin().await?;

        MeetingsMeta::update_many()
            .col_expr(
                meetings_meta::Column::ExportedAt,
                Expr::value(exported_at.trim()),
            )
            .filter(meetings_meta::Column::Id.eq(SNAPSHOT_ROW_ID))
            .exec(&txn)
            .await
            .context("Failed to update meetings snapshot header")?;

        Meetings::delete_many()
            .exec(&txn)
            .await
            .context("Failed to clear meetings")?;

        for item in items {
            let id = item.id.trim();
            if id.is_empty() {
                continue;
            }

            let model = meetings::ActiveModel {
                id: Set(id.to_string()),
                subject: Set(item.subject.trim().to_string()),
                start: Set(item.start.trim().to_string()),
                end: Set(item.end.trim().to_string()),
                location: Set(item.location.trim().to_string()),
                is_recurring: Set(item.is_recurring),
                is_canceled: Set(item.is_canceled),
                link: Set(item.link.trim().to_string()),
                participants: Set(item.participants.trim().to_string()),
            };

            Meetings::insert(model)
                .on_conflict(
                    OnConflict::column(meetings::Column::Id)
                        .update_columns([
                            meetings::Column::Subject,
                            meetings::Column::Start,
                            meetings::Column::End,
                            meetings::Column::Location,
                            meetings::Column::IsRecurring,
                            meetings::Column::IsCanceled,
                            meetings::Column::Link,
                            meetings::Column::Participants,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await
                .with_context(|| format!("Failed to insert meeting {id}"))?;
        }

        let stored = Meetings::find()
            .count(&txn)
            .await
            .context("Failed to count meetings")?;

        txn.commit().await?;
        Ok(stored)
    }

    pub async fn snapshot(&self) -> Result<MeetingsSnapshot> {
        let exported_at = MeetingsMeta::find_by_id(SNAPSHOT_ROW_ID)
            .one(&self.conn)
            .await
            .context("Failed to read meetings snapshot header")?
            .map(|meta| meta.exported_at)
            .unwrap_or_default();

        let items = Meetings::find()
            .order_by_asc(meetings::Column::Start)
            .order_by_asc(meetings::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list meetings")?;

        Ok(MeetingsSnapshot {
            exported_at,
            items: items.into_iter().map(Meeting::from).collect(),
        })
    }
}
