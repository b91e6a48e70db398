use crate::entities::meetings_meta;
use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(MeetingsMeta)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Meetings)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // The snapshot header always exists so imports only ever update it.
        let seed = sea_orm_migration::sea_query::Query::insert()
            .into_table(MeetingsMeta)
            .columns([
                meetings_meta::Column::Id,
                meetings_meta::Column::ExportedAt,
            ])
            .values_panic([1.into(), "".into()])
            .on_conflict(
                OnConflict::column(meetings_meta::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .to_owned();

        manager.exec_stmt(seed).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Meetings).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MeetingsMeta).to_owned())
            .await?;

        Ok(())
    }
}
