use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "meetings")]
pub struct Model {
    /// Calendar item id from the exporter.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub subject: String,

    pub start: String,

    pub end: String,

    pub location: String,

    pub is_recurring: bool,

    pub is_canceled: bool,

    pub link: String,

    pub participants: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
