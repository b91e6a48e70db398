use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Upsert key: `ldap:<login>`, `email:<email>` or `name:<name>`, all lowercased.
    #[sea_orm(unique)]
    pub identity: String,

    pub name: String,

    pub email: String,

    pub login: String,

    /// `ldap` or `manual`
    pub source: String,

    pub active: bool,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::licenses::Entity")]
    Licenses,
}

impl Related<super::licenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Licenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
