use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Normalized email imported from the mail provider. One row per provider
/// message id; re-imports are deduplicated on `gmail_id`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "email")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub gmail_id: String,
    pub thread_id: String,
    pub from_address: String,
    pub from_name: String,
    pub to_address: String,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    pub received_at: DateTimeWithTimeZone,
    pub read: bool,
    pub starred: bool,
    pub important: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
