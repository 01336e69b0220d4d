use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Best-effort audit record of a generated reply: the original content, the
/// collaborator's reply and the metrics it reported.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conversation")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub sender_email: String,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub original_content: String,
    #[sea_orm(column_type = "Text")]
    pub generated_reply: String,
    pub confidence: f64,
    pub similar_emails_found: i32,
    pub context_used: bool,
    pub processing_time: f64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
