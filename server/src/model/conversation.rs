use anyhow::Context;

use crate::db_core::prelude::*;
use crate::error::AppResult;
use crate::reply::{ReplyRequest, ReplyResult};

pub struct ConversationCtrl;

impl ConversationCtrl {
    /// Record a generated reply for audit. Best-effort: callers log and
    /// swallow errors instead of failing the request.
    pub async fn record(
        conn: &DatabaseConnection,
        request: &ReplyRequest,
        result: &ReplyResult,
    ) -> AppResult<conversation::Model> {
        let active = conversation::ActiveModel {
            id: ActiveValue::NotSet,
            sender_email: ActiveValue::Set(request.sender_email.clone().unwrap_or_default()),
            subject: ActiveValue::Set(request.subject.clone().unwrap_or_default()),
            original_content: ActiveValue::Set(request.email_content.clone()),
            generated_reply: ActiveValue::Set(result.reply.clone()),
            confidence: ActiveValue::Set(result.confidence),
            similar_emails_found: ActiveValue::Set(result.similar_emails_found),
            context_used: ActiveValue::Set(result.context_used),
            processing_time: ActiveValue::Set(result.processing_time),
            created_at: ActiveValue::Set(chrono::Utc::now().into()),
        };

        let model = active
            .insert(conn)
            .await
            .context("Error recording conversation")?;

        Ok(model)
    }
}
