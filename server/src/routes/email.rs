use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::email::canonical::{normalize, CanonicalEmail};
use crate::error::{AppError, AppJsonResult};
use crate::model::conversation::ConversationCtrl;
use crate::model::email::EmailCtrl;
use crate::model::user_reply::UserReplyCtrl;
use crate::reply::{ReplyRequest, ReplyResult};
use crate::ServerState;

const NO_SUBJECT_PLACEHOLDER: &str = "(No Subject)";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEmailsResponse {
    pub count: usize,
    pub emails: Vec<CanonicalEmail>,
    /// True when the page ceiling ended the fetch before the mailbox did
    pub truncated: bool,
}

/// # GET /emails
///
/// Fetches the mailbox, normalizes every message and imports unseen ones.
/// The response carries the freshly normalized records; a provider failure
/// fails the whole request rather than degrading to placeholder data.
pub async fn get_all(State(state): State<ServerState>) -> AppJsonResult<GetEmailsResponse> {
    let mailbox = state.gmail.fetch_all_messages().await?;

    let mut emails = mailbox
        .messages
        .iter()
        .map(normalize)
        .collect::<Vec<CanonicalEmail>>();

    let imported = EmailCtrl::import_batch(&state.conn, &emails).await?;

    tracing::info!(
        fetched = emails.len(),
        imported,
        truncated = mailbox.truncated,
        "mailbox fetch complete"
    );

    for email in &mut emails {
        if email.subject.is_empty() {
            email.subject = NO_SUBJECT_PLACEHOLDER.to_string();
        }
    }

    Ok(Json(GetEmailsResponse {
        count: emails.len(),
        emails,
        truncated: mailbox.truncated,
    }))
}

/// # POST /emails/generate-smart-reply
///
/// Proxies the request to the reply-generation service and relays its
/// result verbatim. A successful generation is recorded best-effort.
pub async fn generate_smart_reply(
    State(state): State<ServerState>,
    Json(request): Json<ReplyRequest>,
) -> AppJsonResult<ReplyResult> {
    let result = state.reply.generate_reply(&request).await?;

    if let Err(e) = ConversationCtrl::record(&state.conn, &request, &result).await {
        tracing::warn!("Failed to record conversation: {:?}", e);
    }

    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyToEmailRequest {
    pub email_id: String,
    pub reply_content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyToEmailResponse {
    pub message: String,
    pub ai_reply: ReplyResult,
}

/// # POST /emails/reply
///
/// Generates a polished reply for a drafted response. Sending the mail is
/// not handled here; this endpoint only produces the generated text.
pub async fn reply(
    State(state): State<ServerState>,
    Json(request): Json<ReplyToEmailRequest>,
) -> AppJsonResult<ReplyToEmailResponse> {
    let reply_request = ReplyRequest {
        email_content: request.reply_content,
        sender_email: None,
        subject: None,
        thread_id: None,
        conversation_history: Vec::new(),
    };

    let result = state.reply.generate_reply(&reply_request).await?;

    if let Err(e) = ConversationCtrl::record(&state.conn, &reply_request, &result).await {
        tracing::warn!("Failed to record conversation: {:?}", e);
    }

    tracing::info!(email_id = %request.email_id, "reply generated");

    Ok(Json(ReplyToEmailResponse {
        message: "Reply processed successfully".to_string(),
        ai_reply: result,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReplyRequest {
    pub user_id: String,
    pub reply_content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveReplyResponse {
    pub message: String,
    pub reply_id: i32,
}

/// # POST /emails/save-reply
///
/// Appends an edited reply to the user's ordered list.
pub async fn save_reply(
    State(state): State<ServerState>,
    Json(request): Json<SaveReplyRequest>,
) -> AppJsonResult<SaveReplyResponse> {
    if request.user_id.is_empty() {
        return Err(AppError::BadRequest("User id is required".to_string()));
    }

    let saved = UserReplyCtrl::append(&state.conn, &request.user_id, &request.reply_content).await?;

    Ok(Json(SaveReplyResponse {
        message: "Reply saved successfully".to_string(),
        reply_id: saved.id,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRepliesResponse {
    pub user_id: String,
    pub replies: Vec<String>,
}

/// # GET /emails/saved-replies/:user_id
pub async fn saved_replies(
    State(state): State<ServerState>,
    Path(user_id): Path<String>,
) -> AppJsonResult<SavedRepliesResponse> {
    let replies = UserReplyCtrl::list_for_user(&state.conn, &user_id)
        .await?
        .into_iter()
        .map(|r| r.content)
        .collect();

    Ok(Json(SavedRepliesResponse { user_id, replies }))
}

/// # POST /emails/:id/read
pub async fn mark_as_read(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppJsonResult<Value> {
    state.gmail.mark_as_read(&id).await?;

    if let Err(e) = EmailCtrl::set_read(&state.conn, &id, true).await {
        tracing::warn!("Failed to update stored read flag: {:?}", e);
    }

    Ok(Json(json!({ "message": "Marked as read" })))
}

/// # POST /emails/:id/unread
pub async fn mark_as_unread(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppJsonResult<Value> {
    state.gmail.mark_as_unread(&id).await?;

    if let Err(e) = EmailCtrl::set_read(&state.conn, &id, false).await {
        tracing::warn!("Failed to update stored read flag: {:?}", e);
    }

    Ok(Json(json!({ "message": "Marked as unread" })))
}

/// # POST /emails/:id/star
pub async fn star(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppJsonResult<Value> {
    state.gmail.star(&id).await?;

    if let Err(e) = EmailCtrl::set_starred(&state.conn, &id, true).await {
        tracing::warn!("Failed to update stored starred flag: {:?}", e);
    }

    Ok(Json(json!({ "message": "Starred" })))
}

/// # POST /emails/:id/unstar
pub async fn unstar(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppJsonResult<Value> {
    state.gmail.unstar(&id).await?;

    if let Err(e) = EmailCtrl::set_starred(&state.conn, &id, false).await {
        tracing::warn!("Failed to update stored starred flag: {:?}", e);
    }

    Ok(Json(json!({ "message": "Unstarred" })))
}
