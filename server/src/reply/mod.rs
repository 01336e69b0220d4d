mod generate;

pub use generate::ReplyClient;

use serde::{Deserialize, Serialize};

/// Inbound smart-reply request from the presentation layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub email_content: String,
    pub sender_email: Option<String>,
    pub subject: Option<String>,
    pub thread_id: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
}

/// One prior turn of the conversation, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub sender: String,
    pub content: String,
}

/// What the API returns to the caller: the collaborator's fields unchanged.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyResult {
    pub reply: String,
    pub confidence: f64,
    pub similar_emails_found: i32,
    pub context_used: bool,
    pub processing_time: f64,
    /// Named processing stages the collaborator reports having executed
    pub workflow_stages: Vec<String>,
}

/// Payload sent to the reply-generation service.
#[derive(Debug, Serialize)]
struct GenerateReplyApiRequest<'a> {
    email_content: &'a str,
    sender_info: &'a str,
    subject: &'a str,
}

/// Collaborator response. `workflow_stages` is optional on the wire; older
/// service versions omit it.
#[derive(Debug, Deserialize)]
struct GenerateReplyApiResponse {
    reply_content: String,
    confidence_score: f64,
    similar_emails_found: i32,
    context_used: bool,
    processing_time: f64,
    #[serde(default)]
    workflow_stages: Vec<String>,
}
