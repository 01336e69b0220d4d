use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::StatusCode;
use url::Url;

use crate::error::{AppError, AppResult};
use crate::server_config::cfg;
use crate::HttpClient;

use super::{GenerateReplyApiRequest, GenerateReplyApiResponse, ReplyRequest, ReplyResult};

const FALLBACK_SENDER: &str = "unknown@example.com";
const FALLBACK_SUBJECT: &str = "No Subject";

/// Client for the external reply-generation service. The long timeout
/// accommodates the collaborator's own multi-stage pipeline and its
/// upstream rate-limit backoff.
#[derive(Debug, Clone)]
pub struct ReplyClient {
    http_client: HttpClient,
    base_url: Url,
    timeout: Duration,
}

impl ReplyClient {
    pub fn new(http_client: HttpClient, base_url: Url, timeout: Duration) -> ReplyClient {
        ReplyClient {
            http_client,
            base_url,
            timeout,
        }
    }

    pub fn from_config(http_client: HttpClient) -> ReplyClient {
        ReplyClient::new(
            http_client,
            cfg.reply.base_url.clone(),
            Duration::from_secs(cfg.reply.timeout_secs),
        )
    }

    /// Ask the reply service for a generated reply. Strict remote-only: when
    /// the service is unreachable or not ready the caller gets a
    /// service-unavailable error, never a locally fabricated reply.
    pub async fn generate_reply(&self, request: &ReplyRequest) -> AppResult<ReplyResult> {
        if request.email_content.trim().is_empty() {
            return Err(AppError::BadRequest("Email content is required".to_string()));
        }

        let body = GenerateReplyApiRequest {
            email_content: &request.email_content,
            sender_info: request.sender_email.as_deref().unwrap_or(FALLBACK_SENDER),
            subject: request.subject.as_deref().unwrap_or(FALLBACK_SUBJECT),
        };

        let url = self
            .base_url
            .join("generate-reply")
            .context("Invalid reply service URL")?;

        tracing::info!(
            content_length = request.email_content.len(),
            sender = body.sender_info,
            has_thread = request.thread_id.is_some(),
            "requesting reply generation"
        );

        let resp = self
            .http_client
            .post(url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    tracing::error!("Reply service unreachable at {}", self.base_url);
                    AppError::ServiceUnavailable(
                        "Reply generation service is required but not available".to_string(),
                    )
                } else {
                    AppError::Internal(e.into())
                }
            })?;

        if resp.status() == StatusCode::SERVICE_UNAVAILABLE {
            // The service answers 503 while its pipeline is still initializing
            return Err(AppError::ServiceUnavailable(
                "Reply generation service is not ready".to_string(),
            ));
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Reply service error ({status}): {body}").into());
        }

        let parsed = resp
            .json::<GenerateReplyApiResponse>()
            .await
            .context("Could not parse reply service response")?;

        tracing::info!(
            confidence = parsed.confidence_score,
            similar_emails = parsed.similar_emails_found,
            context_used = parsed.context_used,
            processing_time = parsed.processing_time,
            "reply generation complete"
        );

        Ok(ReplyResult {
            reply: parsed.reply_content,
            confidence: parsed.confidence_score,
            similar_emails_found: parsed.similar_emails_found,
            context_used: parsed.context_used,
            processing_time: parsed.processing_time,
            workflow_stages: parsed.workflow_stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::testing::common::spawn_test_server;

    fn request(content: &str) -> ReplyRequest {
        ReplyRequest {
            email_content: content.to_string(),
            sender_email: Some("sender@example.com".to_string()),
            subject: Some("Meeting tomorrow".to_string()),
            thread_id: None,
            conversation_history: Vec::new(),
        }
    }

    fn client_for(addr: &SocketAddr) -> ReplyClient {
        ReplyClient::new(
            reqwest::Client::new(),
            Url::parse(&format!("http://{addr}")).unwrap(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_empty_content_is_rejected_without_remote_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let router = Router::new().route(
            "/generate-reply",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "reply_content": "should never be seen",
                        "confidence_score": 1.0,
                        "similar_emails_found": 0,
                        "context_used": false,
                        "processing_time": 0.1
                    }))
                }
            }),
        );
        let addr = spawn_test_server(router).await;
        let client = client_for(&addr);

        let err = client.generate_reply(&request("   ")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_collaborator_fields_are_relayed_unchanged() {
        let router = Router::new().route(
            "/generate-reply",
            post(|| async {
                Json(json!({
                    "reply_content": "Hello",
                    "confidence_score": 0.92,
                    "similar_emails_found": 3,
                    "context_used": true,
                    "processing_time": 1.4
                }))
            }),
        );
        let addr = spawn_test_server(router).await;
        let client = client_for(&addr);

        let result = client.generate_reply(&request("Hi there")).await.unwrap();

        assert_eq!(result.reply, "Hello");
        assert_eq!(result.confidence, 0.92);
        assert_eq!(result.similar_emails_found, 3);
        assert!(result.context_used);
        assert_eq!(result.processing_time, 1.4);
        assert!(result.workflow_stages.is_empty());
    }

    #[tokio::test]
    async fn test_workflow_stages_are_relayed_when_present() {
        let router = Router::new().route(
            "/generate-reply",
            post(|| async {
                Json(json!({
                    "reply_content": "Hello",
                    "confidence_score": 0.8,
                    "similar_emails_found": 1,
                    "context_used": true,
                    "processing_time": 2.0,
                    "workflow_stages": ["entry", "retrieval", "generation", "critique"]
                }))
            }),
        );
        let addr = spawn_test_server(router).await;
        let client = client_for(&addr);

        let result = client.generate_reply(&request("Hi there")).await.unwrap();

        assert_eq!(
            result.workflow_stages,
            vec!["entry", "retrieval", "generation", "critique"]
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_maps_to_service_unavailable() {
        // Grab a port that nothing is listening on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&addr);

        let err = client.generate_reply(&request("Hi there")).await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_not_ready_service_maps_to_service_unavailable() {
        let router = Router::new().route(
            "/generate-reply",
            post(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
        );
        let addr = spawn_test_server(router).await;
        let client = client_for(&addr);

        let err = client.generate_reply(&request("Hi there")).await.unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
    }
}
