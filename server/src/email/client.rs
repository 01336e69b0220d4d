use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use leaky_bucket::RateLimiter;
use reqwest::StatusCode;
use serde_json::json;
use tokio::sync::RwLock;

use crate::email::api_quota::{self, QUOTA_PER_SECOND};
use crate::email::raw_message::{ListMessagesResponse, RawMessage};
use crate::error::{AppError, AppResult};
use crate::model::response::GmailApiRefreshTokenResponse;
use crate::server_config::{cfg, FetchConfig, GmailConfig};
use crate::util::check_expired;
use crate::HttpClient;

const GMAIL_ENDPOINT: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

const UNREAD_LABEL: &str = "UNREAD";
const STARRED_LABEL: &str = "STARRED";

macro_rules! gmail_url {
    ($base:expr $(, $seg:expr)*) => {
        {
            let segments: Vec<&str> = vec![$($seg),*];
            if segments.is_empty() {
                $base.to_string()
            } else {
                format!("{}/{}", $base, segments.join("/"))
            }
        }
    };
}

/// OAuth2 credentials for the refresh-token flow.
#[derive(Debug, Clone)]
pub struct GmailAuth {
    pub client_id: String,
    pub client_secret: String,
    pub token_uri: String,
    pub refresh_token: String,
}

impl GmailAuth {
    fn from_config(gmail: &GmailConfig) -> AppResult<Self> {
        if gmail.refresh_token.is_empty() {
            return Err(anyhow!("GMAIL_REFRESH_TOKEN is not configured").into());
        }

        Ok(GmailAuth {
            client_id: gmail.client_id.clone(),
            client_secret: gmail.client_secret.clone(),
            token_uri: gmail.token_uri.clone(),
            refresh_token: gmail.refresh_token.clone(),
        })
    }
}

#[derive(Debug)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Result of a full mailbox walk. `truncated` is set when the page ceiling
/// ended the fetch while the provider still had more pages to give.
#[derive(Debug)]
pub struct FetchedMailbox {
    pub messages: Vec<RawMessage>,
    pub pages: u32,
    pub truncated: bool,
}

/// Client for the mailbox provider's REST API. Explicitly constructed and
/// injected; authenticates with a refresh token and caches the resulting
/// access token until it nears expiry.
#[derive(Debug)]
pub struct GmailClient {
    http_client: HttpClient,
    auth: GmailAuth,
    api_base: String,
    fetch: FetchConfig,
    rate_limiter: RateLimiter,
    token: RwLock<Option<AccessToken>>,
}

impl GmailClient {
    pub fn new(
        http_client: HttpClient,
        auth: GmailAuth,
        fetch: FetchConfig,
        api_base: impl Into<String>,
    ) -> GmailClient {
        let rate_limiter = RateLimiter::builder()
            .initial(QUOTA_PER_SECOND)
            .interval(Duration::from_secs(1))
            .refill(QUOTA_PER_SECOND)
            .build();

        GmailClient {
            http_client,
            auth,
            api_base: api_base.into(),
            fetch,
            rate_limiter,
            token: RwLock::new(None),
        }
    }

    pub fn from_config(http_client: HttpClient) -> AppResult<GmailClient> {
        let auth = GmailAuth::from_config(&cfg.gmail_config)?;
        Ok(GmailClient::new(
            http_client,
            auth,
            cfg.fetch.clone(),
            GMAIL_ENDPOINT,
        ))
    }

    /// Current access token, refreshed through the token endpoint when
    /// missing or within the expiry margin.
    async fn access_token(&self) -> AppResult<String> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if !check_expired(token.expires_at) {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut guard = self.token.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(token) = guard.as_ref() {
            if !check_expired(token.expires_at) {
                return Ok(token.value.clone());
            }
        }

        let refreshed = self.exchange_refresh_token().await?;
        let value = refreshed.access_token.clone();
        *guard = Some(AccessToken {
            value: refreshed.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(refreshed.expires_in as i64),
        });

        Ok(value)
    }

    async fn exchange_refresh_token(&self) -> AppResult<GmailApiRefreshTokenResponse> {
        let params = [
            ("client_id", self.auth.client_id.as_str()),
            ("client_secret", self.auth.client_secret.as_str()),
            ("refresh_token", self.auth.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let resp = self
            .http_client
            .post(&self.auth.token_uri)
            .form(&params)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Token exchange failed ({status}): {body}").into());
        }

        let parsed = resp
            .json::<GmailApiRefreshTokenResponse>()
            .await
            .context("Could not parse token response")?;

        Ok(parsed)
    }

    /// GET with bearer auth and bounded retry with backoff on 429 responses.
    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> AppResult<reqwest::Response> {
        const MAX_RETRIES: u32 = 3;
        let mut retry_count = 0;

        loop {
            let token = self.access_token().await?;
            let resp = self
                .http_client
                .get(url)
                .query(query)
                .bearer_auth(token)
                .send()
                .await?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                if retry_count >= MAX_RETRIES {
                    return Err(AppError::TooManyRequests);
                }
                retry_count += 1;
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_secs(1 << (retry_count - 1));
                tracing::info!(
                    "Provider rate limit hit, retrying after {:?} (attempt {}/{})",
                    delay,
                    retry_count,
                    MAX_RETRIES
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(anyhow!("Gmail API request failed ({status}): {body}").into());
            }

            return Ok(resp);
        }
    }

    pub async fn get_message_list(
        &self,
        page_token: Option<String>,
    ) -> AppResult<ListMessagesResponse> {
        self.rate_limiter.acquire(api_quota::MESSAGES_LIST).await;

        let mut query = vec![("maxResults".to_string(), self.fetch.page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken".to_string(), token));
        }

        let resp = self
            .get_with_retry(&gmail_url!(self.api_base, "messages"), &query)
            .await?;

        let data = resp
            .json::<ListMessagesResponse>()
            .await
            .context("Could not parse message list response")?;

        Ok(data)
    }

    pub async fn get_message_by_id(&self, message_id: &str) -> AppResult<RawMessage> {
        self.rate_limiter.acquire(api_quota::MESSAGES_GET).await;

        let query = vec![("format".to_string(), "full".to_string())];
        let resp = self
            .get_with_retry(&gmail_url!(self.api_base, "messages", message_id), &query)
            .await?;

        let message = resp
            .json::<RawMessage>()
            .await
            .context("Error getting message")?;

        Ok(message)
    }

    /// Walk the whole mailbox: list pages until the provider stops returning
    /// continuation tokens or the page ceiling is reached, fetching each
    /// page's message details concurrently (bounded). Any provider error
    /// aborts the walk; partial results are discarded, never returned.
    pub async fn fetch_all_messages(&self) -> AppResult<FetchedMailbox> {
        let mut messages: Vec<RawMessage> = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;
        let mut truncated = false;

        loop {
            let list = self.get_message_list(page_token.take()).await?;
            pages += 1;

            if list.messages.is_empty() {
                tracing::info!(pages, "no more messages in listing");
                break;
            }

            let ids: Vec<String> = list.messages.iter().map(|m| m.id.clone()).collect();
            let page: Vec<RawMessage> =
                stream::iter(ids.into_iter().map(|id| async move {
                    self.get_message_by_id(&id).await
                }))
                    .buffer_unordered(self.fetch.detail_concurrency)
                    .try_collect()
                    .await?;
            messages.extend(page);

            tracing::info!(pages, total = messages.len(), "fetched message page");

            match list.next_page_token {
                Some(_) if pages >= self.fetch.max_pages => {
                    // The mailbox has more, but the safety ceiling ends the walk
                    tracing::warn!(pages, "reached page ceiling, fetch is truncated");
                    truncated = true;
                    break;
                }
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(FetchedMailbox {
            messages,
            pages,
            truncated,
        })
    }

    pub async fn modify_labels(
        &self,
        message_id: &str,
        add: &[&str],
        remove: &[&str],
    ) -> AppResult<()> {
        self.rate_limiter.acquire(api_quota::MESSAGES_MODIFY).await;

        let token = self.access_token().await?;
        let resp = self
            .http_client
            .post(gmail_url!(self.api_base, "messages", message_id, "modify"))
            .bearer_auth(token)
            .json(&json!({
                "addLabelIds": add,
                "removeLabelIds": remove,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Error modifying message labels ({status}): {body}").into());
        }

        Ok(())
    }

    pub async fn mark_as_read(&self, message_id: &str) -> AppResult<()> {
        self.modify_labels(message_id, &[], &[UNREAD_LABEL]).await
    }

    pub async fn mark_as_unread(&self, message_id: &str) -> AppResult<()> {
        self.modify_labels(message_id, &[UNREAD_LABEL], &[]).await
    }

    pub async fn star(&self, message_id: &str) -> AppResult<()> {
        self.modify_labels(message_id, &[STARRED_LABEL], &[]).await
    }

    pub async fn unstar(&self, message_id: &str) -> AppResult<()> {
        self.modify_labels(message_id, &[], &[STARRED_LABEL]).await
    }
}
