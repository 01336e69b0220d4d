use config::{Config, ConfigError};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::{env, path::Path, result::Result};
use url::Url;

#[derive(Debug, Deserialize)]
pub struct GmailConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub scopes: Vec<String>,
    /// Refresh token for the mailbox account. Overridable with
    /// GMAIL_REFRESH_TOKEN so the secret can stay out of the config file.
    #[serde(default)]
    pub refresh_token: String,
}

impl GmailConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        builder.try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Messages requested per listing page
    pub page_size: u32,
    /// Pagination safety ceiling; hitting it ends the fetch early
    pub max_pages: u32,
    /// Cap on concurrent per-message detail requests within a page
    pub detail_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct ReplyFileConfig {
    base_url: String,
    timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ReplyServiceConfig {
    pub base_url: Url,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    pub origins: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    fetch: FetchConfig,
    reply: ReplyFileConfig,
    frontend: FrontendConfig,
}

#[derive(Debug)]
pub struct ServerConfig {
    pub fetch: FetchConfig,
    pub reply: ReplyServiceConfig,
    pub gmail_config: GmailConfig,
    pub frontend: FrontendConfig,
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Server Config:\nFetch: {:?}\n\nReply service: {} (timeout {}s)\n\nGmail client id: {}\n\nFrontend origins: {:?}",
            self.fetch,
            self.reply.base_url,
            self.reply.timeout_secs,
            self.gmail_config.client_id,
            self.frontend.origins,
        )
    }
}

lazy_static! {
    pub static ref cfg: ServerConfig = {
        let root = env::var("APP_DIR").unwrap_or_else(|_| {
            let dir =
                env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR or APP_DIR is required");
            let dir = Path::new(&dir).parent().unwrap().display().to_string();
            format!("{}/config", dir)
        });
        let path = format!("{root}/client_secret.toml");
        let mut gmail_config =
            GmailConfig::from_file(&path).expect("client_secret.toml is required");
        if let Ok(refresh_token) = env::var("GMAIL_REFRESH_TOKEN") {
            gmail_config.refresh_token = refresh_token;
        }

        let path = format!("{root}/config.toml");
        let cfg_file: ConfigFile = Config::builder()
            .add_source(config::File::with_name(&path))
            .build()
            .expect("config.toml is required")
            .try_deserialize()
            .expect("config.toml is invalid");

        let ConfigFile {
            fetch,
            reply,
            frontend,
        } = cfg_file;

        let reply_base_url = env::var("REPLY_SERVICE_URL").unwrap_or(reply.base_url);
        let reply = ReplyServiceConfig {
            base_url: Url::parse(&reply_base_url).expect("reply service base_url is invalid"),
            timeout_secs: reply.timeout_secs,
        };

        ServerConfig {
            fetch,
            reply,
            gmail_config,
            frontend,
        }
    };
}
