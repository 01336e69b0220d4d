#![allow(dead_code)]

mod db_core;
mod email;
mod error;
mod model;
mod reply;
mod request_tracing;
mod routes;
mod server_config;
mod testing;
mod util;

use std::{env, net::SocketAddr, sync::Arc};

use axum::{extract::FromRef, Router};
use mimalloc::MiMalloc;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::email::client::GmailClient;
use crate::reply::ReplyClient;
use crate::routes::AppRouter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub type HttpClient = reqwest::Client;

#[derive(Clone, FromRef)]
struct ServerState {
    http_client: HttpClient,
    conn: DatabaseConnection,
    gmail: Arc<GmailClient>,
    reply: ReplyClient,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL is not set in .env file");
    let mut db_options = ConnectOptions::new(db_url);
    db_options.sqlx_logging(false);

    let conn = Database::connect(db_options)
        .await
        .expect("Database connection failed");

    let http_client = reqwest::ClientBuilder::new().use_rustls_tls().build()?;

    let gmail = Arc::new(GmailClient::from_config(http_client.clone())?);
    let reply = ReplyClient::from_config(http_client.clone());

    let state = ServerState {
        http_client,
        conn,
        gmail,
        reply,
    };

    let router = AppRouter::create(state);

    run_server(router).await
}

async fn run_server(router: Router) -> anyhow::Result<()> {
    let port = env::var("PORT").unwrap_or("5006".to_string());
    tracing::info!("Mailpilot server running on http://0.0.0.0:{}", port);
    // check config
    println!("{}", *server_config::cfg);

    let addr = SocketAddr::from(([0, 0, 0, 0], port.parse::<u16>()?));
    tracing::debug!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Cleanups done, shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    #[cfg(feature = "integration")]
    use super::*;
    #[cfg(feature = "integration")]
    use tokio::net::TcpListener;

    #[cfg(feature = "integration")]
    pub struct TestServer {
        pub addr: SocketAddr,
        pub state: ServerState,
        shutdown_tx: tokio::sync::oneshot::Sender<()>,
    }

    #[cfg(feature = "integration")]
    impl TestServer {
        pub fn url(&self) -> String {
            format!("http://{}", self.addr)
        }

        pub async fn shutdown(self) {
            let _ = self.shutdown_tx.send(());
        }
    }

    #[cfg(feature = "integration")]
    pub async fn setup() -> anyhow::Result<TestServer> {
        dotenvy::dotenv().ok();

        let db_url = env::var("DATABASE_URL").expect("DATABASE_URL is not set in .env file");
        let mut db_options = ConnectOptions::new(db_url);
        db_options.sqlx_logging(false);

        let conn = Database::connect(db_options)
            .await
            .expect("Database connection failed");

        let http_client = reqwest::ClientBuilder::new().use_rustls_tls().build()?;

        let state = ServerState {
            http_client: http_client.clone(),
            conn,
            gmail: Arc::new(GmailClient::from_config(http_client.clone())?),
            reply: ReplyClient::from_config(http_client),
        };

        let router = AppRouter::create(state.clone());

        // Bind to port 0 to get a random available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Ok(TestServer {
            addr,
            state,
            shutdown_tx,
        })
    }

    #[cfg(feature = "integration")]
    #[tokio::test]
    async fn test_server_starts() {
        let server = setup().await.expect("Failed to setup test server");
        assert!(!server.url().is_empty());
        server.shutdown().await;
    }
}
