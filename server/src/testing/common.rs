use std::net::SocketAddr;

use axum::Router;

/// Serve a router on an OS-assigned local port. Used to stand in for the
/// mail provider and the reply service when driving clients in tests.
pub async fn spawn_test_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Test listener has no address");

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr
}
