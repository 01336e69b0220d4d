use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use http::HeaderValue;
use tower_http::cors::CorsLayer;

use crate::{request_tracing, server_config::cfg, ServerState};

use super::email;

pub struct AppRouter;

impl AppRouter {
    pub fn create(state: ServerState) -> Router {
        let origins = cfg
            .frontend
            .origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>().unwrap())
            .collect::<Vec<_>>();

        let cors_layer = CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true);

        Router::new()
            .route("/", get(|| async { "Mailpilot server" }))
            .nest(
                "/emails",
                Router::new()
                    .route("/", get(email::get_all))
                    .route("/generate-smart-reply", post(email::generate_smart_reply))
                    .route("/reply", post(email::reply))
                    .route("/save-reply", post(email::save_reply))
                    .route("/saved-replies/:user_id", get(email::saved_replies))
                    .route("/:id/read", post(email::mark_as_read))
                    .route("/:id/unread", post(email::mark_as_unread))
                    .route("/:id/star", post(email::star))
                    .route("/:id/unstar", post(email::unstar))
                    .with_state(state.clone()),
            )
            .layer(request_tracing::propagate_request_id_layer())
            .layer(request_tracing::trace_layer())
            .layer(request_tracing::set_request_id_layer())
            .layer(cors_layer)
            .with_state(state)
            .fallback(handler_404)
    }
}

pub async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Route does not exist")
}
