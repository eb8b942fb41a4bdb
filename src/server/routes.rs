//! Router configuration for the web server.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::handlers;
use super::{AppState, MAX_UPLOAD_BYTES};

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/status", get(handlers::api_status))
        // Conversations
        .route(
            "/api/conversations",
            get(handlers::list_conversations).post(handlers::create_conversation),
        )
        .route(
            "/api/conversations/:id",
            get(handlers::get_conversation)
                .patch(handlers::update_conversation)
                .delete(handlers::delete_conversation),
        )
        .route(
            "/api/conversations/:id/messages",
            get(handlers::list_messages),
        )
        // Evidence upload and analysis
        .route("/api/upload", post(handlers::upload_image))
        .route("/api/upload/:id", delete(handlers::delete_image))
        .route("/api/analyze/stream", post(handlers::analyze_stream))
        // Leave headroom over the file cap for multipart framing.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
