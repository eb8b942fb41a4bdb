//! Status and liveness handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::super::AppState;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Overall service status: row counts plus engine availability.
pub async fn api_status(State(state): State<AppState>) -> impl IntoResponse {
    let conversations = state.repo.count_conversations().await.unwrap_or(0);
    let messages = state.repo.count_messages().await.unwrap_or(0);
    let images = state.repo.count_images().await.unwrap_or(0);

    let (detection, extraction, llm) = tokio::join!(
        state.detection.is_available(),
        state.extraction.is_available(),
        state.llm.is_available(),
    );

    axum::Json(serde_json::json!({
        "conversations": conversations,
        "messages": messages,
        "images": images,
        "engines": {
            "detection": detection,
            "extraction": extraction,
            "llm": llm,
        },
    }))
}
