//! HTTP request handlers for the web server.

mod analyze;
mod api;
mod conversations;
mod upload;

pub use analyze::analyze_stream;
pub use api::{api_status, health};
pub use conversations::{
    create_conversation, delete_conversation, get_conversation, list_conversations,
    list_messages, update_conversation,
};
pub use upload::{delete_image, upload_image};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Build an error response body in the `{"error": ...}` shape.
pub(super) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Map a repository failure to a 500 response, logging the detail.
pub(super) fn internal_error(err: impl std::fmt::Display) -> Response {
    tracing::error!(error = %err, "request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}
