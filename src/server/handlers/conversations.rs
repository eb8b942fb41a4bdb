//! Conversation CRUD handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::super::AppState;
use super::{error_response, internal_error};
use crate::models::Conversation;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConversationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Create a conversation.
pub async fn create_conversation(
    State(state): State<AppState>,
    Json(req): Json<CreateConversationRequest>,
) -> Response {
    let name = req.name.trim();
    if name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "name must not be empty");
    }

    let conversation = Conversation::new(name.to_string(), req.description);
    if let Err(e) = state.repo.create_conversation(&conversation).await {
        return internal_error(e);
    }

    (StatusCode::CREATED, Json(conversation)).into_response()
}

/// List all conversations, most recently updated first.
pub async fn list_conversations(State(state): State<AppState>) -> Response {
    match state.repo.list_conversations().await {
        Ok(conversations) => Json(conversations).into_response(),
        Err(e) => internal_error(e),
    }
}

/// Get a conversation with its images and messages.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let conversation = match state.repo.get_conversation(&id).await {
        Ok(Some(c)) => c,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "conversation not found"),
        Err(e) => return internal_error(e),
    };

    let images = match state.repo.list_images(&id).await {
        Ok(images) => images,
        Err(e) => return internal_error(e),
    };
    let messages = match state.repo.list_messages(&id).await {
        Ok(messages) => messages,
        Err(e) => return internal_error(e),
    };

    Json(serde_json::json!({
        "conversation": conversation,
        "images": images,
        "messages": messages,
    }))
    .into_response()
}

/// Rename or redescribe a conversation.
pub async fn update_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateConversationRequest>,
) -> Response {
    let existing = match state.repo.get_conversation(&id).await {
        Ok(Some(c)) => c,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "conversation not found"),
        Err(e) => return internal_error(e),
    };

    let name = match req.name {
        Some(ref name) if name.trim().is_empty() => {
            return error_response(StatusCode::BAD_REQUEST, "name must not be empty");
        }
        Some(name) => name,
        None => existing.name,
    };
    let description = req.description.or(existing.description);

    match state
        .repo
        .update_conversation(&id, &name, description.as_deref())
        .await
    {
        Ok(true) => StatusCode::OK.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "conversation not found"),
        Err(e) => internal_error(e),
    }
}

/// Delete a conversation and its dependent rows.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.repo.delete_conversation(&id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "conversation not found"),
        Err(e) => internal_error(e),
    }
}

/// List a conversation's messages, oldest first.
pub async fn list_messages(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.repo.get_conversation(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "conversation not found"),
        Err(e) => return internal_error(e),
    }

    match state.repo.list_messages(&id).await {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => internal_error(e),
    }
}
