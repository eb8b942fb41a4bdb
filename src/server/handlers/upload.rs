//! Image upload handler.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::super::{AppState, MAX_UPLOAD_BYTES};
use super::{error_response, internal_error};

const ACCEPTED_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/tiff"];

/// Accept a multipart upload of one image into a conversation.
///
/// Expects a `conversation_id` field and a `file` field with an image
/// content type. Rejects unsupported types and files over the size cap
/// before anything touches disk.
pub async fn upload_image(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut conversation_id: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut mime_type: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        };

        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("conversation_id") => match field.text().await {
                Ok(text) => conversation_id = Some(text),
                Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
            },
            Some("file") => {
                filename = field.file_name().map(|n| n.to_string());
                mime_type = field.content_type().map(|c| c.to_string());
                match field.bytes().await {
                    Ok(bytes) => content = Some(bytes.to_vec()),
                    Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
                }
            }
            _ => {}
        }
    }

    let Some(conversation_id) = conversation_id else {
        return error_response(StatusCode::BAD_REQUEST, "missing conversation_id field");
    };
    let Some(content) = content else {
        return error_response(StatusCode::BAD_REQUEST, "missing file field");
    };
    let mime_type = mime_type.unwrap_or_default();
    if !ACCEPTED_TYPES.contains(&mime_type.as_str()) {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("unsupported content type: {mime_type}"),
        );
    }
    if content.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "uploaded file is empty");
    }
    if content.len() > MAX_UPLOAD_BYTES {
        return error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("file exceeds {} byte limit", MAX_UPLOAD_BYTES),
        );
    }

    match state.repo.get_conversation(&conversation_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "conversation not found"),
        Err(e) => return internal_error(e),
    }

    let filename = filename.unwrap_or_else(|| "upload".to_string());
    match state
        .images
        .save_image(&conversation_id, &filename, &mime_type, &content)
        .await
    {
        Ok(image) => (StatusCode::CREATED, Json(image)).into_response(),
        Err(e) => internal_error(e),
    }
}

/// Delete an uploaded image: removes both the stored blob and the row.
pub async fn delete_image(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.images.delete_image(&id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "image not found"),
        Err(e) => internal_error(e),
    }
}
