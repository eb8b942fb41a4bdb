//! Streaming analysis handler.

use std::collections::HashSet;
use std::convert::Infallible;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use super::super::AppState;
use super::{error_response, internal_error};
use crate::pipeline::{PipelineRequest, StreamPublisher};

/// Outbound channel capacity. Sized so short bursts of tokens never block
/// the orchestrator on a healthy connection.
const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub conversation_id: String,
    pub image_ids: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Run the analysis pipeline and stream its events back over SSE.
///
/// The request is validated before the stream opens, so malformed input
/// gets an ordinary HTTP error instead of an `error` frame. Once the
/// response starts, all outcomes arrive as stream events.
pub async fn analyze_stream(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Response {
    if req.image_ids.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "image_ids must not be empty");
    }
    let mut seen = HashSet::new();
    for id in &req.image_ids {
        if !seen.insert(id.as_str()) {
            return error_response(StatusCode::BAD_REQUEST, format!("duplicate image id: {id}"));
        }
    }

    match state.repo.get_conversation(&req.conversation_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "conversation not found"),
        Err(e) => return internal_error(e),
    }
    for id in &req.image_ids {
        match state.repo.get_image(id).await {
            Ok(Some(image)) if image.conversation_id == req.conversation_id => {}
            Ok(Some(_)) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("image {id} belongs to another conversation"),
                );
            }
            Ok(None) => {
                return error_response(StatusCode::NOT_FOUND, format!("image not found: {id}"));
            }
            Err(e) => return internal_error(e),
        }
    }

    let request = PipelineRequest {
        conversation_id: req.conversation_id,
        image_ids: req.image_ids,
        context: req.context.unwrap_or_default(),
    };

    let (publisher, rx) = StreamPublisher::channel(EVENT_CHANNEL_CAPACITY);
    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        pipeline.run(request, publisher).await;
    });

    let events = ReceiverStream::new(rx).map(|event| {
        Ok::<_, Infallible>(
            Event::default()
                .event(event.name())
                .data(event.payload().to_string()),
        )
    });

    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}
