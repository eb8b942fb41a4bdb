//! Stream events, pipeline states, and the error taxonomy.

use serde_json::json;
use thiserror::Error;

/// An event on the outbound stream.
///
/// Transient wire-only data: exactly one terminal event (`Done` or `Error`)
/// is emitted per run, and no `Token` follows it.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// One incremental fragment of generated text.
    Token { token: String },
    /// Successful completion: the persisted message id and full text.
    Done { message_id: String, content: String },
    /// Failed completion.
    Error { kind: &'static str, message: String },
}

impl StreamEvent {
    /// Wire name of the event frame.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// JSON payload of the event frame.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Token { token } => json!({ "token": token }),
            Self::Done {
                message_id,
                content,
            } => json!({ "message_id": message_id, "content": content }),
            Self::Error { kind, message } => json!({ "kind": kind, "message": message }),
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Token { .. })
    }
}

/// States of one pipeline run, used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    Extracting,
    Composing,
    Streaming,
    Finalizing,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Extracting => "extracting",
            Self::Composing => "composing",
            Self::Streaming => "streaming",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Failure of an external engine call (detection, extraction, inference).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine unreachable or the call timed out.
    #[error("engine unreachable: {0}")]
    Unavailable(String),
    /// Engine reachable but returned an error.
    #[error("engine error: {0}")]
    Api(String),
    /// Engine response could not be parsed.
    #[error("bad engine response: {0}")]
    Parse(String),
}

/// Failure fetching image content from storage.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Failure writing to the persistence gateway.
#[derive(Debug, Error)]
#[error("persistence failure: {0}")]
pub struct PersistError(pub String);

/// Fatal pipeline errors, surfaced as the terminal `error` frame.
///
/// Detection/extraction failures never appear here: they degrade the
/// aggregate and are only logged. Client disconnects are a cancellation,
/// not an error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("inference unavailable: {0}")]
    InferenceUnavailable(String),
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl PipelineError {
    /// Stable taxonomy code carried in the `error` frame.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "resource_not_found",
            Self::InferenceUnavailable(_) => "inference_unavailable",
            Self::PersistenceFailure(_) => "persistence_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_and_terminality() {
        let token = StreamEvent::Token {
            token: "The".to_string(),
        };
        let done = StreamEvent::Done {
            message_id: "m1".to_string(),
            content: "The scene".to_string(),
        };
        let error = StreamEvent::Error {
            kind: "inference_unavailable",
            message: "engine went away".to_string(),
        };

        assert_eq!(token.name(), "token");
        assert!(!token.is_terminal());
        assert_eq!(done.name(), "done");
        assert!(done.is_terminal());
        assert_eq!(error.name(), "error");
        assert!(error.is_terminal());
    }

    #[test]
    fn test_event_payloads() {
        let done = StreamEvent::Done {
            message_id: "m1".to_string(),
            content: "The scene".to_string(),
        };
        assert_eq!(
            done.payload(),
            serde_json::json!({ "message_id": "m1", "content": "The scene" })
        );

        let token = StreamEvent::Token {
            token: " scene".to_string(),
        };
        assert_eq!(token.payload(), serde_json::json!({ "token": " scene" }));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            PipelineError::Validation("no images".to_string()).kind(),
            "validation_error"
        );
        assert_eq!(
            PipelineError::NotFound("image x".to_string()).kind(),
            "resource_not_found"
        );
        assert_eq!(
            PipelineError::InferenceUnavailable("down".to_string()).kind(),
            "inference_unavailable"
        );
        assert_eq!(
            PipelineError::PersistenceFailure("disk".to_string()).kind(),
            "persistence_failure"
        );
    }
}
