//! Scene-analysis pipeline: orchestration and streaming core.
//!
//! A run fans detection and OCR out across the request's images, folds the
//! evidence into a deterministic prompt, drives a token-streaming inference
//! call, and forwards each fragment to the stream publisher while buffering
//! the full text for persistence. Collaborators (engines, storage,
//! persistence) are injected through the traits below, so the orchestrator
//! can be exercised end to end without any external service.

mod confidence;
mod events;
mod orchestrator;
mod prompt;
mod publisher;

pub use confidence::ConfidenceBand;
pub use events::{
    EngineError, FetchError, PersistError, PipelineError, PipelineState, StreamEvent,
};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineRequest, PipelineResult};
pub use prompt::build_prompt;
pub use publisher::{ClientDisconnected, StreamPublisher};

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::models::{Finding, ImageStatus, MessageRole, TextFragment};

/// A finite, forward-only sequence of generated text fragments.
///
/// The stream is not restartable; dropping it cancels the underlying
/// inference call.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, EngineError>> + Send>>;

/// Object-detection collaborator.
#[async_trait]
pub trait DetectionEngine: Send + Sync {
    /// Detect objects in an image. Output order is whatever the engine
    /// returned; the prompt builder re-sorts before rendering.
    async fn detect(&self, image: &[u8]) -> Result<Vec<Finding>, EngineError>;
}

/// Text-extraction (OCR) collaborator.
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    async fn extract(&self, image: &[u8]) -> Result<Vec<TextFragment>, EngineError>;
}

/// Language-model collaborator.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Start a generation and return the token stream.
    async fn stream_generate(&self, prompt: &str) -> Result<TokenStream, EngineError>;
}

/// Image storage collaborator: resolves image ids to bytes and tracks
/// per-image processing status.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn fetch(&self, image_id: &str) -> Result<Vec<u8>, FetchError>;

    /// Record the processing status of an image. Best-effort: the pipeline
    /// ignores failures here.
    async fn set_status(&self, image_id: &str, status: ImageStatus) -> Result<(), FetchError>;
}

/// Persistence collaborator for finalized messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably store a message and return its persisted id.
    async fn save_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<String, PersistError>;
}
