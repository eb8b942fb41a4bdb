//! The pipeline orchestrator state machine.
//!
//! One run moves through Received, Extracting, Composing, Streaming, and
//! Finalizing, ending in Completed or Failed. Detection and extraction fan
//! out concurrently per image with independent timeouts and their failures
//! only shrink the evidence aggregate; inference and persistence failures
//! are fatal. Exactly one terminal event is published per run, and a run
//! whose client disconnects publishes none and persists nothing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{
    build_prompt, DetectionEngine, EngineError, ExtractionEngine, FetchError, ImageStore,
    InferenceEngine, MessageStore, PipelineError, PipelineState, StreamEvent, StreamPublisher,
};
use crate::models::{Finding, ImageStatus, MessageRole, TextFragment};

/// Timeouts for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Budget for one detection call. Exceeding it fails that call only.
    pub detection_timeout: Duration,
    /// Budget for one extraction call. Exceeding it fails that call only.
    pub extraction_timeout: Duration,
    /// Budget for each successive inference fragment. Exceeding it is fatal.
    pub token_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection_timeout: Duration::from_secs(30),
            extraction_timeout: Duration::from_secs(30),
            token_timeout: Duration::from_secs(120),
        }
    }
}

/// A validated analysis request. Consumed once per run.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub conversation_id: String,
    /// Ordered, unique image ids. Order affects prompt aggregation order.
    pub image_ids: Vec<String>,
    /// Free-text user context, possibly empty.
    pub context: String,
}

/// The finalized output of a successful run, retained for audit.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Persisted message id.
    pub message_id: String,
    /// Full assistant text, identical to the concatenation of streamed tokens.
    pub content: String,
    pub findings: Vec<Finding>,
    pub fragments: Vec<TextFragment>,
}

/// How a run ended short of a fatal error.
enum Outcome {
    Completed(PipelineResult),
    /// Client went away; nothing persisted, no terminal event owed.
    Cancelled,
}

/// Evidence gathered for a single image during fan-out.
struct ImageAnalysis {
    image_id: String,
    findings: Vec<Finding>,
    fragments: Vec<TextFragment>,
    detection_failed: bool,
    extraction_failed: bool,
}

/// The orchestrator. One instance serves many runs; each run owns its own
/// accumulation buffer and shares no mutable state with concurrent runs.
pub struct Pipeline {
    detector: Arc<dyn DetectionEngine>,
    extractor: Arc<dyn ExtractionEngine>,
    inference: Arc<dyn InferenceEngine>,
    images: Arc<dyn ImageStore>,
    store: Arc<dyn MessageStore>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        detector: Arc<dyn DetectionEngine>,
        extractor: Arc<dyn ExtractionEngine>,
        inference: Arc<dyn InferenceEngine>,
        images: Arc<dyn ImageStore>,
        store: Arc<dyn MessageStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            detector,
            extractor,
            inference,
            images,
            store,
            config,
        }
    }

    /// Execute one run, publishing events as they happen.
    ///
    /// Publishes exactly one terminal event unless the client disconnected
    /// first. Returns the finalized result on success.
    pub async fn run(
        &self,
        request: PipelineRequest,
        publisher: StreamPublisher,
    ) -> Option<PipelineResult> {
        let conversation_id = request.conversation_id.clone();
        match self.run_inner(request, &publisher).await {
            Ok(Outcome::Completed(result)) => {
                self.transition(PipelineState::Completed, &conversation_id);
                let done = StreamEvent::Done {
                    message_id: result.message_id.clone(),
                    content: result.content.clone(),
                };
                if publisher.publish(done).await.is_err() {
                    // Message already persisted; the client just never saw
                    // the done frame.
                    debug!(conversation = %conversation_id, "client gone before done frame");
                }
                Some(result)
            }
            Ok(Outcome::Cancelled) => {
                debug!(conversation = %conversation_id, "pipeline run cancelled by disconnect");
                None
            }
            Err(err) => {
                self.transition(PipelineState::Failed, &conversation_id);
                warn!(conversation = %conversation_id, kind = err.kind(), error = %err, "pipeline run failed");
                let _ = publisher
                    .publish(StreamEvent::Error {
                        kind: err.kind(),
                        message: err.to_string(),
                    })
                    .await;
                None
            }
        }
    }

    async fn run_inner(
        &self,
        request: PipelineRequest,
        publisher: &StreamPublisher,
    ) -> Result<Outcome, PipelineError> {
        self.transition(PipelineState::Received, &request.conversation_id);

        if request.image_ids.is_empty() {
            return Err(PipelineError::Validation(
                "request contains no images".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for id in &request.image_ids {
            if !seen.insert(id.as_str()) {
                return Err(PipelineError::Validation(format!(
                    "duplicate image id: {id}"
                )));
            }
        }

        // Resolve every image before dispatching any engine work.
        let mut payloads = Vec::with_capacity(request.image_ids.len());
        for id in &request.image_ids {
            let bytes = self.images.fetch(id).await.map_err(|err| match err {
                FetchError::NotFound(id) => PipelineError::NotFound(format!("image {id}")),
                FetchError::Storage(msg) => {
                    PipelineError::NotFound(format!("image {id} unreadable: {msg}"))
                }
            })?;
            payloads.push((id.clone(), bytes));
        }

        self.transition(PipelineState::Extracting, &request.conversation_id);
        for (id, _) in &payloads {
            let _ = self.images.set_status(id, ImageStatus::Processing).await;
        }

        // Fan out across images; detection and extraction for one image also
        // run in parallel. Every call settles (or times out) before we move
        // on, except when the client disconnects: then the remaining adapter
        // work is abandoned immediately.
        let fan_out = futures::future::join_all(
            payloads
                .iter()
                .map(|(id, bytes)| self.analyze_image(id, bytes)),
        );
        let analyses = tokio::select! {
            analyses = fan_out => analyses,
            _ = publisher.closed() => return Ok(Outcome::Cancelled),
        };

        let mut findings = Vec::new();
        let mut fragments = Vec::new();
        for analysis in analyses {
            let status = if analysis.detection_failed && analysis.extraction_failed {
                ImageStatus::Failed
            } else {
                ImageStatus::Completed
            };
            let _ = self.images.set_status(&analysis.image_id, status).await;
            findings.extend(analysis.findings);
            fragments.extend(analysis.fragments);
        }

        if publisher.is_closed() {
            return Ok(Outcome::Cancelled);
        }

        // Empty aggregates still compose: a hypothesis can be generated from
        // user context alone.
        self.transition(PipelineState::Composing, &request.conversation_id);
        let prompt = build_prompt(&findings, &fragments, &request.context);

        self.transition(PipelineState::Streaming, &request.conversation_id);
        let mut stream = self
            .inference
            .stream_generate(&prompt)
            .await
            .map_err(|err| PipelineError::InferenceUnavailable(err.to_string()))?;

        let mut buffer = String::new();
        loop {
            match timeout(self.config.token_timeout, stream.next()).await {
                Err(_) => {
                    return Err(PipelineError::InferenceUnavailable(
                        "timed out waiting for the next fragment".to_string(),
                    ));
                }
                Ok(None) => break,
                Ok(Some(Err(err))) => {
                    return Err(PipelineError::InferenceUnavailable(err.to_string()));
                }
                Ok(Some(Ok(token))) => {
                    buffer.push_str(&token);
                    let event = StreamEvent::Token { token };
                    if publisher.publish(event).await.is_err() {
                        // Client disconnected mid-stream: stop pulling
                        // fragments and persist nothing.
                        return Ok(Outcome::Cancelled);
                    }
                }
            }
        }

        self.transition(PipelineState::Finalizing, &request.conversation_id);
        let message_id = self
            .store
            .save_message(&request.conversation_id, MessageRole::Assistant, &buffer)
            .await
            .map_err(|err| PipelineError::PersistenceFailure(err.to_string()))?;

        Ok(Outcome::Completed(PipelineResult {
            message_id,
            content: buffer,
            findings,
            fragments,
        }))
    }

    /// Run detection and extraction for one image, absorbing failures.
    async fn analyze_image(&self, image_id: &str, bytes: &[u8]) -> ImageAnalysis {
        let (detected, extracted) = tokio::join!(
            timeout(self.config.detection_timeout, self.detector.detect(bytes)),
            timeout(self.config.extraction_timeout, self.extractor.extract(bytes)),
        );

        let mut analysis = ImageAnalysis {
            image_id: image_id.to_string(),
            findings: Vec::new(),
            fragments: Vec::new(),
            detection_failed: false,
            extraction_failed: false,
        };

        match settle(detected) {
            Ok(items) => analysis.findings = items,
            Err(err) => {
                warn!(image = %image_id, error = %err, "detection failed; continuing without findings");
                analysis.detection_failed = true;
            }
        }
        match settle(extracted) {
            Ok(items) => analysis.fragments = items,
            Err(err) => {
                warn!(image = %image_id, error = %err, "extraction failed; continuing without text");
                analysis.extraction_failed = true;
            }
        }
        analysis
    }

    fn transition(&self, state: PipelineState, conversation_id: &str) {
        debug!(state = state.as_str(), conversation = %conversation_id, "pipeline state");
    }
}

/// Flatten a timed adapter call into a single engine result.
fn settle<T>(
    outcome: Result<Result<T, EngineError>, tokio::time::error::Elapsed>,
) -> Result<T, EngineError> {
    match outcome {
        Ok(inner) => inner,
        Err(_) => Err(EngineError::Unavailable("call timed out".to_string())),
    }
}
