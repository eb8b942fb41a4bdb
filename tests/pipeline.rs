//! End-to-end pipeline tests with in-memory collaborators.
//!
//! These exercise the orchestrator against mock engines: event ordering,
//! terminal-event guarantees, graceful degradation, cancellation, and
//! persistence behavior.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use scenesleuth::models::{
    BoundingBox, Finding, ImageStatus, MessageRole, TextFragment,
};
use scenesleuth::pipeline::{
    DetectionEngine, EngineError, ExtractionEngine, FetchError, ImageStore, InferenceEngine,
    MessageStore, PersistError, Pipeline, PipelineConfig, PipelineRequest, PipelineResult,
    StreamEvent, StreamPublisher, TokenStream,
};

fn finding(label: &str, confidence: f64) -> Finding {
    Finding {
        label: label.to_string(),
        confidence,
        bbox: BoundingBox::normalized(0.0, 0.0, 10.0, 10.0),
    }
}

/// Detector with a scripted response per image payload.
struct ScriptedDetector {
    /// Keyed by image bytes. Missing key means failure.
    responses: HashMap<Vec<u8>, Vec<Finding>>,
    /// Payloads that should hang past any timeout.
    slow: Vec<Vec<u8>>,
}

impl ScriptedDetector {
    fn with(responses: HashMap<Vec<u8>, Vec<Finding>>) -> Self {
        Self {
            responses,
            slow: Vec::new(),
        }
    }

    fn failing() -> Self {
        Self::with(HashMap::new())
    }
}

#[async_trait]
impl DetectionEngine for ScriptedDetector {
    async fn detect(&self, image: &[u8]) -> Result<Vec<Finding>, EngineError> {
        if self.slow.iter().any(|p| p == image) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.responses
            .get(image)
            .cloned()
            .ok_or_else(|| EngineError::Unavailable("detector offline".to_string()))
    }
}

struct ScriptedExtractor {
    responses: HashMap<Vec<u8>, Vec<TextFragment>>,
}

impl ScriptedExtractor {
    fn empty_for(payloads: &[&[u8]]) -> Self {
        Self {
            responses: payloads.iter().map(|p| (p.to_vec(), Vec::new())).collect(),
        }
    }

    fn failing() -> Self {
        Self {
            responses: HashMap::new(),
        }
    }
}

#[async_trait]
impl ExtractionEngine for ScriptedExtractor {
    async fn extract(&self, image: &[u8]) -> Result<Vec<TextFragment>, EngineError> {
        self.responses
            .get(image)
            .cloned()
            .ok_or_else(|| EngineError::Unavailable("ocr offline".to_string()))
    }
}

/// Inference engine that replays a scripted token sequence and records the
/// prompt it was given.
struct ScriptedInference {
    script: Vec<Result<String, String>>,
    seen_prompt: Arc<Mutex<Option<String>>>,
}

impl ScriptedInference {
    fn tokens(tokens: &[&str]) -> Self {
        Self {
            script: tokens.iter().map(|t| Ok(t.to_string())).collect(),
            seen_prompt: Arc::new(Mutex::new(None)),
        }
    }

    fn failing_after(tokens: &[&str], error: &str) -> Self {
        let mut script: Vec<Result<String, String>> =
            tokens.iter().map(|t| Ok(t.to_string())).collect();
        script.push(Err(error.to_string()));
        Self {
            script,
            seen_prompt: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl InferenceEngine for ScriptedInference {
    async fn stream_generate(&self, prompt: &str) -> Result<TokenStream, EngineError> {
        *self.seen_prompt.lock().unwrap() = Some(prompt.to_string());
        let items: Vec<Result<String, EngineError>> = self
            .script
            .iter()
            .map(|entry| match entry {
                Ok(token) => Ok(token.clone()),
                Err(msg) => Err(EngineError::Api(msg.clone())),
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Image store over a HashMap, recording status transitions.
struct MemoryImages {
    payloads: HashMap<String, Vec<u8>>,
    statuses: Mutex<HashMap<String, ImageStatus>>,
}

impl MemoryImages {
    fn with(payloads: &[(&str, &[u8])]) -> Self {
        Self {
            payloads: payloads
                .iter()
                .map(|(id, bytes)| (id.to_string(), bytes.to_vec()))
                .collect(),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    fn status_of(&self, image_id: &str) -> Option<ImageStatus> {
        self.statuses.lock().unwrap().get(image_id).copied()
    }
}

#[async_trait]
impl ImageStore for MemoryImages {
    async fn fetch(&self, image_id: &str) -> Result<Vec<u8>, FetchError> {
        self.payloads
            .get(image_id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(image_id.to_string()))
    }

    async fn set_status(&self, image_id: &str, status: ImageStatus) -> Result<(), FetchError> {
        self.statuses
            .lock()
            .unwrap()
            .insert(image_id.to_string(), status);
        Ok(())
    }
}

/// Message store over a Vec, optionally failing every write.
struct MemoryMessages {
    saved: Mutex<Vec<(String, MessageRole, String)>>,
    fail: bool,
}

impl MemoryMessages {
    fn new() -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageStore for MemoryMessages {
    async fn save_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<String, PersistError> {
        if self.fail {
            return Err(PersistError("disk full".to_string()));
        }
        let mut saved = self.saved.lock().unwrap();
        saved.push((conversation_id.to_string(), role, content.to_string()));
        Ok(format!("m-{}", saved.len()))
    }
}

fn request(image_ids: &[&str]) -> PipelineRequest {
    PipelineRequest {
        conversation_id: "conv-1".to_string(),
        image_ids: image_ids.iter().map(|s| s.to_string()).collect(),
        context: String::new(),
    }
}

fn short_timeouts() -> PipelineConfig {
    PipelineConfig {
        detection_timeout: Duration::from_millis(200),
        extraction_timeout: Duration::from_millis(200),
        token_timeout: Duration::from_secs(5),
    }
}

/// Drive one run to completion and collect every published event.
async fn run_and_collect(
    pipeline: Pipeline,
    request: PipelineRequest,
) -> (Vec<StreamEvent>, Option<PipelineResult>) {
    let (publisher, mut rx) = StreamPublisher::channel(64);
    let handle = tokio::spawn(async move { pipeline.run(request, publisher).await });

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    let result = handle.await.unwrap();
    (events, result)
}

#[tokio::test]
async fn test_tokens_stream_in_order_then_done() {
    let payload: &[u8] = b"scene";
    let mut detections = HashMap::new();
    detections.insert(payload.to_vec(), vec![finding("person", 0.97)]);

    let store = Arc::new(MemoryMessages::new());
    let pipeline = Pipeline::new(
        Arc::new(ScriptedDetector::with(detections)),
        Arc::new(ScriptedExtractor::empty_for(&[payload])),
        Arc::new(ScriptedInference::tokens(&["The", " scene"])),
        Arc::new(MemoryImages::with(&[("img-1", payload)])),
        store.clone(),
        PipelineConfig::default(),
    );

    let (events, result) = run_and_collect(pipeline, request(&["img-1"])).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Token {
                token: "The".to_string()
            },
            StreamEvent::Token {
                token: " scene".to_string()
            },
            StreamEvent::Done {
                message_id: "m-1".to_string(),
                content: "The scene".to_string()
            },
        ]
    );

    let result = result.unwrap();
    assert_eq!(result.content, "The scene");
    assert_eq!(result.message_id, "m-1");
    assert_eq!(store.count(), 1);
}

#[tokio::test]
async fn test_exactly_one_terminal_event_and_nothing_after() {
    let payload: &[u8] = b"scene";
    let mut detections = HashMap::new();
    detections.insert(payload.to_vec(), Vec::new());

    let pipeline = Pipeline::new(
        Arc::new(ScriptedDetector::with(detections)),
        Arc::new(ScriptedExtractor::empty_for(&[payload])),
        Arc::new(ScriptedInference::tokens(&["a", "b", "c"])),
        Arc::new(MemoryImages::with(&[("img-1", payload)])),
        Arc::new(MemoryMessages::new()),
        PipelineConfig::default(),
    );

    let (events, _) = run_and_collect(pipeline, request(&["img-1"])).await;

    let terminal_count = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminal_count, 1);
    assert!(events.last().unwrap().is_terminal());
}

#[tokio::test]
async fn test_all_adapters_failing_still_streams() {
    let payload: &[u8] = b"scene";
    let inference = Arc::new(ScriptedInference::tokens(&["Insufficient", " evidence."]));
    let seen_prompt = inference.seen_prompt.clone();
    let images = Arc::new(MemoryImages::with(&[("img-1", payload)]));

    let pipeline = Pipeline::new(
        Arc::new(ScriptedDetector::failing()),
        Arc::new(ScriptedExtractor::failing()),
        inference,
        images.clone(),
        Arc::new(MemoryMessages::new()),
        short_timeouts(),
    );

    let (events, result) = run_and_collect(pipeline, request(&["img-1"])).await;

    assert!(result.is_some());
    assert!(matches!(events.last().unwrap(), StreamEvent::Done { .. }));

    // Both evidence lines rendered with their empty markers.
    let prompt = seen_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("Objects at scene: none detected"));
    assert!(prompt.contains("Text found: none detected"));

    // Both calls failed for this image.
    assert_eq!(images.status_of("img-1"), Some(ImageStatus::Failed));
}

#[tokio::test]
async fn test_one_timed_out_image_degrades_not_fails() {
    let slow: &[u8] = b"slow";
    let fast: &[u8] = b"fast";
    let mut detections = HashMap::new();
    detections.insert(fast.to_vec(), vec![finding("knife", 0.91)]);
    let mut detector = ScriptedDetector::with(detections);
    detector.slow.push(slow.to_vec());

    let inference = Arc::new(ScriptedInference::tokens(&["ok"]));
    let seen_prompt = inference.seen_prompt.clone();
    let images = Arc::new(MemoryImages::with(&[("img-1", slow), ("img-2", fast)]));

    let pipeline = Pipeline::new(
        Arc::new(detector),
        Arc::new(ScriptedExtractor::empty_for(&[slow, fast])),
        inference,
        images.clone(),
        Arc::new(MemoryMessages::new()),
        short_timeouts(),
    );

    let (events, result) = run_and_collect(pipeline, request(&["img-1", "img-2"])).await;

    assert!(result.is_some());
    assert!(matches!(events.last().unwrap(), StreamEvent::Done { .. }));

    let prompt = seen_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("[HIGH] knife"));

    // Extraction succeeded for the slow image, so it is not marked failed.
    assert_eq!(images.status_of("img-1"), Some(ImageStatus::Completed));
    assert_eq!(images.status_of("img-2"), Some(ImageStatus::Completed));
}

#[tokio::test]
async fn test_mid_stream_inference_failure_persists_nothing() {
    let payload: &[u8] = b"scene";
    let mut detections = HashMap::new();
    detections.insert(payload.to_vec(), Vec::new());

    let store = Arc::new(MemoryMessages::new());
    let pipeline = Pipeline::new(
        Arc::new(ScriptedDetector::with(detections)),
        Arc::new(ScriptedExtractor::empty_for(&[payload])),
        Arc::new(ScriptedInference::failing_after(
            &["The"],
            "model crashed",
        )),
        Arc::new(MemoryImages::with(&[("img-1", payload)])),
        store.clone(),
        PipelineConfig::default(),
    );

    let (events, result) = run_and_collect(pipeline, request(&["img-1"])).await;

    assert!(result.is_none());
    assert_eq!(store.count(), 0);
    assert!(!events.iter().any(|e| matches!(e, StreamEvent::Done { .. })));
    match events.last().unwrap() {
        StreamEvent::Error { kind, .. } => assert_eq!(*kind, "inference_unavailable"),
        other => panic!("expected error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_cancels_run_without_persisting() {
    let payload: &[u8] = b"scene";
    let mut detections = HashMap::new();
    detections.insert(payload.to_vec(), Vec::new());

    let store = Arc::new(MemoryMessages::new());
    let pipeline = Pipeline::new(
        Arc::new(ScriptedDetector::with(detections)),
        Arc::new(ScriptedExtractor::empty_for(&[payload])),
        Arc::new(ScriptedInference::tokens(&["a", "b", "c", "d", "e"])),
        Arc::new(MemoryImages::with(&[("img-1", payload)])),
        store.clone(),
        PipelineConfig::default(),
    );

    // Capacity one so the orchestrator blocks on the second token; dropping
    // the receiver then fails the pending send.
    let (publisher, mut rx) = StreamPublisher::channel(1);
    let handle = tokio::spawn(async move { pipeline.run(request(&["img-1"]), publisher).await });

    let first = rx.recv().await.unwrap();
    assert!(matches!(first, StreamEvent::Token { .. }));
    drop(rx);

    let result = handle.await.unwrap();
    assert!(result.is_none());
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn test_disconnect_during_analysis_stops_promptly() {
    let payload: &[u8] = b"scene";
    let mut detector = ScriptedDetector::failing();
    detector.slow.push(payload.to_vec());

    let store = Arc::new(MemoryMessages::new());
    let pipeline = Pipeline::new(
        Arc::new(detector),
        Arc::new(ScriptedExtractor::empty_for(&[payload])),
        Arc::new(ScriptedInference::tokens(&["never"])),
        Arc::new(MemoryImages::with(&[("img-1", payload)])),
        store.clone(),
        // Generous budgets: the run must end because the client left, not
        // because the detector timed out.
        PipelineConfig {
            detection_timeout: Duration::from_secs(3600),
            extraction_timeout: Duration::from_secs(3600),
            token_timeout: Duration::from_secs(3600),
        },
    );

    let (publisher, rx) = StreamPublisher::channel(8);
    let handle = tokio::spawn(async move { pipeline.run(request(&["img-1"]), publisher).await });
    drop(rx);

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run should end well before the detection budget")
        .unwrap();
    assert!(result.is_none());
    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn test_empty_image_list_is_validation_error() {
    let pipeline = Pipeline::new(
        Arc::new(ScriptedDetector::failing()),
        Arc::new(ScriptedExtractor::failing()),
        Arc::new(ScriptedInference::tokens(&[])),
        Arc::new(MemoryImages::with(&[])),
        Arc::new(MemoryMessages::new()),
        PipelineConfig::default(),
    );

    let (events, result) = run_and_collect(pipeline, request(&[])).await;

    assert!(result.is_none());
    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Error { kind, .. } => assert_eq!(*kind, "validation_error"),
        other => panic!("expected error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_duplicate_image_ids_are_rejected() {
    let payload: &[u8] = b"scene";
    let pipeline = Pipeline::new(
        Arc::new(ScriptedDetector::failing()),
        Arc::new(ScriptedExtractor::failing()),
        Arc::new(ScriptedInference::tokens(&[])),
        Arc::new(MemoryImages::with(&[("img-1", payload)])),
        Arc::new(MemoryMessages::new()),
        PipelineConfig::default(),
    );

    let (events, result) = run_and_collect(pipeline, request(&["img-1", "img-1"])).await;

    assert!(result.is_none());
    match events.last().unwrap() {
        StreamEvent::Error { kind, .. } => assert_eq!(*kind, "validation_error"),
        other => panic!("expected error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_image_id_is_not_found() {
    let pipeline = Pipeline::new(
        Arc::new(ScriptedDetector::failing()),
        Arc::new(ScriptedExtractor::failing()),
        Arc::new(ScriptedInference::tokens(&[])),
        Arc::new(MemoryImages::with(&[])),
        Arc::new(MemoryMessages::new()),
        PipelineConfig::default(),
    );

    let (events, result) = run_and_collect(pipeline, request(&["ghost"])).await;

    assert!(result.is_none());
    match events.last().unwrap() {
        StreamEvent::Error { kind, .. } => assert_eq!(*kind, "resource_not_found"),
        other => panic!("expected error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_persistence_failure_after_stream() {
    let payload: &[u8] = b"scene";
    let mut detections = HashMap::new();
    detections.insert(payload.to_vec(), Vec::new());

    let pipeline = Pipeline::new(
        Arc::new(ScriptedDetector::with(detections)),
        Arc::new(ScriptedExtractor::empty_for(&[payload])),
        Arc::new(ScriptedInference::tokens(&["The", " end"])),
        Arc::new(MemoryImages::with(&[("img-1", payload)])),
        Arc::new(MemoryMessages::failing()),
        PipelineConfig::default(),
    );

    let (events, result) = run_and_collect(pipeline, request(&["img-1"])).await;

    assert!(result.is_none());
    // The tokens streamed fine; only the finalize step failed.
    assert_eq!(
        events.iter().filter(|e| !e.is_terminal()).count(),
        2
    );
    match events.last().unwrap() {
        StreamEvent::Error { kind, .. } => assert_eq!(*kind, "persistence_failure"),
        other => panic!("expected error frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_token_is_fatal() {
    let payload: &[u8] = b"scene";
    let mut detections = HashMap::new();
    detections.insert(payload.to_vec(), Vec::new());

    // Inference whose stream never yields.
    struct StalledInference;

    #[async_trait]
    impl InferenceEngine for StalledInference {
        async fn stream_generate(&self, _prompt: &str) -> Result<TokenStream, EngineError> {
            Ok(Box::pin(futures::stream::unfold((), |_| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Some((Ok(String::new()), ()))
            })))
        }
    }

    let pipeline = Pipeline::new(
        Arc::new(ScriptedDetector::with(detections)),
        Arc::new(ScriptedExtractor::empty_for(&[payload])),
        Arc::new(StalledInference),
        Arc::new(MemoryImages::with(&[("img-1", payload)])),
        Arc::new(MemoryMessages::new()),
        PipelineConfig {
            token_timeout: Duration::from_millis(100),
            ..short_timeouts()
        },
    );

    let (events, result) = run_and_collect(pipeline, request(&["img-1"])).await;

    assert!(result.is_none());
    match events.last().unwrap() {
        StreamEvent::Error { kind, .. } => assert_eq!(*kind, "inference_unavailable"),
        other => panic!("expected error frame, got {other:?}"),
    }
}
