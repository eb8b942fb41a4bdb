//! Streaming Ollama client.
//!
//! The generate endpoint is called with `stream: true`; Ollama answers with
//! newline-delimited JSON chunks, each carrying one response fragment and a
//! `done` flag on the last chunk. The decoder below turns that body into the
//! finite token stream the pipeline consumes.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::{EngineError, InferenceEngine, TokenStream};

/// Configuration for the LLM client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Whether hypothesis generation is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ollama API endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model used for hypothesis generation.
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in a response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation (0.0 - 1.0).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_enabled() -> bool {
    true
}
fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3.2:3b".to_string()
}
fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.3
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl LlmConfig {
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

/// Streaming LLM client.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

/// Ollama generate request format.
#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

/// One NDJSON chunk of a streamed generate response.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self, EngineError> {
        // No request timeout here: a generation stream legitimately stays
        // open for minutes. The pipeline bounds the wait per fragment.
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Get the config.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Check if the LLM service is reachable.
    pub async fn is_available(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let url = format!("{}/api/tags", self.config.endpoint);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn start_generation(&self, prompt: &str) -> Result<reqwest::Response, EngineError> {
        if !self.config.enabled {
            return Err(EngineError::Unavailable(
                "llm is disabled in configuration".to_string(),
            ));
        }

        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: true,
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        debug!(model = %self.config.model, "starting generation");
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Api(format!("HTTP {}: {}", status, body)));
        }

        Ok(resp)
    }
}

#[async_trait]
impl InferenceEngine for LlmClient {
    async fn stream_generate(&self, prompt: &str) -> Result<TokenStream, EngineError> {
        let resp = self.start_generation(prompt).await?;
        let decoder = ChunkDecoder::new(resp.bytes_stream());
        Ok(Box::pin(futures::stream::unfold(
            decoder,
            |mut decoder| async move { decoder.next_token().await.map(|item| (item, decoder)) },
        )))
    }
}

/// Incremental NDJSON decoder over a chunked response body.
///
/// Fragments come out in generation order; the stream ends after the chunk
/// carrying `done: true` (or when the body ends).
struct ChunkDecoder {
    body: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    buf: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

impl ChunkDecoder {
    fn new(
        body: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
    ) -> Self {
        Self {
            body: body.boxed(),
            buf: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    async fn next_token(&mut self) -> Option<Result<String, EngineError>> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(Ok(token));
            }
            if self.finished {
                return None;
            }
            match self.body.next().await {
                None => {
                    self.finished = true;
                    // A final line without a trailing newline still counts.
                    let leftover = std::mem::take(&mut self.buf);
                    if let Err(err) = self.push_line(&leftover) {
                        return Some(Err(err));
                    }
                }
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(EngineError::Unavailable(err.to_string())));
                }
                Some(Ok(chunk)) => {
                    self.buf.extend_from_slice(&chunk);
                    if let Err(err) = self.drain_complete_lines() {
                        self.finished = true;
                        return Some(Err(err));
                    }
                }
            }
        }
    }

    fn drain_complete_lines(&mut self) -> Result<(), EngineError> {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.push_line(&line)?;
            if self.finished {
                self.buf.clear();
                break;
            }
        }
        Ok(())
    }

    fn push_line(&mut self, raw: &[u8]) -> Result<(), EngineError> {
        let line = std::str::from_utf8(raw)
            .map_err(|e| EngineError::Parse(e.to_string()))?
            .trim();
        if line.is_empty() {
            return Ok(());
        }
        let chunk: GenerateChunk =
            serde_json::from_str(line).map_err(|e| EngineError::Parse(e.to_string()))?;
        if !chunk.response.is_empty() {
            self.pending.push_back(chunk.response);
        }
        if chunk.done {
            self.finished = true;
        }
        Ok(())
    }
}
