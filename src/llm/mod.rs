//! LLM client for hypothesis generation.
//!
//! Talks to an Ollama-compatible API and exposes generation as a pull-based
//! stream of text fragments.

mod client;

pub use client::{LlmClient, LlmConfig};
