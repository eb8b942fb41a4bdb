//! scenesleuth - forensic image analysis with streamed hypothesis generation.
//!
//! Uploaded scene images are run through object detection and text
//! extraction, the evidence is folded into a deterministic prompt, and a
//! language model streams a hypothesis back to the caller over SSE. Results
//! are persisted as conversational history.

pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod repository;
pub mod schema;
pub mod server;
pub mod storage;
pub mod vision;
