//! Data models for scenesleuth.

mod conversation;
mod evidence;
mod image;

pub use conversation::{Conversation, Message, MessageRole};
pub use evidence::{BoundingBox, Finding, TextFragment};
pub use image::{ImageStatus, StoredImage};
