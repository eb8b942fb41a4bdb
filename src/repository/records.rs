//! Diesel ORM records for database tables.
//!
//! These mirror `crate::schema` and convert to/from the domain models in
//! `crate::models`. Timestamps are stored as RFC3339 text.

use diesel::prelude::*;
use std::path::PathBuf;

use super::parse_datetime;
use crate::models::{Conversation, ImageStatus, Message, MessageRole, StoredImage};
use crate::schema;

/// Conversation record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::conversations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ConversationRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ConversationRecord> for Conversation {
    fn from(record: ConversationRecord) -> Self {
        Conversation {
            id: record.id,
            name: record.name,
            description: record.description,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// New conversation for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::conversations)]
pub struct NewConversation<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub created_at: String,
    pub updated_at: String,
}

/// Message record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Message {
            id: record.id,
            conversation_id: record.conversation_id,
            role: MessageRole::from_str(&record.role).unwrap_or(MessageRole::Assistant),
            content: record.content,
            created_at: parse_datetime(&record.created_at),
        }
    }
}

/// New message for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::messages)]
pub struct NewMessage<'a> {
    pub id: &'a str,
    pub conversation_id: &'a str,
    pub role: &'a str,
    pub content: &'a str,
    pub created_at: String,
}

/// Image record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::images)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ImageRecord {
    pub id: String,
    pub conversation_id: String,
    pub filename: String,
    pub file_path: String,
    pub content_hash: String,
    pub mime_type: String,
    pub file_size: i64,
    pub status: String,
    pub created_at: String,
}

impl From<ImageRecord> for StoredImage {
    fn from(record: ImageRecord) -> Self {
        StoredImage {
            id: record.id,
            conversation_id: record.conversation_id,
            filename: record.filename,
            file_path: PathBuf::from(record.file_path),
            content_hash: record.content_hash,
            mime_type: record.mime_type,
            file_size: record.file_size.max(0) as u64,
            status: ImageStatus::from_str(&record.status).unwrap_or(ImageStatus::Pending),
            created_at: parse_datetime(&record.created_at),
        }
    }
}

/// New image for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::images)]
pub struct NewImage<'a> {
    pub id: &'a str,
    pub conversation_id: &'a str,
    pub filename: &'a str,
    pub file_path: String,
    pub content_hash: &'a str,
    pub mime_type: &'a str,
    pub file_size: i64,
    pub status: &'a str,
    pub created_at: String,
}
