//! Diesel-based conversation repository for SQLite.
//!
//! Uses diesel-async's SyncConnectionWrapper to provide an async interface
//! while keeping Diesel's compile-time query checking.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{AsyncSqlitePool, DieselError};
use super::records::{
    ConversationRecord, ImageRecord, MessageRecord, NewConversation, NewImage, NewMessage,
};
use crate::models::{Conversation, ImageStatus, Message, MessageRole, StoredImage};
use crate::schema::{conversations, images, messages};

/// Repository for conversations, their messages, and their images.
#[derive(Clone)]
pub struct ConversationRepository {
    pool: AsyncSqlitePool,
}

impl ConversationRepository {
    /// Create a repository over an existing pool.
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Conversations
    // ========================================================================

    /// Insert a new conversation.
    pub async fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        diesel::insert_into(conversations::table)
            .values(NewConversation {
                id: &conversation.id,
                name: &conversation.name,
                description: conversation.description.as_deref(),
                created_at: conversation.created_at.to_rfc3339(),
                updated_at: conversation.updated_at.to_rfc3339(),
            })
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Get a conversation by id.
    pub async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, DieselError> {
        let mut conn = self.pool.get().await?;

        conversations::table
            .find(id)
            .first::<ConversationRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Conversation::from))
    }

    /// List all conversations, most recently updated first.
    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, DieselError> {
        let mut conn = self.pool.get().await?;

        conversations::table
            .order(conversations::updated_at.desc())
            .load::<ConversationRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Conversation::from).collect())
    }

    /// Update a conversation's name and description. Returns false when the
    /// conversation does not exist.
    pub async fn update_conversation(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;

        let updated = diesel::update(conversations::table.find(id))
            .set((
                conversations::name.eq(name),
                conversations::description.eq(description),
                conversations::updated_at.eq(chrono::Utc::now().to_rfc3339()),
            ))
            .execute(&mut conn)
            .await?;

        Ok(updated > 0)
    }

    /// Delete a conversation and its dependent rows.
    pub async fn delete_conversation(&self, id: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;

        // Dependents first: foreign_keys pragma is per-connection, so do not
        // rely on cascades here.
        diesel::delete(messages::table.filter(messages::conversation_id.eq(id)))
            .execute(&mut conn)
            .await?;
        diesel::delete(images::table.filter(images::conversation_id.eq(id)))
            .execute(&mut conn)
            .await?;
        let deleted = diesel::delete(conversations::table.find(id))
            .execute(&mut conn)
            .await?;

        Ok(deleted > 0)
    }

    /// Count all conversations.
    pub async fn count_conversations(&self) -> Result<u64, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;

        let count: i64 = conversations::table
            .select(count_star())
            .get_result(&mut conn)
            .await?;
        Ok(count as u64)
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Append a message to a conversation and bump its updated_at.
    pub async fn save_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, DieselError> {
        let message = Message::new(conversation_id.to_string(), role, content.to_string());
        let mut conn = self.pool.get().await?;

        diesel::insert_into(messages::table)
            .values(NewMessage {
                id: &message.id,
                conversation_id: &message.conversation_id,
                role: message.role.as_str(),
                content: &message.content,
                created_at: message.created_at.to_rfc3339(),
            })
            .execute(&mut conn)
            .await?;

        diesel::update(conversations::table.find(conversation_id))
            .set(conversations::updated_at.eq(message.created_at.to_rfc3339()))
            .execute(&mut conn)
            .await?;

        Ok(message)
    }

    /// List messages in a conversation, oldest first.
    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, DieselError> {
        let mut conn = self.pool.get().await?;

        messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .order(messages::created_at.asc())
            .load::<MessageRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Message::from).collect())
    }

    /// Count all messages.
    pub async fn count_messages(&self) -> Result<u64, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;

        let count: i64 = messages::table
            .select(count_star())
            .get_result(&mut conn)
            .await?;
        Ok(count as u64)
    }

    // ========================================================================
    // Images
    // ========================================================================

    /// Insert a new image row.
    pub async fn add_image(&self, image: &StoredImage) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        diesel::insert_into(images::table)
            .values(NewImage {
                id: &image.id,
                conversation_id: &image.conversation_id,
                filename: &image.filename,
                file_path: image.file_path.display().to_string(),
                content_hash: &image.content_hash,
                mime_type: &image.mime_type,
                file_size: image.file_size as i64,
                status: image.status.as_str(),
                created_at: image.created_at.to_rfc3339(),
            })
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Get an image by id.
    pub async fn get_image(&self, id: &str) -> Result<Option<StoredImage>, DieselError> {
        let mut conn = self.pool.get().await?;

        images::table
            .find(id)
            .first::<ImageRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(StoredImage::from))
    }

    /// List images in a conversation, oldest first.
    pub async fn list_images(&self, conversation_id: &str) -> Result<Vec<StoredImage>, DieselError> {
        let mut conn = self.pool.get().await?;

        images::table
            .filter(images::conversation_id.eq(conversation_id))
            .order(images::created_at.asc())
            .load::<ImageRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(StoredImage::from).collect())
    }

    /// Delete an image row.
    pub async fn delete_image(&self, id: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;

        let deleted = diesel::delete(images::table.find(id))
            .execute(&mut conn)
            .await?;

        Ok(deleted > 0)
    }

    /// Update the processing status of an image.
    pub async fn set_image_status(
        &self,
        id: &str,
        status: ImageStatus,
    ) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;

        diesel::update(images::table.find(id))
            .set(images::status.eq(status.as_str()))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    /// Count all images.
    pub async fn count_images(&self) -> Result<u64, DieselError> {
        use diesel::dsl::count_star;
        let mut conn = self.pool.get().await?;

        let count: i64 = images::table
            .select(count_star())
            .get_result(&mut conn)
            .await?;
        Ok(count as u64)
    }
}

#[async_trait::async_trait]
impl crate::pipeline::MessageStore for ConversationRepository {
    async fn save_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<String, crate::pipeline::PersistError> {
        let message = ConversationRepository::save_message(self, conversation_id, role, content)
            .await
            .map_err(|e| crate::pipeline::PersistError(e.to_string()))?;
        Ok(message.id)
    }
}
