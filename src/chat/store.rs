//! Persistence of conversations and their messages.
use anyhow::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::{Connection, params};
use uuid::Uuid;

use super::models::{Conversation, Message, Role};

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Create a new conversation and return its ID
    async fn create_conversation(&self, title: &str) -> Result<String, Error>;

    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), Error>;

    /// All messages of a conversation, oldest first
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, Error>;

    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>, Error>;
}

pub type BoxedChatStore = std::sync::Arc<dyn ChatStore>;

#[derive(Clone)]
pub struct SqliteChatStore {
    db: Connection,
}

impl SqliteChatStore {
    pub fn new(db: &Connection) -> Self {
        Self { db: db.clone() }
    }
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn create_conversation(&self, title: &str) -> Result<String, Error> {
        let id = Uuid::new_v4().to_string();
        let conversation_id = id.clone();
        let title = title.to_owned();
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO conversation (id, title, created_at) VALUES (?, ?, ?)",
                    params![conversation_id, title, created_at],
                )?;
                Ok(())
            })
            .await?;

        Ok(id)
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), Error> {
        let msg = Message::new(role, content);
        let c_id = conversation_id.to_owned();
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "INSERT INTO message (id, conversation_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
                )?;
                stmt.execute(params![
                    msg.id,
                    c_id,
                    msg.role,
                    msg.content,
                    msg.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
                ])?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, Error> {
        let c_id = conversation_id.to_owned();
        let messages = self
            .db
            .call(move |conn| {
                // rowid keeps insertion order for messages created
                // within the same instant
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, role, content, created_at
                    FROM message
                    WHERE conversation_id = ?
                    ORDER BY created_at ASC, rowid ASC
                    "#,
                )?;
                let rows = stmt
                    .query_map([c_id], |row| {
                        Ok(Message {
                            id: row.get(0)?,
                            role: row.get(1)?,
                            content: row.get(2)?,
                            timestamp: parse_timestamp(3, row.get(3)?)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<Message>>>()?;
                Ok(rows)
            })
            .await?;

        Ok(messages)
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>, Error> {
        let c_id = conversation_id.to_owned();
        let conversation = self
            .db
            .call(move |conn| {
                let result = conn
                    .query_row(
                        "SELECT id, title FROM conversation WHERE id = ?",
                        [c_id],
                        |row| {
                            Ok(Conversation {
                                id: row.get(0)?,
                                title: row.get(1)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(result)
            })
            .await?;

        Ok(conversation)
    }
}
