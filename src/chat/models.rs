//! The core models for a chat with the remote ocean assistant.
use chrono::{DateTime, Utc};
use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        // Serde can only parse an enum from a string if it's double
        // quoted.
        serde_json::from_str(&format!("\"{}\"", value.as_str()?))
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_id(id: &str, role: Role, content: &str) -> Self {
        Message {
            id: id.to_string(),
            ..Self::new(role, content)
        }
    }
}

/// The subset of a `Message` sent to the remote chat endpoint.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
}

/// Messages of a conversation in chronological order. New messages
/// are only ever appended; the one exception is the in-progress
/// assistant reply which is replaced in place while streaming.
#[derive(Clone, Default, Debug)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn new_with_messages(messages: Vec<Message>) -> Self {
        Self(messages)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.0.clone()
    }

    pub fn push(&mut self, msg: Message) {
        self.0.push(msg)
    }

    pub fn last(&self) -> Option<&Message> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set the content of the assistant reply that is being streamed.
    ///
    /// If the last message belongs to the assistant it keeps its id
    /// and timestamp and only the content is replaced. Otherwise a new
    /// assistant message is appended.
    pub fn apply_assistant_delta(&mut self, content: &str) {
        match self.0.last_mut() {
            Some(last) if last.role == Role::Assistant => {
                last.content = content.to_string();
            }
            _ => self.0.push(Message::new(Role::Assistant, content)),
        }
    }

    pub fn wire_messages(&self) -> Vec<WireMessage> {
        self.0.iter().map(WireMessage::from).collect()
    }
}
