//! Events emitted by a chat session for whoever renders it.
use serde::{Deserialize, Serialize};

use super::models::Message;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "error")]
    Error,
}

/// A short user facing notification, e.g. a toast.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: &str) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.to_string(),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.to_string(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The conversation the session is now attached to
    Conversation { id: String },
    /// All messages of the session so far
    Messages { messages: Vec<Message> },
    /// Whether a reply is currently being streamed
    Loading { active: bool },
    Notice { notice: Notice },
}
