//! Public types for the chat API
use serde::{Deserialize, Serialize};

use crate::chat::Message;

#[derive(Deserialize)]
pub struct ChatRequest {
    /// Continue this conversation, or start a new one when missing
    pub conversation_id: Option<String>,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct ConversationResponse {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
}

#[derive(Serialize, Deserialize)]
pub struct NewConversationResponse {
    pub id: String,
    pub messages: Vec<Message>,
}
