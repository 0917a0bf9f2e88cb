use std::collections::HashSet;

use tokio_rusqlite::Connection;

use crate::chat::{BoxedChatStore, SqliteChatStore};
use crate::core::AppConfig;

pub struct AppState {
    pub db: Connection,
    pub config: AppConfig,
    // Conversations with a reply currently streaming
    active_conversations: HashSet<String>,
}

impl AppState {
    pub fn new(db: Connection, config: AppConfig) -> Self {
        Self {
            db,
            config,
            active_conversations: HashSet::new(),
        }
    }

    pub fn chat_store(&self) -> BoxedChatStore {
        std::sync::Arc::new(SqliteChatStore::new(&self.db))
    }

    /// Mark `conversation_id` as streaming. Returns false if it
    /// already is.
    pub fn begin_reply(&mut self, conversation_id: &str) -> bool {
        self.active_conversations.insert(conversation_id.to_string())
    }

    pub fn end_reply(&mut self, conversation_id: &str) {
        self.active_conversations.remove(conversation_id);
    }

    pub fn is_replying(&self, conversation_id: &str) -> bool {
        self.active_conversations.contains(conversation_id)
    }
}
