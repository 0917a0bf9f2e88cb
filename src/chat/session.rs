use anyhow::{Error, Result, anyhow};
use tokio::sync::mpsc;

use super::client::open_chat_stream;
use super::events::{Notice, SessionEvent};
use super::models::{Message, Role, Transcript};
use super::store::BoxedChatStore;
use crate::core::AppConfig;
use crate::stream::reconcile;

pub const WELCOME_MESSAGE_ID: &str = "welcome";

/// A stateful chat with the remote ocean assistant.
///
/// Owns the transcript and the conversation it is persisted to. Every
/// change is published as a `SessionEvent` so a UI can render it.
/// Methods that stream take `&mut self` which makes it impossible to
/// start a second reply while one is in flight.
///
/// Persistence is best effort: when the store fails the error is
/// logged, an error notice is emitted, and the chat carries on in
/// memory.
///
/// Use `ChatSession::builder()` to construct a `ChatSession`.
pub struct ChatSession {
    chat_url: String,
    api_key: String,
    store: Option<BoxedChatStore>,
    conversation_title: String,
    welcome_message: String,
    transcript: Transcript,
    conversation_id: Option<String>,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChatSession {
    pub fn builder(chat_url: &str, api_key: &str) -> ChatSessionBuilder {
        ChatSessionBuilder::new(chat_url, api_key)
    }

    pub fn from_config(config: &AppConfig) -> ChatSessionBuilder {
        ChatSessionBuilder::new(&config.chat_url(), &config.chat_api_key)
            .conversation_title(&config.conversation_title)
            .welcome_message(&config.welcome_message)
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.transcript.messages()
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine
        let _ = self.tx.send(event);
    }

    fn emit_messages(&self) {
        self.emit(SessionEvent::Messages {
            messages: self.transcript.messages(),
        });
    }

    fn notify(&self, notice: Notice) {
        self.emit(SessionEvent::Notice { notice });
    }

    /// Returns the current conversation, creating it on first use.
    async fn ensure_conversation(&mut self) -> Option<String> {
        if let Some(id) = &self.conversation_id {
            return Some(id.clone());
        }
        let store = self.store.as_ref()?;

        match store.create_conversation(&self.conversation_title).await {
            Ok(id) => {
                tracing::debug!("Created conversation {}", id);
                self.conversation_id = Some(id.clone());
                self.emit(SessionEvent::Conversation { id: id.clone() });
                Some(id)
            }
            Err(e) => {
                tracing::error!("Error creating conversation: {}", e);
                self.notify(Notice::error("Failed to create conversation"));
                None
            }
        }
    }

    async fn save_message(&self, conversation_id: &str, role: Role, content: &str) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.append_message(conversation_id, role, content).await {
            tracing::error!("Error saving message: {}", e);
            self.notify(Notice::error("Failed to save message"));
        }
    }

    /// Send a user message and stream the assistant's reply.
    ///
    /// Blank input is ignored and returns `Ok(None)`. Otherwise returns
    /// the full reply, which may be empty if the assistant sent no
    /// content. Failing to reach the chat endpoint is returned as an
    /// error after emitting an error notice.
    pub async fn send(&mut self, input: &str) -> Result<Option<String>, Error> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }

        let conversation_id = self.ensure_conversation().await;

        let user_msg = Message::new(Role::User, input);
        self.transcript.push(user_msg.clone());
        self.emit_messages();
        self.emit(SessionEvent::Loading { active: true });

        let result = self.stream_reply(conversation_id.as_deref(), &user_msg).await;

        self.emit(SessionEvent::Loading { active: false });

        match result {
            Ok(content) => Ok(Some(content)),
            Err(e) => {
                tracing::error!("Chat error: {:?}", e);
                self.notify(Notice::error("Failed to send message. Please try again."));
                Err(e)
            }
        }
    }

    async fn stream_reply(
        &mut self,
        conversation_id: Option<&str>,
        user_msg: &Message,
    ) -> Result<String, Error> {
        if let Some(id) = conversation_id {
            self.save_message(id, Role::User, &user_msg.content).await;
        }

        let response =
            open_chat_stream(&self.chat_url, &self.api_key, &self.transcript.wire_messages())
                .await?;
        let outcome = reconcile(response.bytes_stream(), &mut self.transcript, &self.tx).await?;

        tracing::debug!(
            "Assistant reply finished ({:?}) with {} bytes",
            outcome.end,
            outcome.content.len()
        );

        if let Some(id) = conversation_id
            && !outcome.content.is_empty()
        {
            self.save_message(id, Role::Assistant, &outcome.content).await;
        }

        Ok(outcome.content)
    }

    /// Start over in a new conversation that opens with the welcome
    /// message.
    ///
    /// The welcome message is saved as the conversation's first
    /// message. Without a store the session is reset in memory only and `None`
    /// is returned. If the conversation can't be created the current
    /// state is kept.
    pub async fn new_chat(&mut self) -> Result<Option<String>, Error> {
        let conversation_id = match &self.store {
            Some(store) => match store.create_conversation(&self.conversation_title).await {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::error!("Error creating conversation: {}", e);
                    self.notify(Notice::error("Failed to create conversation"));
                    return Err(e);
                }
            },
            None => None,
        };

        self.conversation_id = conversation_id.clone();
        self.transcript = Transcript::new_with_messages(vec![Message::with_id(
            WELCOME_MESSAGE_ID,
            Role::Assistant,
            &self.welcome_message,
        )]);

        if let Some(id) = &conversation_id {
            self.emit(SessionEvent::Conversation { id: id.clone() });
            // The welcome is part of the persisted history
            if !self.welcome_message.is_empty() {
                self.save_message(id, Role::Assistant, &self.welcome_message)
                    .await;
            }
        }
        self.emit_messages();
        self.notify(Notice::success("New chat started!"));

        Ok(conversation_id)
    }

    /// Replace the transcript with the persisted history of
    /// `conversation_id` and continue that conversation.
    pub async fn load(&mut self, conversation_id: &str) -> Result<(), Error> {
        let store = self
            .store
            .as_ref()
            .ok_or(anyhow!("Can't load conversation {} without a store", conversation_id))?;

        let messages = match store.list_messages(conversation_id).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("Error loading messages: {}", e);
                self.notify(Notice::error("Failed to load messages"));
                return Err(e);
            }
        };

        self.conversation_id = Some(conversation_id.to_string());
        self.transcript = Transcript::new_with_messages(messages);
        self.emit(SessionEvent::Conversation {
            id: conversation_id.to_string(),
        });
        self.emit_messages();

        Ok(())
    }
}

pub struct ChatSessionBuilder {
    chat_url: String,
    api_key: String,
    store: Option<BoxedChatStore>,
    conversation_title: String,
    welcome_message: String,
    transcript: Transcript,
    conversation_id: Option<String>,
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl ChatSessionBuilder {
    pub fn new(chat_url: &str, api_key: &str) -> Self {
        Self {
            chat_url: chat_url.to_string(),
            api_key: api_key.to_string(),
            store: None,
            conversation_title: "Ocean Data Chat".to_string(),
            welcome_message: String::new(),
            transcript: Transcript::new(),
            conversation_id: None,
            tx: None,
        }
    }

    pub fn build(self) -> ChatSession {
        // Events go nowhere unless someone asked for them
        let tx = self.tx.unwrap_or_else(|| mpsc::unbounded_channel().0);

        ChatSession {
            chat_url: self.chat_url,
            api_key: self.api_key,
            store: self.store,
            conversation_title: self.conversation_title,
            welcome_message: self.welcome_message,
            transcript: self.transcript,
            conversation_id: self.conversation_id,
            tx,
        }
    }

    pub fn store(mut self, store: BoxedChatStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Continue an existing conversation instead of creating one on
    /// the first message.
    pub fn conversation(mut self, conversation_id: &str) -> Self {
        self.conversation_id = Some(conversation_id.to_string());
        self
    }

    pub fn transcript(mut self, messages: Vec<Message>) -> Self {
        self.transcript = Transcript::new_with_messages(messages);
        self
    }

    pub fn conversation_title(mut self, title: &str) -> Self {
        self.conversation_title = title.to_string();
        self
    }

    pub fn welcome_message(mut self, message: &str) -> Self {
        self.welcome_message = message.to_string();
        self
    }

    pub fn events(mut self, transmitter: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.tx = Some(transmitter);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use mockito::Matcher;
    use serde_json::json;
    use tokio_rusqlite::Connection;

    use super::*;
    use crate::chat::store::{ChatStore, SqliteChatStore};
    use crate::chat::{Conversation, NoticeLevel};
    use crate::core::db::initialize_db;

    const CHAT_PATH: &str = "/functions/v1/ocean-chat";

    fn sse_body(parts: &[&str]) -> String {
        let mut body = String::new();
        for part in parts {
            body.push_str(&format!(
                "data: {}\n\n",
                json!({"choices": [{"delta": {"content": part}}]})
            ));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    async fn sqlite_store() -> (Arc<SqliteChatStore>, Connection) {
        let db = Connection::open_in_memory().await.unwrap();
        db.call(|conn| {
            initialize_db(conn)?;
            Ok(())
        })
        .await
        .unwrap();
        (Arc::new(SqliteChatStore::new(&db)), db)
    }

    struct FailingStore;

    #[async_trait]
    impl ChatStore for FailingStore {
        async fn create_conversation(&self, _title: &str) -> anyhow::Result<String> {
            Err(anyhow!("database is unavailable"))
        }
        async fn append_message(
            &self,
            _conversation_id: &str,
            _role: Role,
            _content: &str,
        ) -> anyhow::Result<()> {
            Err(anyhow!("database is unavailable"))
        }
        async fn list_messages(&self, _conversation_id: &str) -> anyhow::Result<Vec<Message>> {
            Err(anyhow!("database is unavailable"))
        }
        async fn get_conversation(
            &self,
            _conversation_id: &str,
        ) -> anyhow::Result<Option<Conversation>> {
            Err(anyhow!("database is unavailable"))
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn notices(events: &[SessionEvent]) -> Vec<Notice> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Notice { notice } => Some(notice.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_builder_defaults() {
        let session = ChatSession::builder("http://localhost/chat", "test-key").build();
        assert_eq!(session.chat_url, "http://localhost/chat");
        assert_eq!(session.api_key, "test-key");
        assert!(session.store.is_none());
        assert!(session.conversation_id().is_none());
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_builder_from_config() {
        let config = AppConfig {
            storage_path: "./".to_string(),
            db_path: "./db".to_string(),
            chat_api_hostname: "http://localhost:54321".to_string(),
            chat_api_path: CHAT_PATH.to_string(),
            chat_api_key: "anon-key".to_string(),
            conversation_title: "Float chat".to_string(),
            welcome_message: "Ahoy".to_string(),
        };
        let session = ChatSession::from_config(&config).conversation("c1").build();
        assert_eq!(session.chat_url, "http://localhost:54321/functions/v1/ocean-chat");
        assert_eq!(session.api_key, "anon-key");
        assert_eq!(session.conversation_title, "Float chat");
        assert_eq!(session.welcome_message, "Ahoy");
        assert_eq!(session.conversation_id(), Some("c1"));
    }

    #[tokio::test]
    async fn test_send_streams_and_persists_reply() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", CHAT_PATH)
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_body(&["Hel", "lo"]))
            .create_async()
            .await;

        let (store, _db) = sqlite_store().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = ChatSession::builder(&format!("{}{}", server.url(), CHAT_PATH), "test-key")
            .store(store.clone())
            .events(tx)
            .build();

        let reply = session.send("  Say hello  ").await.unwrap();

        mock.assert_async().await;
        assert_eq!(reply, Some("Hello".to_string()));

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "Say hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hello");

        // Both messages were saved to the lazily created conversation
        let conversation_id = session.conversation_id().unwrap().to_string();
        let saved = store.list_messages(&conversation_id).await.unwrap();
        let saved: Vec<(Role, &str)> = saved.iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(saved, vec![(Role::User, "Say hello"), (Role::Assistant, "Hello")]);

        let events = drain(&mut rx);
        assert_eq!(
            events[0],
            SessionEvent::Conversation {
                id: conversation_id.clone()
            }
        );
        assert_eq!(events[2], SessionEvent::Loading { active: true });
        assert_eq!(events.last(), Some(&SessionEvent::Loading { active: false }));
        let deltas: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Messages { messages } => Some(messages.len()),
                _ => None,
            })
            .collect();
        // The user message followed by one update per delta
        assert_eq!(deltas, vec![1, 2, 2]);
        assert!(notices(&events).is_empty());
    }

    #[tokio::test]
    async fn test_send_includes_full_history() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", CHAT_PATH)
            .match_body(Matcher::Json(json!({
                "messages": [{"role": "user", "content": "Hi"}]
            })))
            .with_status(200)
            .with_body(sse_body(&["Hello!"]))
            .create_async()
            .await;
        let second = server
            .mock("POST", CHAT_PATH)
            .match_body(Matcher::Json(json!({
                "messages": [
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello!"},
                    {"role": "user", "content": "Floats near Japan?"}
                ]
            })))
            .with_status(200)
            .with_body(sse_body(&["Three are active."]))
            .create_async()
            .await;

        let mut session =
            ChatSession::builder(&format!("{}{}", server.url(), CHAT_PATH), "test-key").build();

        session.send("Hi").await.unwrap();
        let reply = session.send("Floats near Japan?").await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(reply, Some("Three are active.".to_string()));
        assert_eq!(session.messages().len(), 4);
        // Without a store there is never a conversation
        assert!(session.conversation_id().is_none());
    }

    #[tokio::test]
    async fn test_send_ignores_blank_input() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", CHAT_PATH).expect(0).create_async().await;

        let (store, _db) = sqlite_store().await;
        let mut session = ChatSession::builder(&format!("{}{}", server.url(), CHAT_PATH), "test-key")
            .store(store)
            .build();

        assert_eq!(session.send("   ").await.unwrap(), None);

        mock.assert_async().await;
        assert!(session.messages().is_empty());
        assert!(session.conversation_id().is_none());
    }

    #[tokio::test]
    async fn test_send_reports_transport_failure() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", CHAT_PATH)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let (store, _db) = sqlite_store().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = ChatSession::builder(&format!("{}{}", server.url(), CHAT_PATH), "test-key")
            .store(store.clone())
            .events(tx)
            .build();

        let result = session.send("Hello?").await;

        mock.assert_async().await;
        assert!(result.is_err());

        // The user's message stays and is the only one saved
        assert_eq!(session.messages().len(), 1);
        let saved = store
            .list_messages(session.conversation_id().unwrap())
            .await
            .unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].role, Role::User);

        let events = drain(&mut rx);
        assert_eq!(
            notices(&events),
            vec![Notice::error("Failed to send message. Please try again.")]
        );
        assert!(events.contains(&SessionEvent::Loading { active: false }));
    }

    #[tokio::test]
    async fn test_send_continues_when_persistence_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", CHAT_PATH)
            .with_status(200)
            .with_body(sse_body(&["Still ", "here"]))
            .create_async()
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = ChatSession::builder(&format!("{}{}", server.url(), CHAT_PATH), "test-key")
            .store(Arc::new(FailingStore))
            .events(tx)
            .build();

        let reply = session.send("Anyone there?").await.unwrap();

        assert_eq!(reply, Some("Still here".to_string()));
        assert_eq!(session.messages().len(), 2);
        assert!(session.conversation_id().is_none());

        let notices = notices(&drain(&mut rx));
        assert_eq!(notices, vec![Notice::error("Failed to create conversation")]);
    }

    #[tokio::test]
    async fn test_send_reports_failed_message_save() {
        struct NoAppendStore;

        #[async_trait]
        impl ChatStore for NoAppendStore {
            async fn create_conversation(&self, _title: &str) -> anyhow::Result<String> {
                Ok("c1".to_string())
            }
            async fn append_message(
                &self,
                _conversation_id: &str,
                _role: Role,
                _content: &str,
            ) -> anyhow::Result<()> {
                Err(anyhow!("disk full"))
            }
            async fn list_messages(&self, _conversation_id: &str) -> anyhow::Result<Vec<Message>> {
                Ok(vec![])
            }
            async fn get_conversation(
                &self,
                _conversation_id: &str,
            ) -> anyhow::Result<Option<Conversation>> {
                Ok(None)
            }
        }

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", CHAT_PATH)
            .with_status(200)
            .with_body(sse_body(&["ok"]))
            .create_async()
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = ChatSession::builder(&format!("{}{}", server.url(), CHAT_PATH), "test-key")
            .store(Arc::new(NoAppendStore))
            .events(tx)
            .build();

        let reply = session.send("Hi").await.unwrap();

        assert_eq!(reply, Some("ok".to_string()));
        let notices = notices(&drain(&mut rx));
        // One for the user message and one for the reply
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.level == NoticeLevel::Error));
    }

    #[tokio::test]
    async fn test_send_does_not_persist_empty_reply() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", CHAT_PATH)
            .with_status(200)
            .with_body(": keep-alive\n\ndata: [DONE]\n\n")
            .create_async()
            .await;

        let (store, _db) = sqlite_store().await;
        let mut session = ChatSession::builder(&format!("{}{}", server.url(), CHAT_PATH), "test-key")
            .store(store.clone())
            .build();

        let reply = session.send("Hi").await.unwrap();

        assert_eq!(reply, Some(String::new()));
        assert_eq!(session.messages().len(), 1);
        let saved = store
            .list_messages(session.conversation_id().unwrap())
            .await
            .unwrap();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn test_new_chat_resets_to_welcome_message() {
        let (store, _db) = sqlite_store().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = ChatSession::builder("http://localhost/chat", "test-key")
            .store(store.clone())
            .welcome_message("Hello! I'm FloatMind AI.")
            .transcript(vec![Message::new(Role::User, "old")])
            .conversation("old-conversation")
            .events(tx)
            .build();

        let id = session.new_chat().await.unwrap().unwrap();

        assert_ne!(id, "old-conversation");
        assert_eq!(session.conversation_id(), Some(id.as_str()));
        let messages = session.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, WELCOME_MESSAGE_ID);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].content, "Hello! I'm FloatMind AI.");
        assert!(store.get_conversation(&id).await.unwrap().is_some());
        let saved = store.list_messages(&id).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].role, Role::Assistant);
        assert_eq!(saved[0].content, "Hello! I'm FloatMind AI.");

        let notices = notices(&drain(&mut rx));
        assert_eq!(notices, vec![Notice::success("New chat started!")]);
    }

    #[tokio::test]
    async fn test_new_chat_keeps_state_when_store_fails() {
        let mut session = ChatSession::builder("http://localhost/chat", "test-key")
            .store(Arc::new(FailingStore))
            .transcript(vec![Message::new(Role::User, "old")])
            .build();

        assert!(session.new_chat().await.is_err());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, "old");
    }

    #[tokio::test]
    async fn test_load_restores_history() {
        let (store, _db) = sqlite_store().await;
        let id = store.create_conversation("Ocean Data Chat").await.unwrap();
        store.append_message(&id, Role::User, "q1").await.unwrap();
        store.append_message(&id, Role::Assistant, "a1").await.unwrap();

        let mut session = ChatSession::builder("http://localhost/chat", "test-key")
            .store(store)
            .build();
        session.load(&id).await.unwrap();

        assert_eq!(session.conversation_id(), Some(id.as_str()));
        let contents: Vec<String> = session.messages().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["q1", "a1"]);
    }

    #[tokio::test]
    async fn test_load_without_store_fails() {
        let mut session = ChatSession::builder("http://localhost/chat", "test-key").build();
        assert!(session.load("c1").await.is_err());
    }
}
