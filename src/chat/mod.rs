//! Chatting with the remote ocean assistant: the message model, the
//! streaming client, persistence, and the session tying them together.
pub mod client;
pub mod events;
pub mod models;
pub mod session;
pub mod store;

pub use client::open_chat_stream;
pub use events::{Notice, NoticeLevel, SessionEvent};
pub use models::{Conversation, Message, Role, Transcript, WireMessage};
pub use session::{ChatSession, ChatSessionBuilder, WELCOME_MESSAGE_ID};
pub use store::{BoxedChatStore, ChatStore, SqliteChatStore};
