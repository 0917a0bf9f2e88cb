//! Router for the chat API

use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, sse::Event, sse::KeepAlive, sse::Sse},
    routing::{get, post},
};
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::chat::{ChatSession, Notice, SessionEvent};

type SharedState = Arc<RwLock<AppState>>;

/// Releases a conversation for new replies when dropped, including
/// when the streaming task panics.
struct ActiveReply {
    state: SharedState,
    conversation_id: String,
}

impl Drop for ActiveReply {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.write() {
            state.end_reply(&self.conversation_id);
        }
    }
}

/// Get a conversation and its messages by ID
async fn conversation(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.read().expect("Unable to read share state").chat_store();

    let Some(conversation) = store.get_conversation(&id).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            format!("Conversation {} not found", id),
        )
            .into_response());
    };
    let messages = store.list_messages(&id).await?;

    Ok(axum::Json(public::ConversationResponse {
        id: conversation.id,
        title: conversation.title,
        messages,
    })
    .into_response())
}

/// Start a new conversation opening with the welcome message
async fn new_conversation(
    State(state): State<SharedState>,
) -> Result<axum::Json<public::NewConversationResponse>, ApiError> {
    let (store, config) = {
        let shared_state = state.read().expect("Unable to read share state");
        (shared_state.chat_store(), shared_state.config.clone())
    };

    let mut session = ChatSession::from_config(&config).store(store).build();
    let id = session
        .new_chat()
        .await?
        .ok_or(anyhow::anyhow!("New chat has no conversation"))?;

    Ok(axum::Json(public::NewConversationResponse {
        id,
        messages: session.messages(),
    }))
}

/// Send a message to a conversation and stream the session's events
/// as they happen
async fn chat_handler(
    State(state): State<SharedState>,
    axum::Json(payload): axum::Json<public::ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.message.trim().is_empty() {
        return Ok((StatusCode::BAD_REQUEST, "Message can't be empty").into_response());
    }

    let (store, config) = {
        let shared_state = state.read().expect("Unable to read share state");
        (shared_state.chat_store(), shared_state.config.clone())
    };

    let (tx, rx) = mpsc::unbounded_channel::<SessionEvent>();
    let sse_stream = UnboundedReceiverStream::new(rx).map(|event| Event::default().json_data(event));

    // Continue the requested conversation or start a new one. When
    // storage fails the reply still streams, only unpersisted.
    let conversation_id = match payload.conversation_id {
        Some(id) => match store.get_conversation(&id).await {
            Ok(Some(_)) => Some(id),
            Ok(None) => {
                return Ok((
                    StatusCode::NOT_FOUND,
                    format!("Conversation {} not found", id),
                )
                    .into_response());
            }
            Err(e) => {
                tracing::error!("Error finding conversation {}: {}", id, e);
                Some(id)
            }
        },
        // Without an id the session tries again and notifies
        None => match store.create_conversation(&config.conversation_title).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!("Error creating conversation: {}", e);
                None
            }
        },
    };

    // Only one reply per conversation can stream at a time
    let active = match &conversation_id {
        Some(id) => {
            let started = state
                .write()
                .expect("Unable to write share state")
                .begin_reply(id);
            if !started {
                return Ok((
                    StatusCode::CONFLICT,
                    format!("Conversation {} already has a reply in progress", id),
                )
                    .into_response());
            }
            // Announce the conversation before anything else
            tx.send(SessionEvent::Conversation { id: id.clone() })?;
            Some(ActiveReply {
                state: Arc::clone(&state),
                conversation_id: id.clone(),
            })
        }
        None => None,
    };

    let history = match &conversation_id {
        Some(id) => match store.list_messages(id).await {
            Ok(history) => history,
            Err(e) => {
                tracing::error!("Error loading messages: {}", e);
                tx.send(SessionEvent::Notice {
                    notice: Notice::error("Failed to load messages"),
                })?;
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let mut builder = ChatSession::from_config(&config)
        .store(store)
        .transcript(history)
        .events(tx);
    if let Some(id) = &conversation_id {
        builder = builder.conversation(id);
    }
    let mut session = builder.build();

    tokio::spawn(async move {
        if let Err(e) = session.send(&payload.message).await {
            tracing::error!("Chat handler error: {}. Root cause: {}", e, e.root_cause());
        }
        // Release the conversation before the event stream closes
        drop(active);
    });

    let resp = Sse::new(sse_stream)
        .keep_alive(
            KeepAlive::default()
                .text("keep-alive")
                .interval(Duration::from_secs(15)),
        )
        .into_response();

    Ok(resp)
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(chat_handler))
        .route("/conversations", post(new_conversation))
        .route("/{id}", get(conversation))
}
