//! Test utilities for integration tests
#![allow(dead_code)]
use std::env;
use std::sync::{Arc, RwLock};

use axum::{Router, body::Body};
use uuid::Uuid;

use floatchat::api::AppState;
use floatchat::api::app;
use floatchat::chat::SessionEvent;
use floatchat::core::AppConfig;
use floatchat::core::db::connect_and_initialize;

pub const CHAT_PATH: &str = "/functions/v1/ocean-chat";

/// Creates the shared state backed by a fresh database in a
/// temporary directory. Chat requests are sent to
/// `chat_api_hostname`.
pub async fn test_state(chat_api_hostname: &str) -> Arc<RwLock<AppState>> {
    let dir = env::temp_dir().join(format!("floatchat-{}", Uuid::new_v4()));
    let db_path = dir.join("db");
    let db_path = db_path.to_str().unwrap();

    let db = connect_and_initialize(db_path)
        .await
        .expect("Failed to connect to async db");

    let app_config = AppConfig {
        storage_path: dir.display().to_string(),
        db_path: db_path.to_string(),
        chat_api_hostname: chat_api_hostname.to_string(),
        chat_api_path: CHAT_PATH.to_string(),
        chat_api_key: String::from("test-api-key"),
        conversation_title: String::from("Ocean Data Chat"),
        welcome_message: String::from("Hello! I'm FloatMind AI."),
    };
    Arc::new(RwLock::new(AppState::new(db, app_config)))
}

/// Creates a test application router with a temporary database.
pub async fn test_app() -> Router {
    app(test_state("http://127.0.0.1:9").await)
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

/// Parse the JSON payload of every `data:` line of an SSE body.
pub fn sse_events(body: &str) -> Vec<SessionEvent> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).expect("Invalid event"))
        .collect()
}

/// An upstream chat completion stream replying with `parts`.
pub fn completion_stream(parts: &[&str]) -> String {
    let mut body = String::new();
    for part in parts {
        body.push_str(&format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": part}}]})
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}
