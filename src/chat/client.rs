//! Client for the remote streaming chat endpoint.
use anyhow::{Context, Error, Result, anyhow};
use serde_json::json;

use super::models::WireMessage;

/// Start a streamed chat completion for `messages`.
///
/// Resolves once the response headers arrive; the body is left
/// unread so it can be consumed as a chunk stream with
/// `Response::bytes_stream`. There is no retry and no read timeout.
pub async fn open_chat_stream(
    url: &str,
    api_key: &str,
    messages: &[WireMessage],
) -> Result<reqwest::Response, Error> {
    let payload = json!({ "messages": messages });

    let response = reqwest::Client::new()
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .json(&payload)
        .send()
        .await
        .context("Failed to start chat stream")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!("Chat endpoint responded with {}: {}", status, body);
        return Err(anyhow!("Failed to start chat stream: {}", status));
    }

    Ok(response)
}
