use anyhow::{Context, Error, Result, bail};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use super::decoder::Utf8Decoder;
use crate::chat::{SessionEvent, Transcript};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// A single complete line of the event stream after its line ending
/// has been stripped.
#[derive(Debug, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    Comment,
    /// Any line that isn't a `data: ` line
    Ignored,
    Done,
    Data(&'a str),
}

pub fn classify_line(line: &str) -> Line<'_> {
    if line.starts_with(':') {
        return Line::Comment;
    }
    if line.trim().is_empty() {
        return Line::Blank;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Line::Ignored;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return Line::Done;
    }
    Line::Data(payload)
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

/// Extract `choices[0].delta.content` from a data payload.
///
/// Returns an error when the payload isn't valid JSON or is `null`,
/// which has no fields to read. Any other JSON of an unexpected shape,
/// a missing field, or an empty string all mean there is no content
/// in this event.
pub fn parse_delta(payload: &str) -> Result<Option<String>, Error> {
    let value: Value = serde_json::from_str(payload)?;
    if value.is_null() {
        bail!("Data payload is null");
    }
    let content = CompletionChunk::deserialize(&value)
        .ok()
        .and_then(|chunk| chunk.choices.into_iter().next())
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty());
    Ok(content)
}

/// Turns the raw bytes of a chat completion event stream into content
/// deltas.
///
/// Bytes are decoded and buffered until a full line is available.
/// When a `data: ` line can't be parsed it is assumed to be a record
/// that the server split across lines: the line goes back to the front
/// of the buffer and nothing more is read from the current chunk.
/// A payload that is actually malformed is therefore retried on every
/// chunk, blocks every line after it, and is dropped when the stream
/// ends.
#[derive(Default, Debug)]
pub struct Reconciler {
    decoder: Utf8Decoder,
    buffer: String,
    content: String,
    done: bool,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one chunk of the stream and return the deltas it
    /// produced, in order. Everything after `data: [DONE]` is ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut deltas = Vec::new();
        if self.done {
            return deltas;
        }

        let text = self.decoder.decode(chunk);
        self.buffer.push_str(&text);

        while let Some(newline_idx) = self.buffer.find('\n') {
            let mut line = self.buffer[..newline_idx].to_string();
            self.buffer.drain(..=newline_idx);

            if line.ends_with('\r') {
                line.pop();
            }

            match classify_line(&line) {
                Line::Blank | Line::Comment | Line::Ignored => {
                    tracing::trace!("Skipping line: {:?}", line);
                }
                Line::Done => {
                    self.done = true;
                    self.buffer.clear();
                    break;
                }
                Line::Data(payload) => match parse_delta(payload) {
                    Ok(Some(delta)) => {
                        self.content.push_str(&delta);
                        deltas.push(delta);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!("Incomplete data line, waiting for more input: {}", e);
                        self.buffer.insert_str(0, &format!("{}\n", line));
                        break;
                    }
                },
            }
        }

        deltas
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// All content accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Text received that hasn't been consumed as a line yet.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The server sent `data: [DONE]`
    Done,
    /// The transport ran out of chunks first
    Eof,
}

#[derive(Debug)]
pub struct StreamOutcome {
    pub content: String,
    pub end: StreamEnd,
}

/// Consume a chunked response body, folding every delta into the
/// assistant reply at the end of `transcript`.
///
/// After each delta the full message list is sent on `updates`.
/// Running out of chunks without seeing `[DONE]` is a normal
/// completion; a failed read is an error and leaves `transcript` with
/// whatever was rendered up to that point.
pub async fn reconcile<S, B, E>(
    chunks: S,
    transcript: &mut Transcript,
    updates: &mpsc::UnboundedSender<SessionEvent>,
) -> Result<StreamOutcome, Error>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut reconciler = Reconciler::new();

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.context("Chat stream transport failed")?;

        let base_len = reconciler.content().len();
        let deltas = reconciler.feed(chunk.as_ref());

        let mut end = base_len;
        for delta in deltas.iter() {
            end += delta.len();
            transcript.apply_assistant_delta(&reconciler.content()[..end]);
            // The result is ignored because nobody listening
            // shouldn't stop the stream from being consumed
            let _ = updates.send(SessionEvent::Messages {
                messages: transcript.messages(),
            });
        }

        if reconciler.is_done() {
            tracing::debug!("Chat stream finished with [DONE]");
            return Ok(StreamOutcome {
                content: reconciler.into_content(),
                end: StreamEnd::Done,
            });
        }
    }

    if !reconciler.pending().is_empty() {
        tracing::debug!(
            "Dropping {} bytes of unterminated stream data",
            reconciler.pending().len()
        );
    }
    tracing::debug!("Chat stream ended without [DONE]");

    Ok(StreamOutcome {
        content: reconciler.into_content(),
        end: StreamEnd::Eof,
    })
}
