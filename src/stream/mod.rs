//! Consumes the chunked event stream of a chat completion and folds
//! it into the assistant reply.
pub mod decoder;
pub mod reconciler;

pub use decoder::Utf8Decoder;
pub use reconciler::{
    Line, Reconciler, StreamEnd, StreamOutcome, classify_line, parse_delta, reconcile,
};
