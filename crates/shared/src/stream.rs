//! Chunk type flowing from a provider adapter to the response controller
//! over an unbounded mpsc channel.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamChunk {
    /// Incremental response text.
    Text(String),
    /// The adapter substituted a different model (vision fallback).
    ModelSwitched { model: String, display_name: String },
    /// Stream finished normally.
    Done { finish_reason: Option<String> },
    /// Stream failed after it started; partial text may already be out.
    Error(String),
}
