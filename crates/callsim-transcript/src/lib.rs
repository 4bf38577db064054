//! Conversation transcript capture and persistence.
//!
//! A [`TranscriptRecorder`] accumulates one call's turns in memory and, at
//! call end, writes a machine-readable JSON file plus a parallel
//! human-readable text file under `<root>/<scenario_id>/`. Finalization is
//! idempotent: a duplicate end-of-call signal neither rewrites nor
//! duplicates anything.

mod recorder;

pub use recorder::{read_transcript, Transcript, TranscriptPaths, TranscriptRecorder, TurnRecord};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("failed to write transcript: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize transcript: {0}")]
    Serialization(#[from] serde_json::Error),
}
