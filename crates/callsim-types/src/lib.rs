//! Shared types and constants for the callsim test harness.
//!
//! This crate provides the vocabulary used across all callsim crates:
//! speaker roles, the telephony audio format, and the frame chunker that
//! re-slices provider audio into wire-sized frames.
//!
//! No crate in the workspace depends on anything *except* `callsim-types`
//! for cross-cutting definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

pub mod audio;

pub use audio::{FrameChunker, FRAME_BYTES, FRAME_MILLIS, MULAW_SILENCE, SAMPLE_RATE_HZ};

use serde::{Deserialize, Serialize};

/// Which side of the call produced an utterance.
///
/// `Agent` is the system under test (the medical-office phone agent);
/// `Patient` is the synthetic caller this harness plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Agent,
    Patient,
}

impl Speaker {
    /// Returns the transcript label for this speaker.
    pub fn label(self) -> &'static str {
        match self {
            Self::Agent => "AI Agent",
            Self::Patient => "Patient Bot",
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Agent => "agent",
            Self::Patient => "patient",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Speaker::Agent).unwrap(), "\"agent\"");
        assert_eq!(
            serde_json::to_string(&Speaker::Patient).unwrap(),
            "\"patient\""
        );
    }

    #[test]
    fn speaker_round_trips() {
        let s: Speaker = serde_json::from_str("\"patient\"").unwrap();
        assert_eq!(s, Speaker::Patient);
    }
}
