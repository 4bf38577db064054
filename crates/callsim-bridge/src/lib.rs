//! The call bridge: one call's real-time audio pipeline.
//!
//! A [`CallBridge`] owns the full lifecycle of a single phone call. It
//! relays inbound call audio to the speech-to-text session, turns finished
//! agent utterances into dialogue-generator requests, streams the
//! synthesized patient reply back to the call leg, and records both sides
//! in the transcript. Turn-taking, barge-in, keepalive, and failure policy
//! all live here - the provider clients stay dumb pipes.
//!
//! The bridge is the single place that observes all event sources: the
//! call leg, the transcription session, synthesis playback, and the
//! generation task all feed one select loop. Nothing outside the bridge
//! mutates its session state, and nothing in it outlives the call.

mod bridge;
mod leg;
mod state;

pub use bridge::{BridgeSettings, CallBridge, CallOutcome, EndReason};
pub use leg::{LegCommand, LegEvent};
pub use state::TurnState;
