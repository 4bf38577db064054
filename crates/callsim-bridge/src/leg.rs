//! Message types for the call-leg boundary.
//!
//! The server's WebSocket adapter translates the telephony provider's wire
//! protocol into these messages, so the bridge never sees provider framing.

/// What the call leg reports to the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegEvent {
    /// One inbound audio frame (raw μ-law bytes, already decoded from the
    /// wire encoding).
    Media(Vec<u8>),
    /// The provider ended the stream (hangup or provider-side error).
    Stop,
}

/// What the bridge asks the call leg to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegCommand {
    /// Play one audio frame to the callee.
    Media(Vec<u8>),
    /// Drop any audio the provider has buffered but not yet played
    /// (barge-in).
    Clear,
    /// End the call via the telephony API.
    Hangup,
}
