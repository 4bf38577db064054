/// Turn-taking state for one call.
///
/// The conversation alternates between the agent under test and the
/// synthetic patient. Every inbound frame is forwarded to transcription
/// regardless of state; the state only decides how transcription and
/// synthesis events are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Call not yet connected.
    Idle,
    /// Waiting for the agent to speak. The agent is expected to open the
    /// conversation when the call connects.
    AgentSpeaking,
    /// At least one partial transcript has been observed; waiting for the
    /// recognizer's utterance-end signal.
    AwaitingUtteranceEnd,
    /// The agent's utterance is complete and a patient reply is being
    /// generated.
    GeneratingReply,
    /// The patient reply is being synthesized and streamed to the call.
    PatientSpeaking,
    /// Terminal: transcript flushed, sessions closed.
    Ended,
}

impl TurnState {
    /// States in which the call is waiting on the agent and a long silence
    /// warrants a keepalive filler prompt.
    pub fn awaits_agent(self) -> bool {
        matches!(self, Self::AgentSpeaking | Self::AwaitingUtteranceEnd)
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::AgentSpeaking => "agent_speaking",
            Self::AwaitingUtteranceEnd => "awaiting_utterance_end",
            Self::GeneratingReply => "generating_reply",
            Self::PatientSpeaking => "patient_speaking",
            Self::Ended => "ended",
        })
    }
}
