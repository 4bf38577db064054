use crate::leg::{LegCommand, LegEvent};
use crate::state::TurnState;
use callsim_dialogue::{strip_end_call, DialogueGenerator};
use callsim_scenarios::Scenario;
use callsim_transcript::{TranscriptPaths, TranscriptRecorder};
use callsim_types::Speaker;
use callsim_voice::{SpeechSynthesizer, SpeechToText, SttEvent, SttHandle, SynthesisStream};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Inbound audio buffered between the leg adapter and the bridge.
const LEG_EVENT_QUEUE: usize = 256;

/// Outbound frames and control messages buffered toward the leg adapter.
const LEG_COMMAND_QUEUE: usize = 512;

const SIGNAL_QUEUE: usize = 16;

/// Per-call tunables. Everything here is policy, not protocol.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Pause after an utterance-end before generating, so the patient does
    /// not talk over trailing agent speech.
    pub response_delay: Duration,
    /// Silence on the line before a filler prompt is played.
    pub keepalive_interval: Duration,
    /// Hard cap on call length, enforced bridge-side in addition to the
    /// provider's own time limit.
    pub max_call_duration: Duration,
    /// Budget for one dialogue-generator request.
    pub generation_timeout: Duration,
    /// Spoken instead of a generated reply when generation fails or times
    /// out.
    pub fallback_utterance: String,
    /// Spoken when the line has been silent for `keepalive_interval`.
    pub keepalive_prompt: String,
    /// Delay between the end-of-call marker's playback and the hangup.
    pub hangup_grace: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            response_delay: Duration::from_millis(500),
            keepalive_interval: Duration::from_secs(10),
            max_call_duration: Duration::from_secs(180),
            generation_timeout: Duration::from_secs(15),
            fallback_utterance: "Sorry, could you repeat that?".to_string(),
            keepalive_prompt: "Hello? Are you still there?".to_string(),
            hangup_grace: Duration::from_secs(2),
        }
    }
}

/// Why a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The provider closed the media stream (hangup on either side).
    ProviderStopped,
    /// The bridge's own max-duration cutoff fired.
    MaxDurationReached,
    /// A speech session dropped twice in a row, or could not be opened.
    StreamFailure,
}

/// What a finished call left behind.
#[derive(Debug)]
pub struct CallOutcome {
    pub reason: EndReason,
    /// Where the transcript landed, if the flush succeeded.
    pub transcript: Option<TranscriptPaths>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaybackKind {
    Reply,
    Filler,
}

enum BridgeSignal {
    /// Generation finished; `None` means fall back to the canned utterance.
    /// `seq` ties the result to the request that produced it, so a reply
    /// superseded by a newer agent utterance is dropped, not spoken.
    ReplyReady { seq: u64, reply: Option<String> },
    PlaybackDone {
        seq: u64,
        kind: PlaybackKind,
        cancelled: bool,
        failed: bool,
    },
}

struct ActivePlayback {
    seq: u64,
    token: CancellationToken,
    kind: PlaybackKind,
    text: String,
}

struct SttLink {
    handle: Box<dyn SttHandle>,
    events: mpsc::Receiver<SttEvent>,
}

/// Drives one call from connect to hangup. See the crate docs for the
/// state machine.
pub struct CallBridge {
    scenario: &'static Scenario,
    settings: BridgeSettings,
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn SpeechSynthesizer>,
    dialogue: Arc<dyn DialogueGenerator>,
    recorder: TranscriptRecorder,
    leg_rx: mpsc::Receiver<LegEvent>,
    leg_tx: mpsc::Sender<LegCommand>,
    signal_tx: mpsc::Sender<BridgeSignal>,
    signal_rx: Option<mpsc::Receiver<BridgeSignal>>,

    state: TurnState,
    /// Final transcript fragments of the utterance in progress.
    utterance: String,
    /// When the first speech of the current utterance was observed.
    utterance_started: Option<Instant>,
    keepalive_fired: bool,
    stt_failures: u8,
    tts_failures: u8,
    generation: Option<JoinHandle<()>>,
    generation_seq: u64,
    playback: Option<ActivePlayback>,
    playback_seq: u64,
    pending_hangup: bool,
}

impl CallBridge {
    /// Builds a bridge and the channel pair the leg adapter talks through.
    pub fn new(
        scenario: &'static Scenario,
        settings: BridgeSettings,
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn SpeechSynthesizer>,
        dialogue: Arc<dyn DialogueGenerator>,
        recorder: TranscriptRecorder,
    ) -> (Self, mpsc::Sender<LegEvent>, mpsc::Receiver<LegCommand>) {
        let (leg_event_tx, leg_rx) = mpsc::channel(LEG_EVENT_QUEUE);
        let (leg_tx, leg_command_rx) = mpsc::channel(LEG_COMMAND_QUEUE);
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_QUEUE);

        let bridge = Self {
            scenario,
            settings,
            stt,
            tts,
            dialogue,
            recorder,
            leg_rx,
            leg_tx,
            signal_tx,
            signal_rx: Some(signal_rx),
            state: TurnState::Idle,
            utterance: String::new(),
            utterance_started: None,
            keepalive_fired: false,
            stt_failures: 0,
            tts_failures: 0,
            generation: None,
            generation_seq: 0,
            playback: None,
            playback_seq: 0,
            pending_hangup: false,
        };
        (bridge, leg_event_tx, leg_command_rx)
    }

    /// Runs the call to completion. Never panics the caller: every failure
    /// is contained here and ends in a flushed transcript.
    pub async fn run(mut self) -> CallOutcome {
        let mut signal_rx = self
            .signal_rx
            .take()
            .expect("run is called once per bridge");

        let mut stt_link = match self.stt.open().await {
            Ok((handle, events)) => SttLink { handle, events },
            Err(e) => {
                error!("could not open transcription session: {e}");
                return self.finish(EndReason::StreamFailure, None);
            }
        };

        // The agent under test answers the phone and speaks first.
        self.set_state(TurnState::AgentSpeaking);
        info!(scenario = self.scenario.id, "call bridge running");

        let deadline = tokio::time::sleep(self.settings.max_call_duration);
        tokio::pin!(deadline);
        let keepalive = tokio::time::sleep(self.settings.keepalive_interval);
        tokio::pin!(keepalive);

        let reason = loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!("max call duration reached, hanging up");
                    let _ = self.leg_tx.try_send(LegCommand::Hangup);
                    break EndReason::MaxDurationReached;
                }

                event = self.leg_rx.recv() => match event {
                    Some(LegEvent::Media(frame)) => {
                        // Every inbound frame goes to transcription, whatever
                        // the turn state.
                        stt_link.handle.feed(&frame);
                        self.keepalive_fired = false;
                        keepalive
                            .as_mut()
                            .reset(Instant::now() + self.settings.keepalive_interval);
                    }
                    Some(LegEvent::Stop) | None => break EndReason::ProviderStopped,
                },

                event = stt_link.events.recv() => match event {
                    Some(SttEvent::Closed { reason }) => {
                        if let Some(end) = self.handle_stt_drop(&reason, &mut stt_link).await {
                            break end;
                        }
                    }
                    None => {
                        if let Some(end) = self
                            .handle_stt_drop("event channel closed", &mut stt_link)
                            .await
                        {
                            break end;
                        }
                    }
                    Some(event) => {
                        // Speech activity counts as inbound for keepalive
                        // purposes; a feed stall does not.
                        if !matches!(event, SttEvent::Stalled) {
                            self.keepalive_fired = false;
                            keepalive
                                .as_mut()
                                .reset(Instant::now() + self.settings.keepalive_interval);
                        }
                        self.on_stt_event(event);
                    }
                },

                signal = signal_rx.recv() => match signal {
                    Some(BridgeSignal::ReplyReady { seq, reply }) => {
                        if let Some(end) = self.handle_reply(seq, reply).await {
                            break end;
                        }
                    }
                    Some(BridgeSignal::PlaybackDone { seq, kind, cancelled, failed }) => {
                        if let Some(end) = self
                            .handle_playback_done(seq, kind, cancelled, failed)
                            .await
                        {
                            break end;
                        }
                    }
                    None => unreachable!("bridge holds a signal sender"),
                },

                _ = keepalive.as_mut() => {
                    keepalive
                        .as_mut()
                        .reset(Instant::now() + self.settings.keepalive_interval);
                    if let Some(end) = self.keepalive_tick().await {
                        break end;
                    }
                }
            }
        };

        self.finish(reason, Some(stt_link.handle))
    }

    fn set_state(&mut self, next: TurnState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "turn state");
            self.state = next;
        }
    }

    /// Handles transcription traffic other than session drops.
    fn on_stt_event(&mut self, event: SttEvent) {
        match event {
            SttEvent::Partial(_) => {
                self.stt_failures = 0;
                self.note_agent_speech();
            }
            SttEvent::Final { text, speech_final } => {
                self.stt_failures = 0;
                self.note_agent_speech();
                if !self.utterance.is_empty() {
                    self.utterance.push(' ');
                }
                self.utterance.push_str(text.trim());
                if speech_final {
                    self.complete_utterance();
                }
            }
            SttEvent::UtteranceEnd => {
                self.complete_utterance();
            }
            SttEvent::Stalled => {
                warn!("transcription feed stalled, inbound frames are being dropped");
            }
            SttEvent::Closed { .. } => unreachable!("drops are handled by the run loop"),
        }
    }

    /// Marks agent speech activity: starts utterance timing, fixes up the
    /// bookkeeping state, and triggers barge-in when the patient is
    /// mid-reply.
    fn note_agent_speech(&mut self) {
        if self.playback.is_some() || self.state == TurnState::PatientSpeaking {
            self.barge_in();
        }
        if self.utterance_started.is_none() {
            self.utterance_started = Some(Instant::now());
        }
        if self.state == TurnState::AgentSpeaking {
            self.set_state(TurnState::AwaitingUtteranceEnd);
        }
    }

    /// Cancels in-flight synthesis and tells the leg to drop its buffer.
    /// Frames already played are gone; the unspoken remainder is discarded,
    /// never queued for later.
    fn barge_in(&mut self) {
        if let Some(playback) = &self.playback {
            info!(kind = ?playback.kind, "agent speech during playback, cancelling synthesis");
            playback.token.cancel();
            if self.leg_tx.try_send(LegCommand::Clear).is_err() {
                warn!("leg command queue full, clear not delivered");
            }
        }
        if self.state == TurnState::PatientSpeaking {
            self.set_state(TurnState::AgentSpeaking);
        }
    }

    /// The agent finished a turn: record it and start generating the reply.
    fn complete_utterance(&mut self) {
        let text = std::mem::take(&mut self.utterance).trim().to_string();
        let duration_ms = self
            .utterance_started
            .take()
            .map(|started| started.elapsed().as_millis() as u64);
        if text.is_empty() {
            return;
        }

        info!(chars = text.len(), "agent utterance complete");
        self.recorder.record(Speaker::Agent, text, duration_ms);

        // A newer utterance supersedes any reply still being generated.
        if let Some(stale) = self.generation.take() {
            stale.abort();
        }

        self.set_state(TurnState::GeneratingReply);
        self.spawn_generation();
    }

    fn spawn_generation(&mut self) {
        let dialogue = Arc::clone(&self.dialogue);
        let prompt = self.scenario.system_prompt();
        let turns = self.recorder.turns().to_vec();
        let delay = self.settings.response_delay;
        let timeout = self.settings.generation_timeout;
        let signal_tx = self.signal_tx.clone();
        self.generation_seq += 1;
        let seq = self.generation_seq;

        self.generation = Some(tokio::spawn(async move {
            // The delay keeps the patient from talking over trailing agent
            // speech that endpointing cut short.
            tokio::time::sleep(delay).await;
            let reply = match tokio::time::timeout(timeout, dialogue.next_utterance(&prompt, &turns))
                .await
            {
                Ok(Ok(text)) => Some(text),
                Ok(Err(e)) => {
                    warn!("dialogue generation failed: {e}");
                    None
                }
                Err(_) => {
                    warn!(budget_ms = timeout.as_millis() as u64, "dialogue generation timed out");
                    None
                }
            };
            let _ = signal_tx.send(BridgeSignal::ReplyReady { seq, reply }).await;
        }));
    }

    async fn handle_reply(&mut self, seq: u64, reply: Option<String>) -> Option<EndReason> {
        if seq != self.generation_seq || self.state != TurnState::GeneratingReply {
            debug!(state = %self.state, "dropping stale generated reply");
            return None;
        }
        self.generation = None;

        let (text, end_call) = match reply {
            Some(raw) => strip_end_call(&raw),
            None => (self.settings.fallback_utterance.clone(), false),
        };
        self.pending_hangup = end_call;

        if text.is_empty() {
            // Marker-only reply: nothing left to say.
            self.set_state(TurnState::AgentSpeaking);
            if end_call {
                self.schedule_hangup();
            }
            return None;
        }

        // A filler prompt may still be playing; the reply takes the line.
        if let Some(active) = &self.playback {
            active.token.cancel();
            let _ = self.leg_tx.try_send(LegCommand::Clear);
        }

        self.recorder.record(Speaker::Patient, text.clone(), None);
        self.set_state(TurnState::PatientSpeaking);
        self.begin_playback(text, PlaybackKind::Reply).await
    }

    /// Opens a synthesis stream and pumps its frames to the leg. A failed
    /// open is retried once; a second consecutive synthesis failure ends
    /// the call.
    async fn begin_playback(&mut self, text: String, kind: PlaybackKind) -> Option<EndReason> {
        loop {
            match self.tts.synthesize(&text, self.scenario.voice).await {
                Ok(stream) => {
                    self.spawn_pump(stream, kind, &text);
                    return None;
                }
                Err(e) => {
                    self.tts_failures += 1;
                    warn!(failures = self.tts_failures, "synthesis request failed: {e}");
                    if self.tts_failures >= 2 {
                        return Some(EndReason::StreamFailure);
                    }
                }
            }
        }
    }

    fn spawn_pump(&mut self, mut stream: SynthesisStream, kind: PlaybackKind, text: &str) {
        let token = stream.cancel_token();
        self.playback_seq += 1;
        let seq = self.playback_seq;
        self.playback = Some(ActivePlayback {
            seq,
            token: token.clone(),
            kind,
            text: text.to_string(),
        });

        let leg_tx = self.leg_tx.clone();
        let signal_tx = self.signal_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next_frame().await {
                if token.is_cancelled() {
                    break;
                }
                if leg_tx.send(LegCommand::Media(frame)).await.is_err() {
                    return;
                }
            }
            let _ = signal_tx
                .send(BridgeSignal::PlaybackDone {
                    seq,
                    kind,
                    cancelled: stream.is_cancelled(),
                    failed: stream.failed(),
                })
                .await;
        });
    }

    async fn handle_playback_done(
        &mut self,
        seq: u64,
        kind: PlaybackKind,
        cancelled: bool,
        failed: bool,
    ) -> Option<EndReason> {
        // A completion signal from a playback that has already been
        // replaced must not touch the current one.
        if self.playback.as_ref().map(|p| p.seq) != Some(seq) {
            return None;
        }
        let active = self.playback.take();

        if failed && !cancelled {
            self.tts_failures += 1;
            warn!(failures = self.tts_failures, "synthesis stream dropped mid-utterance");
            if self.tts_failures >= 2 {
                return Some(EndReason::StreamFailure);
            }
            // Retry the dropped utterance once from the top.
            if let Some(active) = active {
                return self.begin_playback(active.text, kind).await;
            }
            return None;
        }

        if !cancelled {
            self.tts_failures = 0;
        }

        if kind == PlaybackKind::Reply {
            if !cancelled {
                self.set_state(TurnState::AgentSpeaking);
            }
            if self.pending_hangup {
                self.schedule_hangup();
            }
        }
        None
    }

    fn schedule_hangup(&mut self) {
        self.pending_hangup = false;
        info!(
            grace_ms = self.settings.hangup_grace.as_millis() as u64,
            "end-of-call marker spoken, hanging up"
        );
        let leg_tx = self.leg_tx.clone();
        let grace = self.settings.hangup_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = leg_tx.send(LegCommand::Hangup).await;
        });
    }

    async fn handle_stt_drop(
        &mut self,
        reason: &str,
        stt_link: &mut SttLink,
    ) -> Option<EndReason> {
        self.stt_failures += 1;
        if self.stt_failures >= 2 {
            warn!(reason, "transcription dropped twice, ending call");
            return Some(EndReason::StreamFailure);
        }

        warn!(reason, "transcription session dropped, reconnecting");
        match self.stt.open().await {
            Ok((handle, events)) => {
                stt_link.handle = handle;
                stt_link.events = events;
                None
            }
            Err(e) => {
                error!("transcription reconnect failed: {e}");
                Some(EndReason::StreamFailure)
            }
        }
    }

    /// Long silence from the agent: play one filler prompt, leaving the
    /// turn state alone.
    async fn keepalive_tick(&mut self) -> Option<EndReason> {
        if self.keepalive_fired || !self.state.awaits_agent() || self.playback.is_some() {
            return None;
        }
        self.keepalive_fired = true;
        info!("line idle, playing keepalive prompt");
        self.begin_playback(self.settings.keepalive_prompt.clone(), PlaybackKind::Filler)
            .await
    }

    fn finish(mut self, reason: EndReason, stt_handle: Option<Box<dyn SttHandle>>) -> CallOutcome {
        self.set_state(TurnState::Ended);
        if let Some(generation) = self.generation.take() {
            generation.abort();
        }
        if let Some(playback) = self.playback.take() {
            playback.token.cancel();
        }
        if let Some(handle) = stt_handle {
            handle.close();
        }

        let transcript = match self.recorder.finalize() {
            Ok(paths) => Some(paths.clone()),
            Err(e) => {
                error!("failed to flush transcript: {e}");
                None
            }
        };

        info!(
            scenario = self.scenario.id,
            reason = ?reason,
            turns = self.recorder.turns().len(),
            "call ended"
        );
        CallOutcome { reason, transcript }
    }
}
