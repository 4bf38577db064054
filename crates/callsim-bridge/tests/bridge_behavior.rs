//! End-to-end bridge behavior against fake provider clients.
//!
//! These tests drive the bridge the way the leg adapter and providers
//! would: transcription events in, leg commands out. Time is paused, so
//! the delay/timeout/keepalive policies run instantly and
//! deterministically.

use async_trait::async_trait;
use callsim_bridge::{BridgeSettings, CallBridge, CallOutcome, EndReason, LegCommand, LegEvent};
use callsim_dialogue::{DialogueError, DialogueGenerator};
use callsim_scenarios::Scenario;
use callsim_transcript::{read_transcript, TranscriptRecorder, TurnRecord};
use callsim_types::Speaker;
use callsim_voice::{
    SpeechSynthesizer, SpeechToText, SttEvent, SttHandle, SynthesisStream, VoiceError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const FALLBACK: &str = "Sorry, could you repeat that?";
const FILLER: &str = "Hello? Are you still there?";

// ── fakes ───────────────────────────────────────────────────────────────

struct FakeStt {
    sessions: Mutex<VecDeque<mpsc::Receiver<SttEvent>>>,
    opens: AtomicUsize,
    fed: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FakeStt {
    /// Prepares `count` sessions; the bridge consumes one per open (the
    /// extras cover reconnects).
    fn with_sessions(count: usize) -> (Arc<Self>, Vec<mpsc::Sender<SttEvent>>) {
        let mut senders = Vec::new();
        let mut receivers = VecDeque::new();
        for _ in 0..count {
            let (tx, rx) = mpsc::channel(64);
            senders.push(tx);
            receivers.push_back(rx);
        }
        let fake = Arc::new(Self {
            sessions: Mutex::new(receivers),
            opens: AtomicUsize::new(0),
            fed: Arc::default(),
        });
        (fake, senders)
    }
}

#[async_trait]
impl SpeechToText for FakeStt {
    async fn open(&self) -> Result<(Box<dyn SttHandle>, mpsc::Receiver<SttEvent>), VoiceError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let events = self
            .sessions
            .lock()
            .unwrap()
            .pop_front()
            .expect("test prepared too few transcription sessions");
        let handle = FakeSttHandle {
            fed: self.fed.clone(),
        };
        Ok((Box::new(handle), events))
    }
}

struct FakeSttHandle {
    fed: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl SttHandle for FakeSttHandle {
    fn feed(&self, frame: &[u8]) {
        self.fed.lock().unwrap().push(frame.to_vec());
    }

    fn close(&self) {}
}

struct FakeTts {
    calls: Mutex<Vec<String>>,
    frames_per_call: usize,
    /// Keep the producer side alive so playback never completes on its own.
    hold_open: bool,
    held: Mutex<Vec<mpsc::Sender<Vec<u8>>>>,
    /// The next synthesize call produces a stream that dies mid-utterance.
    fail_next_stream: AtomicBool,
}

impl FakeTts {
    fn build(frames_per_call: usize, hold_open: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            frames_per_call,
            hold_open,
            held: Mutex::new(Vec::new()),
            fail_next_stream: AtomicBool::new(false),
        })
    }

    fn new(frames_per_call: usize) -> Arc<Self> {
        Self::build(frames_per_call, false)
    }

    fn holding_open(frames_per_call: usize) -> Arc<Self> {
        Self::build(frames_per_call, true)
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(&self, text: &str, _voice: &str) -> Result<SynthesisStream, VoiceError> {
        self.calls.lock().unwrap().push(text.to_string());

        let (tx, rx) = mpsc::channel(64);
        let failed = Arc::new(AtomicBool::new(false));
        for i in 0..self.frames_per_call {
            tx.try_send(vec![i as u8; 160]).unwrap();
        }
        if self.fail_next_stream.swap(false, Ordering::SeqCst) {
            failed.store(true, Ordering::SeqCst);
        } else if self.hold_open {
            self.held.lock().unwrap().push(tx);
        }
        Ok(SynthesisStream::new(rx, CancellationToken::new(), failed))
    }
}

struct FakeDialogue {
    replies: Mutex<VecDeque<String>>,
    delay: Duration,
}

impl FakeDialogue {
    fn replying(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            delay: Duration::from_millis(10),
        })
    }

    fn stalled() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            delay: Duration::from_secs(600),
        })
    }
}

#[async_trait]
impl DialogueGenerator for FakeDialogue {
    async fn next_utterance(
        &self,
        _system_prompt: &str,
        _turns: &[TurnRecord],
    ) -> Result<String, DialogueError> {
        tokio::time::sleep(self.delay).await;
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "Okay.".to_string()))
    }
}

// ── harness ─────────────────────────────────────────────────────────────

fn scenario() -> &'static Scenario {
    callsim_scenarios::get("new_patient_scheduling").unwrap()
}

fn settings() -> BridgeSettings {
    BridgeSettings {
        response_delay: Duration::from_millis(50),
        keepalive_interval: Duration::from_secs(5),
        max_call_duration: Duration::from_secs(120),
        generation_timeout: Duration::from_secs(1),
        hangup_grace: Duration::from_millis(100),
        ..BridgeSettings::default()
    }
}

struct Harness {
    leg_tx: mpsc::Sender<LegEvent>,
    commands: mpsc::Receiver<LegCommand>,
    run: JoinHandle<CallOutcome>,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn start(
        stt: Arc<FakeStt>,
        tts: Arc<FakeTts>,
        dialogue: Arc<FakeDialogue>,
        settings: BridgeSettings,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let recorder =
            TranscriptRecorder::new(dir.path(), "CA-test", scenario().id, scenario().name);
        let (bridge, leg_tx, commands) =
            CallBridge::new(scenario(), settings, stt, tts, dialogue, recorder);
        let run = tokio::spawn(bridge.run());
        Self {
            leg_tx,
            commands,
            run,
            _dir: dir,
        }
    }

    async fn next_command(&mut self) -> LegCommand {
        tokio::time::timeout(Duration::from_secs(60), self.commands.recv())
            .await
            .expect("timed out waiting for a leg command")
            .expect("leg command channel closed")
    }

    async fn expect_media(&mut self) -> Vec<u8> {
        match self.next_command().await {
            LegCommand::Media(frame) => frame,
            other => panic!("expected media, got {other:?}"),
        }
    }

    /// Asserts nothing arrives on the command channel for `window`.
    async fn expect_quiet(&mut self, window: Duration) {
        match tokio::time::timeout(window, self.commands.recv()).await {
            Err(_) => {}
            Ok(Some(cmd)) => panic!("expected quiet, got {cmd:?}"),
            Ok(None) => panic!("leg command channel closed"),
        }
    }

    /// Stops the bridge and returns the outcome along with the tempdir
    /// guard, so the caller can keep the transcript files on disk long
    /// enough to read them back.
    async fn stop(self) -> (CallOutcome, tempfile::TempDir) {
        let _ = self.leg_tx.send(LegEvent::Stop).await;
        let outcome = self.run.await.expect("bridge task panicked");
        (outcome, self._dir)
    }
}

fn agent_said(sender: &mpsc::Sender<SttEvent>, text: &str) {
    sender
        .try_send(SttEvent::Final {
            text: text.to_string(),
            speech_final: true,
        })
        .unwrap();
}

// ── tests ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn a_full_turn_flows_from_utterance_to_playback() {
    let (stt, senders) = FakeStt::with_sessions(1);
    let tts = FakeTts::new(3);
    let dialogue = FakeDialogue::replying(&["I'd like to book a checkup."]);
    let mut harness = Harness::start(stt.clone(), tts.clone(), dialogue, settings());

    // Inbound audio reaches the recognizer regardless of state.
    harness
        .leg_tx
        .send(LegEvent::Media(vec![0u8; 160]))
        .await
        .unwrap();

    agent_said(&senders[0], "How can I help you today?");

    for _ in 0..3 {
        harness.expect_media().await;
    }
    assert_eq!(tts.calls(), vec!["I'd like to book a checkup.".to_string()]);
    assert_eq!(stt.fed.lock().unwrap().len(), 1);

    let (outcome, _dir) = harness.stop().await;
    assert_eq!(outcome.reason, EndReason::ProviderStopped);

    let transcript = read_transcript(&outcome.transcript.unwrap().json).unwrap();
    assert_eq!(transcript.message_count, 2);
    assert_eq!(transcript.turns[0].speaker, Speaker::Agent);
    assert_eq!(transcript.turns[0].text, "How can I help you today?");
    assert!(transcript.turns[0].audio_duration_ms.is_some());
    assert_eq!(transcript.turns[1].speaker, Speaker::Patient);
    assert!(transcript.turns[1].audio_duration_ms.is_none());
    assert!(transcript.turns[0].timestamp <= transcript.turns[1].timestamp);
}

#[tokio::test(start_paused = true)]
async fn generation_timeout_speaks_the_fallback_and_keeps_the_call_alive() {
    let (stt, senders) = FakeStt::with_sessions(1);
    let tts = FakeTts::new(2);
    let dialogue = FakeDialogue::stalled();
    let mut harness = Harness::start(stt, tts.clone(), dialogue, settings());

    agent_said(&senders[0], "Can I get your date of birth?");

    for _ in 0..2 {
        harness.expect_media().await;
    }
    assert_eq!(tts.calls(), vec![FALLBACK.to_string()]);

    let (outcome, _dir) = harness.stop().await;
    assert_eq!(outcome.reason, EndReason::ProviderStopped);

    let transcript = read_transcript(&outcome.transcript.unwrap().json).unwrap();
    assert_eq!(transcript.turns[1].text, FALLBACK);
}

#[tokio::test(start_paused = true)]
async fn barge_in_cancels_synthesis_before_any_further_frame() {
    let (stt, senders) = FakeStt::with_sessions(1);
    let tts = FakeTts::holding_open(2);
    let dialogue = FakeDialogue::replying(&["Sure, my name is Sarah Johnson and my insurance is..."]);
    let mut harness = Harness::start(stt, tts.clone(), dialogue, settings());

    agent_said(&senders[0], "Go ahead.");

    // Playback is underway; drain the frames produced so far.
    for _ in 0..2 {
        harness.expect_media().await;
    }

    // Agent starts talking over the patient.
    senders[0]
        .try_send(SttEvent::Partial("actually".to_string()))
        .unwrap();

    assert_eq!(harness.next_command().await, LegCommand::Clear);

    // Frames the provider produces after the cancel must never reach the
    // leg.
    for held in tts.held.lock().unwrap().iter() {
        let _ = held.try_send(vec![9u8; 160]);
    }
    harness.expect_quiet(Duration::from_secs(2)).await;

    let (outcome, _dir) = harness.stop().await;
    assert_eq!(outcome.reason, EndReason::ProviderStopped);
}

#[tokio::test(start_paused = true)]
async fn idle_line_gets_exactly_one_keepalive_filler() {
    let (stt, senders) = FakeStt::with_sessions(1);
    let tts = FakeTts::new(1);
    let dialogue = FakeDialogue::replying(&["Hi, I'm a new patient."]);
    let mut harness = Harness::start(stt, tts.clone(), dialogue, settings());

    // Nothing inbound: the keepalive interval elapses and one filler plays.
    harness.expect_media().await;
    assert_eq!(tts.calls(), vec![FILLER.to_string()]);

    // Two more intervals of silence do not produce a second filler.
    harness.expect_quiet(Duration::from_secs(12)).await;
    assert_eq!(tts.calls().len(), 1);

    // A real inbound utterance flows normally afterwards.
    agent_said(&senders[0], "Thanks for calling, who am I speaking with?");
    harness.expect_media().await;
    assert_eq!(tts.calls()[1], "Hi, I'm a new patient.");

    let (outcome, _dir) = harness.stop().await;
    assert_eq!(outcome.reason, EndReason::ProviderStopped);
}

#[tokio::test(start_paused = true)]
async fn two_consecutive_stream_drops_end_the_call_with_a_flushed_transcript() {
    let (stt, senders) = FakeStt::with_sessions(2);
    let tts = FakeTts::new(1);
    let dialogue = FakeDialogue::replying(&["Hello, I need an appointment."]);
    let mut harness = Harness::start(stt.clone(), tts, dialogue, settings());

    // One complete turn first so the flushed transcript is non-empty.
    agent_said(&senders[0], "Office, how can I help?");
    harness.expect_media().await;

    senders[0]
        .try_send(SttEvent::Closed {
            reason: "network reset".to_string(),
        })
        .unwrap();
    senders[1]
        .try_send(SttEvent::Closed {
            reason: "network reset".to_string(),
        })
        .unwrap();

    let outcome = harness.run.await.expect("bridge task panicked");
    assert_eq!(outcome.reason, EndReason::StreamFailure);
    assert_eq!(stt.opens.load(Ordering::SeqCst), 2);

    let transcript = read_transcript(&outcome.transcript.unwrap().json).unwrap();
    assert!(transcript.message_count >= 1);
}

#[tokio::test(start_paused = true)]
async fn a_successful_reconnect_resets_the_drop_counter() {
    let (stt, senders) = FakeStt::with_sessions(3);
    let tts = FakeTts::new(1);
    let dialogue = FakeDialogue::replying(&["First reply.", "Second reply."]);
    let mut harness = Harness::start(stt.clone(), tts, dialogue, settings());

    senders[0]
        .try_send(SttEvent::Closed {
            reason: "blip".to_string(),
        })
        .unwrap();

    // The reconnected session carries a full turn, which clears the
    // consecutive-failure count, so the next drop reconnects again instead
    // of ending the call.
    agent_said(&senders[1], "Hello?");
    harness.expect_media().await;

    senders[1]
        .try_send(SttEvent::Closed {
            reason: "blip".to_string(),
        })
        .unwrap();
    agent_said(&senders[2], "Are you there?");
    harness.expect_media().await;

    assert_eq!(stt.opens.load(Ordering::SeqCst), 3);
    let (outcome, _dir) = harness.stop().await;
    assert_eq!(outcome.reason, EndReason::ProviderStopped);
}

#[tokio::test(start_paused = true)]
async fn end_call_marker_is_stripped_and_triggers_hangup() {
    let (stt, senders) = FakeStt::with_sessions(1);
    let tts = FakeTts::new(2);
    let dialogue = FakeDialogue::replying(&["Thank you, bye! [END_CALL]"]);
    let mut harness = Harness::start(stt, tts.clone(), dialogue, settings());

    agent_said(&senders[0], "You're all set for Tuesday at 9.");

    for _ in 0..2 {
        harness.expect_media().await;
    }
    assert_eq!(tts.calls(), vec!["Thank you, bye!".to_string()]);
    assert_eq!(harness.next_command().await, LegCommand::Hangup);

    let (outcome, _dir) = harness.stop().await;
    let transcript = read_transcript(&outcome.transcript.unwrap().json).unwrap();
    assert_eq!(transcript.turns[1].text, "Thank you, bye!");
}

#[tokio::test(start_paused = true)]
async fn a_synthesis_stream_drop_is_retried_once() {
    let (stt, senders) = FakeStt::with_sessions(1);
    let tts = FakeTts::new(1);
    tts.fail_next_stream.store(true, Ordering::SeqCst);
    let dialogue = FakeDialogue::replying(&["Can you hear me now?"]);
    let mut harness = Harness::start(stt, tts.clone(), dialogue, settings());

    agent_said(&senders[0], "Hello, this line is breaking up.");

    // First stream fails mid-utterance; the retry synthesizes the same
    // text again and plays through.
    harness.expect_media().await;
    harness.expect_media().await;
    assert_eq!(
        tts.calls(),
        vec![
            "Can you hear me now?".to_string(),
            "Can you hear me now?".to_string()
        ]
    );

    let (outcome, _dir) = harness.stop().await;
    assert_eq!(outcome.reason, EndReason::ProviderStopped);
}

#[tokio::test(start_paused = true)]
async fn exceeding_max_duration_hangs_up_and_flushes() {
    let (stt, _senders) = FakeStt::with_sessions(1);
    let tts = FakeTts::new(1);
    let dialogue = FakeDialogue::replying(&[]);
    let mut harness = Harness::start(
        stt,
        tts,
        dialogue,
        BridgeSettings {
            max_call_duration: Duration::from_secs(3),
            keepalive_interval: Duration::from_secs(60),
            ..settings()
        },
    );

    assert_eq!(harness.next_command().await, LegCommand::Hangup);
    let outcome = harness.run.await.expect("bridge task panicked");
    assert_eq!(outcome.reason, EndReason::MaxDurationReached);
    assert!(outcome.transcript.is_some());
}
