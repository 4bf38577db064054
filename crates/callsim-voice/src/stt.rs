//! Streaming speech-to-text over the Deepgram listen WebSocket.
//!
//! Audio is pushed through a bounded queue and relayed to the provider by a
//! background task; transcription results come back as [`SttEvent`]s on a
//! channel the caller drains. If the provider connection stalls, frames are
//! dropped at the queue boundary and a single [`SttEvent::Stalled`] is
//! surfaced per episode rather than an error, so the caller can decide
//! whether to restart the session.

use crate::config::SpeechConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bounded inbound-audio queue: 64 frames is ~1.3 s of call audio. Frames
/// past this are dropped, never queued.
const AUDIO_QUEUE_FRAMES: usize = 64;

/// Capacity of the outbound event channel.
const EVENT_QUEUE: usize = 256;

/// Interval for protocol-level keepalive messages; Deepgram times idle
/// connections out after ~10 s of silence.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(8);

const KEEPALIVE_MESSAGE: &str = "{\"type\":\"KeepAlive\"}";
const CLOSE_MESSAGE: &str = "{\"type\":\"CloseStream\"}";

/// Transcription events, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SttEvent {
    /// Interim hypothesis; text will still change.
    Partial(String),
    /// Finalized segment. `speech_final` means the provider also detected
    /// the end of the utterance via its endpointing silence threshold.
    Final { text: String, speech_final: bool },
    /// Long-silence signal: the speaker is done even though no new final
    /// segment arrived.
    UtteranceEnd,
    /// The feed queue overflowed and frames were dropped.
    Stalled,
    /// The provider connection is gone.
    Closed { reason: String },
}

/// Opens streaming transcription sessions.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Opens a session, returning the feed handle and the event stream.
    async fn open(&self) -> Result<(Box<dyn SttHandle>, mpsc::Receiver<SttEvent>), VoiceError>;
}

/// The caller-facing side of an open transcription session.
pub trait SttHandle: Send {
    /// Forwards one audio frame. Non-blocking; drops the frame if the
    /// session's queue is full.
    fn feed(&self, frame: &[u8]);

    /// Asks the provider to flush and tears the session down.
    fn close(&self);
}

/// Deepgram streaming STT client.
#[derive(Debug, Clone)]
pub struct DeepgramStt {
    config: SpeechConfig,
}

impl DeepgramStt {
    pub fn new(config: SpeechConfig) -> Self {
        Self { config }
    }
}

fn listen_url(config: &SpeechConfig) -> String {
    format!(
        "wss://api.deepgram.com/v1/listen?encoding=mulaw&sample_rate=8000&channels=1\
         &model={}&punctuate=true&interim_results=true&vad_events=true\
         &endpointing={}&utterance_end_ms={}",
        config.model, config.endpointing_ms, config.utterance_end_ms
    )
}

#[async_trait]
impl SpeechToText for DeepgramStt {
    async fn open(&self) -> Result<(Box<dyn SttHandle>, mpsc::Receiver<SttEvent>), VoiceError> {
        let mut request = listen_url(&self.config).into_client_request()?;
        request.headers_mut().insert(
            "Authorization",
            format!("Token {}", self.config.api_key)
                .parse()
                .map_err(|_| VoiceError::Config("API key is not a valid header value".into()))?,
        );

        let (ws, _) = connect_async(request).await?;
        info!(model = %self.config.model, "speech-to-text session connected");

        let (sink, mut stream) = ws.split();
        let (audio_tx, audio_rx) = mpsc::channel::<Vec<u8>>(AUDIO_QUEUE_FRAMES);
        let (event_tx, event_rx) = mpsc::channel::<SttEvent>(EVENT_QUEUE);
        let shutdown = CancellationToken::new();

        tokio::spawn(relay_audio(sink, audio_rx, shutdown.clone()));

        let recv_events = event_tx.clone();
        let recv_shutdown = shutdown.clone();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Some(event) = parse_listen_message(&text) {
                            if recv_events.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("speech-to-text stream closed by provider");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("speech-to-text receive error: {e}");
                        break;
                    }
                }
            }
            if !recv_shutdown.is_cancelled() {
                let _ = recv_events
                    .send(SttEvent::Closed {
                        reason: "transcription stream ended".to_string(),
                    })
                    .await;
            }
        });

        let handle = DeepgramSttHandle {
            audio_tx,
            event_tx,
            stalled: Arc::new(AtomicBool::new(false)),
            shutdown,
        };
        Ok((Box::new(handle), event_rx))
    }
}

/// Owns the WebSocket sink: forwards queued audio, keeps the connection
/// alive while idle, and sends the provider's close message on shutdown.
async fn relay_audio<S>(mut sink: S, mut audio_rx: mpsc::Receiver<Vec<u8>>, shutdown: CancellationToken)
where
    S: Sink<Message> + Unpin + Send,
{
    let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
    keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = audio_rx.recv() => match frame {
                Some(frame) => {
                    if sink.send(Message::binary(frame)).await.is_err() {
                        return;
                    }
                }
                None => break,
            },
            _ = keepalive.tick() => {
                if sink.send(Message::text(KEEPALIVE_MESSAGE)).await.is_err() {
                    return;
                }
            }
        }
    }

    let _ = sink.send(Message::text(CLOSE_MESSAGE)).await;
    let _ = sink.close().await;
}

struct DeepgramSttHandle {
    audio_tx: mpsc::Sender<Vec<u8>>,
    event_tx: mpsc::Sender<SttEvent>,
    stalled: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl SttHandle for DeepgramSttHandle {
    fn feed(&self, frame: &[u8]) {
        match self.audio_tx.try_send(frame.to_vec()) {
            Ok(()) => {
                self.stalled.store(false, Ordering::Relaxed);
            }
            Err(_) => {
                // Dropping is the contract: never queue past the bound.
                // Surface the stall once per episode.
                if !self.stalled.swap(true, Ordering::Relaxed) {
                    warn!("speech-to-text feed queue full, dropping frames");
                    let _ = self.event_tx.try_send(SttEvent::Stalled);
                }
            }
        }
    }

    fn close(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for DeepgramSttHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[derive(Deserialize)]
struct ResultsAlternative {
    #[serde(default)]
    transcript: String,
}

#[derive(Deserialize)]
struct ResultsChannel {
    #[serde(default)]
    alternatives: Vec<ResultsAlternative>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ListenMessage {
    Results {
        channel: ResultsChannel,
        #[serde(default)]
        is_final: bool,
        #[serde(default)]
        speech_final: bool,
    },
    UtteranceEnd {},
    #[serde(other)]
    Other,
}

/// Maps one provider message to an [`SttEvent`]. Empty transcripts and
/// message types this client does not care about map to `None`.
fn parse_listen_message(raw: &str) -> Option<SttEvent> {
    match serde_json::from_str::<ListenMessage>(raw).ok()? {
        ListenMessage::Results {
            channel,
            is_final,
            speech_final,
        } => {
            let text = channel
                .alternatives
                .into_iter()
                .next()?
                .transcript
                .trim()
                .to_string();
            if text.is_empty() {
                return None;
            }
            Some(if is_final {
                SttEvent::Final { text, speech_final }
            } else {
                SttEvent::Partial(text)
            })
        }
        ListenMessage::UtteranceEnd {} => Some(SttEvent::UtteranceEnd),
        ListenMessage::Other => None,
    }
}
