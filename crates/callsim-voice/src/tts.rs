//! Streaming text-to-speech over the Deepgram speak endpoint.
//!
//! Synthesis is requested once per utterance; the provider streams encoded
//! audio back over chunked HTTP, which a background task re-slices into
//! 20 ms μ-law wire frames. The first frame is available as soon as the
//! provider produces it. Cancelling a stream stops production within one
//! frame; frames already handed to the call leg are not recalled, and
//! frames still buffered in the stream are discarded, never forwarded.

use crate::config::SynthesisConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use callsim_types::{FrameChunker, FRAME_BYTES, MULAW_SILENCE};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const SPEAK_URL: &str = "https://api.deepgram.com/v1/speak";

/// End-to-end budget for one synthesis request, body included.
const SYNTH_TIMEOUT: Duration = Duration::from_secs(20);

/// Frame buffer between the producer task and the consumer. 256 frames is
/// ~5 s of audio; the producer backpressures on the channel beyond that.
const FRAME_QUEUE: usize = 256;

/// Opens synthesis streams.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Starts synthesizing `text` in the given voice. Frames arrive on the
    /// returned stream as the provider produces them.
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesisStream, VoiceError>;
}

/// A finite, non-restartable stream of wire frames for one utterance.
#[derive(Debug)]
pub struct SynthesisStream {
    frames: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
    failed: Arc<AtomicBool>,
}

impl SynthesisStream {
    pub fn new(
        frames: mpsc::Receiver<Vec<u8>>,
        cancel: CancellationToken,
        failed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            frames,
            cancel,
            failed,
        }
    }

    /// Returns the next frame, or `None` once the utterance is complete,
    /// the stream was cancelled, or the producer failed.
    ///
    /// After cancellation, frames still buffered in the channel are drained
    /// and dropped rather than returned.
    pub async fn next_frame(&mut self) -> Option<Vec<u8>> {
        if self.cancel.is_cancelled() {
            self.discard_buffered();
            return None;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => {
                self.discard_buffered();
                None
            }
            frame = self.frames.recv() => frame,
        }
    }

    /// Stops synthesis. Safe to call from another task via
    /// [`cancel_token`](Self::cancel_token).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that cancels this stream when triggered.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True if the provider connection dropped before the utterance
    /// finished.
    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    fn discard_buffered(&mut self) {
        self.frames.close();
        while self.frames.try_recv().is_ok() {}
    }
}

/// Deepgram speak client.
#[derive(Debug, Clone)]
pub struct DeepgramTts {
    http: reqwest::Client,
    config: SynthesisConfig,
}

impl DeepgramTts {
    pub fn new(config: SynthesisConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

fn speak_params(voice: &str) -> [(&'static str, &str); 4] {
    [
        ("model", voice),
        ("encoding", "mulaw"),
        ("sample_rate", "8000"),
        ("container", "none"),
    ]
}

#[async_trait]
impl SpeechSynthesizer for DeepgramTts {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesisStream, VoiceError> {
        let voice = if voice.is_empty() {
            &self.config.default_voice
        } else {
            voice
        };
        let response = self
            .http
            .post(SPEAK_URL)
            .query(&speak_params(voice))
            .header("Authorization", format!("Token {}", self.config.api_key))
            .json(&serde_json::json!({ "text": text }))
            .timeout(SYNTH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        debug!(voice, chars = text.len(), "synthesis stream opened");

        let cancel = CancellationToken::new();
        let failed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<Vec<u8>>(FRAME_QUEUE);

        let producer_cancel = cancel.clone();
        let producer_failed = failed.clone();
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut chunker = FrameChunker::new();
            loop {
                tokio::select! {
                    _ = producer_cancel.cancelled() => return,
                    chunk = body.next() => match chunk {
                        Some(Ok(chunk)) => {
                            for frame in chunker.push(&chunk) {
                                if tx.send(frame).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            warn!("synthesis stream dropped mid-utterance: {e}");
                            producer_failed.store(true, Ordering::Relaxed);
                            return;
                        }
                        None => break,
                    }
                }
            }
            // Pad the trailing short frame to wire size with silence.
            if let Some(mut tail) = chunker.flush() {
                tail.resize(FRAME_BYTES, MULAW_SILENCE);
                let _ = tx.send(tail).await;
            }
        });

        Ok(SynthesisStream::new(rx, cancel, failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_with_frames(frames: Vec<Vec<u8>>) -> (SynthesisStream, mpsc::Sender<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(16);
        for frame in frames {
            tx.try_send(frame).unwrap();
        }
        let stream = SynthesisStream::new(rx, CancellationToken::new(), Arc::default());
        (stream, tx)
    }

    #[tokio::test]
    async fn frames_flow_until_the_producer_finishes() {
        let (mut stream, tx) = stream_with_frames(vec![vec![1u8; 160], vec![2u8; 160]]);
        drop(tx);

        assert_eq!(stream.next_frame().await.unwrap()[0], 1);
        assert_eq!(stream.next_frame().await.unwrap()[0], 2);
        assert!(stream.next_frame().await.is_none());
        assert!(!stream.is_cancelled());
        assert!(!stream.failed());
    }

    #[tokio::test]
    async fn cancel_discards_buffered_frames() {
        let (mut stream, _tx) = stream_with_frames(vec![vec![1u8; 160], vec![2u8; 160]]);

        stream.cancel();
        assert!(stream.next_frame().await.is_none());
        assert!(stream.next_frame().await.is_none());
        assert!(stream.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_token_works_from_outside() {
        let (mut stream, _tx) = stream_with_frames(vec![vec![3u8; 160]]);
        let token = stream.cancel_token();

        token.cancel();
        assert!(stream.next_frame().await.is_none());
    }

    #[test]
    fn speak_params_request_telephony_audio() {
        let params = speak_params("aura-orion-en");
        assert!(params.contains(&("model", "aura-orion-en")));
        assert!(params.contains(&("encoding", "mulaw")));
        assert!(params.contains(&("sample_rate", "8000")));
        assert!(params.contains(&("container", "none")));
    }
}
