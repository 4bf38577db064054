//! Speech provider clients for the callsim harness.
//!
//! Two streaming clients against Deepgram: a WebSocket speech-to-text
//! session that turns inbound call audio into utterance events, and a
//! chunked-HTTP text-to-speech stream that turns patient replies into
//! wire-sized μ-law frames.
//!
//! Both sit behind small trait seams ([`SpeechToText`],
//! [`SpeechSynthesizer`]) so the call bridge can be exercised with fakes;
//! the bridge never touches provider wire formats directly.

pub mod config;
pub mod error;
pub mod stt;
pub mod tts;

pub use config::{SpeechConfig, SynthesisConfig};
pub use error::VoiceError;
pub use stt::{DeepgramStt, SpeechToText, SttEvent, SttHandle};
pub use tts::{DeepgramTts, SpeechSynthesizer, SynthesisStream};
