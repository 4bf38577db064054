//! HTTP/WebSocket server for the callsim harness.
//!
//! Hosts the REST surface the test runner drives (`/make-call`,
//! `/call-status`, `/scenarios`, `/health`) and the `/media-stream`
//! WebSocket the telephony provider connects once a call is answered.
//! Each media-stream connection is handed to a fresh [`callsim_bridge::CallBridge`];
//! nothing about a call outlives its connection.

pub mod api;
pub mod config;
pub mod media;

use axum::routing::{get, post};
use axum::{Extension, Router};
use callsim_dialogue::{DialogueGenerator, OpenAiDialogue};
use callsim_telephony::CallManager;
use callsim_voice::{DeepgramStt, DeepgramTts, SpeechSynthesizer, SpeechToText};
use config::Config;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared server state. Provider clients are built once at startup; every
/// call session borrows them through the `Arc`.
pub struct AppState {
    pub config: Config,
    pub telephony: CallManager,
    pub stt: Arc<dyn SpeechToText>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub dialogue: Arc<dyn DialogueGenerator>,
}

impl AppState {
    /// Builds the state with the real provider clients from `config`.
    pub fn from_config(config: Config) -> Self {
        let telephony = CallManager::new(config.telephony.clone());
        let stt = Arc::new(DeepgramStt::new(config.speech.clone()));
        let tts = Arc::new(DeepgramTts::new(config.synthesis.clone()));
        let dialogue = Arc::new(OpenAiDialogue::new(config.dialogue.clone()));
        Self {
            config,
            telephony,
            stt,
            tts,
            dialogue,
        }
    }
}

/// Builds the application router with all routes.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/scenarios", get(api::list_scenarios))
        .route("/make-call", post(api::make_call))
        .route("/call-status/{call_sid}", get(api::call_status))
        .route("/call-status", post(api::call_status_webhook))
        .route("/media-stream", get(media::media_stream_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}
