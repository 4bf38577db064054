use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("failed to connect to speech provider: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("speech provider transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid voice configuration: {0}")]
    Config(String),
}
