//! Server configuration loading from file and environment variables.

use callsim_bridge::BridgeSettings;
use callsim_dialogue::DialogueConfig;
use callsim_telephony::TelephonyConfig;
use callsim_voice::{SpeechConfig, SynthesisConfig};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Telephony provider account and target number.
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// Streaming transcription settings.
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Speech synthesis settings.
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Dialogue generation settings.
    #[serde(default)]
    pub dialogue: DialogueConfig,

    /// Turn-taking policy knobs.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Transcript persistence settings.
    #[serde(default)]
    pub transcripts: TranscriptsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL the telephony provider calls back on.
    /// Resolved once at startup; there is no tunnel auto-detection.
    #[serde(default)]
    pub public_url: String,
}

/// Turn-taking policy, in config-file units.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_response_delay_ms")]
    pub response_delay_ms: u64,

    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,

    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    /// Spoken when dialogue generation fails or times out.
    #[serde(default = "default_fallback_utterance")]
    pub fallback_utterance: String,

    /// Spoken when the line has been silent past the keepalive interval.
    #[serde(default = "default_keepalive_prompt")]
    pub keepalive_prompt: String,
}

/// Transcript persistence settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptsConfig {
    /// Directory transcripts are written under, one subdirectory per
    /// scenario.
    #[serde(default = "default_transcripts_root")]
    pub root: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "callsim_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
}

fn default_port() -> u16 {
    8765
}

fn default_response_delay_ms() -> u64 {
    500
}

fn default_keepalive_interval_secs() -> u64 {
    10
}

fn default_generation_timeout_secs() -> u64 {
    15
}

fn default_fallback_utterance() -> String {
    "Sorry, could you repeat that?".to_string()
}

fn default_keepalive_prompt() -> String {
    "Hello? Are you still there?".to_string()
}

fn default_transcripts_root() -> PathBuf {
    PathBuf::from("transcripts")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: String::new(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            response_delay_ms: default_response_delay_ms(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            generation_timeout_secs: default_generation_timeout_secs(),
            fallback_utterance: default_fallback_utterance(),
            keepalive_prompt: default_keepalive_prompt(),
        }
    }
}

impl Default for TranscriptsConfig {
    fn default() -> Self {
        Self {
            root: default_transcripts_root(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Builds the per-call bridge policy from the config-file units.
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            response_delay: Duration::from_millis(self.bridge.response_delay_ms),
            keepalive_interval: Duration::from_secs(self.bridge.keepalive_interval_secs),
            max_call_duration: Duration::from_secs(self.telephony.max_call_duration_secs as u64),
            generation_timeout: Duration::from_secs(self.bridge.generation_timeout_secs),
            fallback_utterance: self.bridge.fallback_utterance.clone(),
            keepalive_prompt: self.bridge.keepalive_prompt.clone(),
            ..BridgeSettings::default()
        }
    }

    /// Returns the environment variables that are required but unset.
    ///
    /// The server refuses to start without provider credentials and a
    /// public callback URL - there is nothing useful it can do.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.telephony.account_sid.is_empty() {
            missing.push("TWILIO_ACCOUNT_SID");
        }
        if self.telephony.auth_token.is_empty() {
            missing.push("TWILIO_AUTH_TOKEN");
        }
        if self.telephony.from_number.is_empty() {
            missing.push("TWILIO_PHONE_NUMBER");
        }
        if self.speech.api_key.is_empty() {
            missing.push("DEEPGRAM_API_KEY");
        }
        if self.dialogue.api_key.is_empty() {
            missing.push("OPENAI_API_KEY");
        }
        if self.server.public_url.is_empty() {
            missing.push("PUBLIC_URL");
        }
        missing
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment variable overrides.
///
/// Environment overrides:
/// - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_PHONE_NUMBER`,
///   `TARGET_PHONE_NUMBER`, `MAX_CALL_DURATION` → `[telephony]`
/// - `DEEPGRAM_API_KEY`, `ENDPOINTING_MS`, `UTTERANCE_END_MS` → `[speech]`
///   (the key is shared with `[synthesis]`)
/// - `OPENAI_API_KEY`, `OPENAI_MODEL` → `[dialogue]`
/// - `CALLSIM_HOST`, `CALLSIM_PORT`, `PUBLIC_URL` → `[server]`
/// - `RESPONSE_DELAY_MS`, `KEEPALIVE_INTERVAL_SECS` → `[bridge]`
/// - `TRANSCRIPTS_DIR` → `[transcripts]`
/// - `CALLSIM_LOG_LEVEL`, `CALLSIM_LOG_JSON` → `[logging]`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(sid) = std::env::var("TWILIO_ACCOUNT_SID") {
        config.telephony.account_sid = sid;
    }
    if let Ok(token) = std::env::var("TWILIO_AUTH_TOKEN") {
        config.telephony.auth_token = token;
    }
    if let Ok(number) = std::env::var("TWILIO_PHONE_NUMBER") {
        config.telephony.from_number = number;
    }
    if let Ok(number) = std::env::var("TARGET_PHONE_NUMBER") {
        config.telephony.target_number = number;
    }
    if let Ok(secs) = std::env::var("MAX_CALL_DURATION") {
        if let Ok(parsed) = secs.parse() {
            config.telephony.max_call_duration_secs = parsed;
        }
    }
    if let Ok(key) = std::env::var("DEEPGRAM_API_KEY") {
        config.speech.api_key = key.clone();
        config.synthesis.api_key = key;
    }
    if let Ok(ms) = std::env::var("ENDPOINTING_MS") {
        if let Ok(parsed) = ms.parse() {
            config.speech.endpointing_ms = parsed;
        }
    }
    if let Ok(ms) = std::env::var("UTTERANCE_END_MS") {
        if let Ok(parsed) = ms.parse() {
            config.speech.utterance_end_ms = parsed;
        }
    }
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        config.dialogue.api_key = key;
    }
    if let Ok(model) = std::env::var("OPENAI_MODEL") {
        config.dialogue.model = model;
    }
    if let Ok(host) = std::env::var("CALLSIM_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("CALLSIM_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(url) = std::env::var("PUBLIC_URL") {
        config.server.public_url = url;
    }
    if let Ok(ms) = std::env::var("RESPONSE_DELAY_MS") {
        if let Ok(parsed) = ms.parse() {
            config.bridge.response_delay_ms = parsed;
        }
    }
    if let Ok(secs) = std::env::var("KEEPALIVE_INTERVAL_SECS") {
        if let Ok(parsed) = secs.parse() {
            config.bridge.keepalive_interval_secs = parsed;
        }
    }
    if let Ok(dir) = std::env::var("TRANSCRIPTS_DIR") {
        config.transcripts.root = PathBuf::from(dir);
    }
    if let Ok(level) = std::env::var("CALLSIM_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("CALLSIM_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let config = Config::default();
        assert_eq!(config.server.port, 8765);
        assert_eq!(config.bridge.response_delay_ms, 500);
        assert_eq!(config.telephony.max_call_duration_secs, 180);
        assert_eq!(config.transcripts.root, PathBuf::from("transcripts"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_toml_parses_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9000
            public_url = "https://example.ngrok.app"

            [speech]
            api_key = "dg"
            endpointing_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.speech.endpointing_ms, 250);
        assert_eq!(config.speech.utterance_end_ms, 1_200);
        assert_eq!(config.bridge.keepalive_interval_secs, 10);
    }

    #[test]
    fn missing_required_names_each_absent_credential() {
        let missing = Config::default().missing_required();
        assert!(missing.contains(&"TWILIO_ACCOUNT_SID"));
        assert!(missing.contains(&"DEEPGRAM_API_KEY"));
        assert!(missing.contains(&"OPENAI_API_KEY"));
        assert!(missing.contains(&"PUBLIC_URL"));
    }

    #[test]
    fn bridge_settings_use_config_units() {
        let mut config = Config::default();
        config.bridge.response_delay_ms = 250;
        config.telephony.max_call_duration_secs = 60;

        let settings = config.bridge_settings();
        assert_eq!(settings.response_delay, Duration::from_millis(250));
        assert_eq!(settings.max_call_duration, Duration::from_secs(60));
        assert_eq!(settings.keepalive_interval, Duration::from_secs(10));
    }
}
