use serde::Deserialize;
use std::fmt;

fn default_stt_model() -> String {
    "nova-2".to_string()
}

fn default_endpointing_ms() -> u32 {
    300
}

fn default_utterance_end_ms() -> u32 {
    1_200
}

fn default_voice() -> String {
    "aura-asteria-en".to_string()
}

/// Streaming transcription settings.
///
/// `endpointing_ms` is the silence before an in-progress utterance is
/// marked final; `utterance_end_ms` is the longer silence after which the
/// provider reports the speaker is done regardless of finality.
#[derive(Clone, Deserialize)]
pub struct SpeechConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_stt_model")]
    pub model: String,
    #[serde(default = "default_endpointing_ms")]
    pub endpointing_ms: u32,
    #[serde(default = "default_utterance_end_ms")]
    pub utterance_end_ms: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_stt_model(),
            endpointing_ms: default_endpointing_ms(),
            utterance_end_ms: default_utterance_end_ms(),
        }
    }
}

impl fmt::Debug for SpeechConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("endpointing_ms", &self.endpointing_ms)
            .field("utterance_end_ms", &self.utterance_end_ms)
            .finish()
    }
}

/// Speech synthesis settings. The voice itself is chosen per scenario; the
/// default is used for keepalive filler prompts and scenarios that do not
/// name one.
#[derive(Clone, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_voice")]
    pub default_voice: String,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            default_voice: default_voice(),
        }
    }
}

impl fmt::Debug for SynthesisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisConfig")
            .field("api_key", &"[REDACTED]")
            .field("default_voice", &self.default_voice)
            .finish()
    }
}
