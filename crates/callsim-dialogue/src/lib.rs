//! Patient dialogue generation.
//!
//! Given the persona prompt and the turns so far, asks a chat-completions
//! endpoint for the next patient utterance. The generator is stateless per
//! call; everything it knows arrives in the request. Callers treat it as a
//! black box with a bounded latency expectation - the call bridge imposes
//! the timeout and substitutes a fallback utterance on failure, so a slow
//! or broken model never stalls a live call.
//!
//! Replies may carry the [`END_CALL_MARKER`], which the persona rules tell
//! the model to append when the conversation has reached its natural end.

use async_trait::async_trait;
use callsim_transcript::TurnRecord;
use callsim_types::Speaker;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Replies are spoken aloud; cap them to phone-call length.
const MAX_REPLY_TOKENS: u32 = 200;

/// Some variance keeps the personas from sounding scripted.
const TEMPERATURE: f32 = 0.8;

/// Marker the persona appends to its final line of the call.
pub const END_CALL_MARKER: &str = "[END_CALL]";

#[derive(Debug, Error)]
pub enum DialogueError {
    #[error("dialogue provider error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("dialogue provider returned an empty reply")]
    Empty,
}

/// Produces the next patient utterance from persona + history.
#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    async fn next_utterance(
        &self,
        system_prompt: &str,
        turns: &[TurnRecord],
    ) -> Result<String, DialogueError>;
}

/// Splits the end-of-call marker off a reply.
///
/// Returns the cleaned text and whether the marker was present anywhere in
/// the reply.
pub fn strip_end_call(reply: &str) -> (String, bool) {
    let ends = reply.contains(END_CALL_MARKER);
    let clean = reply.replace(END_CALL_MARKER, "").trim().to_string();
    (clean, ends)
}

/// Chat-completions configuration.
#[derive(Clone, Deserialize)]
pub struct DialogueConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
        }
    }
}

impl fmt::Debug for DialogueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogueConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Maps the call so far onto chat roles: the agent under test speaks as
/// `user`, our patient as `assistant`.
fn build_messages<'a>(system_prompt: &'a str, turns: &'a [TurnRecord]) -> Vec<ChatMessage<'a>> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    messages.push(ChatMessage {
        role: "system",
        content: system_prompt,
    });
    for turn in turns {
        messages.push(ChatMessage {
            role: match turn.speaker {
                Speaker::Agent => "user",
                Speaker::Patient => "assistant",
            },
            content: &turn.text,
        });
    }
    messages
}

/// OpenAI chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiDialogue {
    http: reqwest::Client,
    config: DialogueConfig,
}

impl OpenAiDialogue {
    pub fn new(config: DialogueConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl DialogueGenerator for OpenAiDialogue {
    async fn next_utterance(
        &self,
        system_prompt: &str,
        turns: &[TurnRecord],
    ) -> Result<String, DialogueError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: build_messages(system_prompt, turns),
            max_tokens: MAX_REPLY_TOKENS,
            temperature: TEMPERATURE,
        };

        let response: ChatResponse = self
            .http
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(DialogueError::Empty);
        }
        debug!(chars = text.len(), "generated patient reply");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn turn(speaker: Speaker, text: &str) -> TurnRecord {
        TurnRecord {
            speaker,
            text: text.to_string(),
            timestamp: Utc::now(),
            audio_duration_ms: None,
        }
    }

    #[test]
    fn history_maps_agent_to_user_and_patient_to_assistant() {
        let turns = vec![
            turn(Speaker::Agent, "Thank you for calling, how can I help?"),
            turn(Speaker::Patient, "I need to cancel my appointment."),
            turn(Speaker::Agent, "Which day was it?"),
        ];
        let messages = build_messages("persona", &turns);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "persona");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3].role, "user");
        assert_eq!(messages[3].content, "Which day was it?");
    }

    #[test]
    fn chat_request_serializes_the_expected_shape() {
        let turns = vec![turn(Speaker::Agent, "Hello?")];
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: build_messages("persona", &turns),
            max_tokens: MAX_REPLY_TOKENS,
            temperature: TEMPERATURE,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 200);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello?");
    }

    #[test]
    fn strip_end_call_detects_and_removes_the_marker() {
        let (clean, ends) = strip_end_call("Thanks so much, bye! [END_CALL]");
        assert!(ends);
        assert_eq!(clean, "Thanks so much, bye!");

        let (clean, ends) = strip_end_call("What time works?");
        assert!(!ends);
        assert_eq!(clean, "What time works?");
    }

    #[test]
    fn strip_end_call_handles_marker_only_replies() {
        let (clean, ends) = strip_end_call("[END_CALL]");
        assert!(ends);
        assert!(clean.is_empty());
    }

    #[test]
    fn config_debug_redacts_the_key() {
        let config = DialogueConfig {
            api_key: "sk-secret".into(),
            model: default_model(),
        };
        assert!(!format!("{config:?}").contains("sk-secret"));
    }
}
