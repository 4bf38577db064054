//! Outbound call management against the Twilio REST API.
//!
//! Placing a call is fire-and-forget: the interesting part of the call
//! happens later, when the provider connects its media stream to the
//! server's WebSocket endpoint. The TwiML handed to the provider wires the
//! answered call to that endpoint and tags it with the scenario id.
//!
//! Errors here are transport or API failures (bad credentials, invalid
//! number, exhausted quota). They are reported, never retried - retry
//! policy belongs to the caller.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use tracing::info;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Seconds to let the target ring before giving up.
const ANSWER_TIMEOUT_SECS: u32 = 30;

#[derive(Debug, Error)]
pub enum TelephonyError {
    #[error("telephony transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telephony API rejected the request ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Twilio account settings plus the number under test.
#[derive(Clone, Deserialize)]
pub struct TelephonyConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    /// The caller id calls are placed from.
    #[serde(default)]
    pub from_number: String,
    /// The agent under test.
    #[serde(default)]
    pub target_number: String,
    /// Hard provider-side cap on call length, in seconds.
    #[serde(default = "default_max_call_duration")]
    pub max_call_duration_secs: u32,
}

fn default_max_call_duration() -> u32 {
    180
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            target_number: String::new(),
            max_call_duration_secs: default_max_call_duration(),
        }
    }
}

impl fmt::Debug for TelephonyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelephonyConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .field("target_number", &self.target_number)
            .field("max_call_duration_secs", &self.max_call_duration_secs)
            .finish()
    }
}

/// Call statuses after which a call will never progress further.
pub fn is_terminal_status(status: &str) -> bool {
    matches!(
        status,
        "completed" | "failed" | "busy" | "no-answer" | "canceled"
    )
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Builds the TwiML that connects an answered call to the media-stream
/// endpoint, carrying the scenario id as a custom stream parameter.
fn stream_twiml(public_url: &str, scenario_id: &str) -> String {
    let host = public_url
        .trim_end_matches('/')
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <Response><Connect>\
         <Stream url=\"wss://{host}/media-stream\">\
         <Parameter name=\"scenario_id\" value=\"{}\"/>\
         </Stream>\
         </Connect></Response>",
        xml_escape(scenario_id)
    )
}

#[derive(Deserialize)]
struct CallResource {
    sid: String,
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Places and controls outbound calls.
#[derive(Debug, Clone)]
pub struct CallManager {
    http: reqwest::Client,
    config: TelephonyConfig,
}

impl CallManager {
    pub fn new(config: TelephonyConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Places a call to the target number and returns the provider call sid.
    ///
    /// `public_url` is the externally reachable base URL of this server; the
    /// provider fetches both the media stream and the status callback from
    /// it.
    pub async fn place_call(
        &self,
        public_url: &str,
        scenario_id: &str,
    ) -> Result<String, TelephonyError> {
        let twiml = stream_twiml(public_url, scenario_id);
        let status_callback = format!("{}/call-status", public_url.trim_end_matches('/'));
        let time_limit = self.config.max_call_duration_secs.to_string();
        let answer_timeout = ANSWER_TIMEOUT_SECS.to_string();

        info!(
            to = %self.config.target_number,
            scenario_id,
            "placing outbound call"
        );

        let response = self
            .http
            .post(format!(
                "{TWILIO_API_BASE}/Accounts/{}/Calls.json",
                self.config.account_sid
            ))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", self.config.target_number.as_str()),
                ("From", self.config.from_number.as_str()),
                ("Twiml", twiml.as_str()),
                ("Timeout", answer_timeout.as_str()),
                ("TimeLimit", time_limit.as_str()),
                ("Record", "true"),
                ("RecordingChannels", "dual"),
                ("StatusCallback", status_callback.as_str()),
                ("StatusCallbackEvent", "completed"),
            ])
            .send()
            .await?;

        let call: CallResource = check(response).await?.json().await?;
        info!(call_sid = %call.sid, "call created");
        Ok(call.sid)
    }

    /// Fetches the current status of a call.
    pub async fn call_status(&self, call_sid: &str) -> Result<String, TelephonyError> {
        let response = self
            .http
            .get(format!(
                "{TWILIO_API_BASE}/Accounts/{}/Calls/{call_sid}.json",
                self.config.account_sid
            ))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .send()
            .await?;

        let call: CallResource = check(response).await?.json().await?;
        Ok(call.status)
    }

    /// Ends a call in progress.
    pub async fn hangup(&self, call_sid: &str) -> Result<(), TelephonyError> {
        let response = self
            .http
            .post(format!(
                "{TWILIO_API_BASE}/Accounts/{}/Calls/{call_sid}.json",
                self.config.account_sid
            ))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("Status", "completed")])
            .send()
            .await?;

        check(response).await?;
        info!(call_sid, "call hung up");
        Ok(())
    }
}

/// Turns non-2xx responses into [`TelephonyError::Api`] with the provider's
/// message when one is present.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, TelephonyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ApiError>().await {
        Ok(body) if !body.message.is_empty() => body.message,
        _ => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    Err(TelephonyError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twiml_connects_the_stream_with_the_scenario_parameter() {
        let twiml = stream_twiml("https://example.ngrok.app", "prescription_refill");
        assert!(twiml.contains("<Stream url=\"wss://example.ngrok.app/media-stream\">"));
        assert!(twiml.contains("<Parameter name=\"scenario_id\" value=\"prescription_refill\"/>"));
        assert!(twiml.starts_with("<?xml"));
    }

    #[test]
    fn twiml_strips_scheme_and_trailing_slash() {
        let twiml = stream_twiml("http://localhost:8765/", "cancel_appointment");
        assert!(twiml.contains("wss://localhost:8765/media-stream"));
    }

    #[test]
    fn twiml_escapes_parameter_values() {
        let twiml = stream_twiml("https://h.example", "a\"<>&'b");
        assert!(twiml.contains("value=\"a&quot;&lt;&gt;&amp;&apos;b\""));
    }

    #[test]
    fn terminal_statuses_match_the_provider_set() {
        for status in ["completed", "failed", "busy", "no-answer", "canceled"] {
            assert!(is_terminal_status(status), "{status} should be terminal");
        }
        for status in ["queued", "ringing", "in-progress"] {
            assert!(!is_terminal_status(status), "{status} is not terminal");
        }
    }

    #[test]
    fn config_debug_redacts_the_auth_token() {
        let config = TelephonyConfig {
            account_sid: "AC123".into(),
            auth_token: "super-secret".into(),
            from_number: "+15550001111".into(),
            target_number: "+18054398008".into(),
            max_call_duration_secs: 180,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("AC123"));
    }
}
