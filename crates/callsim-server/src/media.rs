//! The telephony media-stream leg.
//!
//! The provider connects here when an outbound call is answered. Wire
//! events arrive as JSON text frames: `connected`, then `start` (stream
//! metadata plus the custom parameters from the TwiML), then a `media`
//! event per 20 ms of inbound audio, then `stop`. Outbound audio goes back
//! as base64 `media` events paced at one frame per 20 ms; `clear` tells
//! the provider to drop buffered playback on barge-in.
//!
//! This module only adapts the wire protocol to the bridge's leg messages.
//! All conversation logic lives in `callsim_bridge`.

use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::Extension;
use axum::response::IntoResponse;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use callsim_bridge::{CallBridge, LegCommand, LegEvent};
use callsim_transcript::TranscriptRecorder;
use callsim_types::FRAME_MILLIS;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Inbound wire events from the provider.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum WireEvent {
    Connected {},
    Start { start: StartMeta },
    Media { media: MediaPayload },
    Stop {},
    #[serde(other)]
    Other,
}

/// Metadata delivered with the `start` event.
#[derive(Debug, Deserialize)]
pub struct StartMeta {
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
    #[serde(rename = "callSid", default)]
    pub call_sid: Option<String>,
    /// Parameters set on the TwiML `<Stream>`; carries `scenario_id`.
    #[serde(rename = "customParameters", default)]
    pub custom_parameters: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded μ-law audio.
    pub payload: String,
}

/// Outbound wire events to the provider.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum OutboundEvent<'a> {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: &'a str,
        media: OutboundMedia,
    },
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: &'a str,
    },
}

#[derive(Debug, Serialize)]
struct OutboundMedia {
    payload: String,
}

fn media_message(stream_sid: &str, frame: &[u8]) -> String {
    serde_json::to_string(&OutboundEvent::Media {
        stream_sid,
        media: OutboundMedia {
            payload: BASE64.encode(frame),
        },
    })
    .expect("outbound media event serializes")
}

fn clear_message(stream_sid: &str) -> String {
    serde_json::to_string(&OutboundEvent::Clear { stream_sid })
        .expect("outbound clear event serializes")
}

/// WebSocket handler: `GET /media-stream`.
pub async fn media_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_media_stream(socket, state))
}

async fn handle_media_stream(socket: WebSocket, state: Arc<AppState>) {
    info!("telephony media stream connected");
    let (sender, mut receiver) = socket.split();

    // The provider sends `connected` first, then `start` with metadata.
    let start = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<WireEvent>(&text) {
                Ok(WireEvent::Start { start }) => break start,
                Ok(WireEvent::Connected {}) => debug!("media protocol connected"),
                Ok(WireEvent::Stop {}) => {
                    warn!("stream stopped before start event");
                    return;
                }
                Ok(_) => {}
                Err(e) => warn!("unparseable initial event: {e}"),
            },
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                warn!("stream closed before start event");
                return;
            }
            Some(Ok(_)) => {}
        }
    };

    let requested = start
        .custom_parameters
        .get("scenario_id")
        .map(String::as_str)
        .unwrap_or_default();
    let scenario = match callsim_scenarios::get(requested) {
        Ok(scenario) => scenario,
        Err(e) => {
            // The call is already ringing; a transcript against the default
            // persona beats dropping it.
            warn!("{e}, using default scenario");
            &callsim_scenarios::all()[0]
        }
    };

    let call_sid = start.call_sid.clone().unwrap_or_else(|| "unknown".to_string());
    info!(
        scenario = scenario.id,
        stream_sid = %start.stream_sid,
        call_sid = %call_sid,
        "call started"
    );

    let recorder = TranscriptRecorder::new(
        &state.config.transcripts.root,
        &call_sid,
        scenario.id,
        scenario.name,
    );
    let (bridge, leg_events, leg_commands) = CallBridge::new(
        scenario,
        state.config.bridge_settings(),
        state.stt.clone(),
        state.tts.clone(),
        state.dialogue.clone(),
        recorder,
    );

    let bridge_task = tokio::spawn(bridge.run());
    let rx_task = tokio::spawn(relay_inbound(receiver, leg_events));
    let tx_task = tokio::spawn(relay_outbound(
        sender,
        leg_commands,
        start.stream_sid.clone(),
        call_sid.clone(),
        state.clone(),
    ));

    match bridge_task.await {
        Ok(outcome) => {
            info!(
                call_sid = %call_sid,
                reason = ?outcome.reason,
                transcript = %outcome
                    .transcript
                    .as_ref()
                    .map(|t| t.json.display().to_string())
                    .unwrap_or_default(),
                "media stream finished"
            );
        }
        Err(e) => warn!("bridge task failed: {e}"),
    }

    rx_task.abort();
    tx_task.abort();
}

/// Provider → bridge: decodes media frames and forwards stream lifecycle.
async fn relay_inbound(mut receiver: SplitStream<WebSocket>, leg_events: mpsc::Sender<LegEvent>) {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<WireEvent>(&text) {
                Ok(WireEvent::Media { media }) => match BASE64.decode(media.payload.as_bytes()) {
                    Ok(frame) => {
                        if leg_events.send(LegEvent::Media(frame)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("undecodable media payload: {e}"),
                },
                Ok(WireEvent::Stop {}) => {
                    info!("provider stopped the media stream");
                    let _ = leg_events.send(LegEvent::Stop).await;
                    return;
                }
                Ok(_) => {}
                Err(e) => debug!("ignoring unparseable wire event: {e}"),
            },
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
    let _ = leg_events.send(LegEvent::Stop).await;
}

/// Bridge → provider: paces media at one frame per 20 ms and executes
/// control commands.
async fn relay_outbound(
    mut sender: SplitSink<WebSocket, Message>,
    mut leg_commands: mpsc::Receiver<LegCommand>,
    stream_sid: String,
    call_sid: String,
    state: Arc<AppState>,
) {
    let mut pace = tokio::time::interval(Duration::from_millis(FRAME_MILLIS));
    pace.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    while let Some(command) = leg_commands.recv().await {
        match command {
            LegCommand::Media(frame) => {
                pace.tick().await;
                let msg = media_message(&stream_sid, &frame);
                if sender.send(Message::Text(msg.into())).await.is_err() {
                    return;
                }
            }
            LegCommand::Clear => {
                let msg = clear_message(&stream_sid);
                if sender.send(Message::Text(msg.into())).await.is_err() {
                    return;
                }
            }
            LegCommand::Hangup => {
                if let Err(e) = state.telephony.hangup(&call_sid).await {
                    warn!(call_sid = %call_sid, "failed to hang up call: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_event_parses_stream_metadata_and_parameters() {
        let raw = r#"{
            "event": "start",
            "sequenceNumber": "1",
            "start": {
                "streamSid": "MZ123",
                "callSid": "CA456",
                "customParameters": {"scenario_id": "billing_question"}
            }
        }"#;
        match serde_json::from_str::<WireEvent>(raw).unwrap() {
            WireEvent::Start { start } => {
                assert_eq!(start.stream_sid, "MZ123");
                assert_eq!(start.call_sid.as_deref(), Some("CA456"));
                assert_eq!(
                    start.custom_parameters.get("scenario_id").unwrap(),
                    "billing_question"
                );
            }
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn media_event_round_trips_base64_audio() {
        let frame = vec![0x7Fu8; 160];
        let raw = format!(
            r#"{{"event": "media", "media": {{"payload": "{}"}}}}"#,
            BASE64.encode(&frame)
        );
        match serde_json::from_str::<WireEvent>(&raw).unwrap() {
            WireEvent::Media { media } => {
                assert_eq!(BASE64.decode(media.payload).unwrap(), frame);
            }
            other => panic!("expected media, got {other:?}"),
        }
    }

    #[test]
    fn unknown_wire_events_parse_as_other() {
        let raw = r#"{"event": "mark", "mark": {"name": "x"}}"#;
        assert!(matches!(
            serde_json::from_str::<WireEvent>(raw).unwrap(),
            WireEvent::Other
        ));
    }

    #[test]
    fn outbound_media_carries_sid_and_payload() {
        let json: serde_json::Value =
            serde_json::from_str(&media_message("MZ9", &[1, 2, 3])).unwrap();
        assert_eq!(json["event"], "media");
        assert_eq!(json["streamSid"], "MZ9");
        assert_eq!(
            BASE64.decode(json["media"]["payload"].as_str().unwrap()).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn outbound_clear_targets_the_stream() {
        let json: serde_json::Value = serde_json::from_str(&clear_message("MZ9")).unwrap();
        assert_eq!(json["event"], "clear");
        assert_eq!(json["streamSid"], "MZ9");
    }
}
