//! REST endpoints the test runner drives.

use crate::AppState;
use axum::extract::{Extension, Form, Path};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

/// Health check handler.
///
/// Returns `200 OK` with the resolved public URL so the runner can verify
/// the server is up and reachable by the provider.
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "public_url": state.config.server.public_url,
    }))
}

/// Lists the scenario catalog as id/name/description summaries.
pub async fn list_scenarios() -> Json<Value> {
    let summaries: Vec<Value> = callsim_scenarios::all()
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "name": s.name,
                "description": s.description,
            })
        })
        .collect();
    Json(Value::Array(summaries))
}

#[derive(Debug, Deserialize)]
pub struct MakeCallRequest {
    pub scenario_id: String,
}

/// `POST /make-call` - places a test call for one scenario.
///
/// The call itself is fire-and-forget: the conversation starts when the
/// provider connects back to `/media-stream`.
pub async fn make_call(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<MakeCallRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if callsim_scenarios::get(&request.scenario_id).is_err() {
        let available: Vec<&str> = callsim_scenarios::ids().collect();
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": format!("unknown scenario: {}", request.scenario_id),
                "available": available,
            })),
        ));
    }

    let call_sid = state
        .telephony
        .place_call(&state.config.server.public_url, &request.scenario_id)
        .await
        .map_err(|e| {
            error!(scenario_id = %request.scenario_id, "failed to place call: {e}");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": e.to_string() })),
            )
        })?;

    Ok(Json(json!({
        "call_sid": call_sid,
        "scenario_id": request.scenario_id,
        "status": "initiated",
    })))
}

/// `GET /call-status/{call_sid}` - proxies the provider's call status.
pub async fn call_status(
    Extension(state): Extension<Arc<AppState>>,
    Path(call_sid): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let status = state.telephony.call_status(&call_sid).await.map_err(|e| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("call not found: {e}") })),
        )
    })?;

    Ok(Json(json!({ "call_sid": call_sid, "status": status })))
}

#[derive(Debug, Deserialize)]
pub struct StatusCallback {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
    #[serde(rename = "CallStatus", default)]
    pub call_status: String,
    #[serde(rename = "CallDuration", default)]
    pub call_duration: String,
}

/// `POST /call-status` - the provider's status callback webhook.
pub async fn call_status_webhook(Form(callback): Form<StatusCallback>) -> Json<Value> {
    info!(
        call_sid = %callback.call_sid,
        status = %callback.call_status,
        duration_secs = %callback.call_duration,
        "call status callback"
    );
    Json(json!({ "status": "ok" }))
}
