//! Axum handlers for `/api/*` routes.
//!
//! `generate` never signals failure through the status code: every outcome,
//! including a body that is not JSON, is a 200 with an [`Outcome`] envelope.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use super::AppState;
use crate::relay::Outcome;

/// Read `prompt` from the request body.
///
/// No validation: a missing field, a non-string value or an unparsable body
/// all yield an empty prompt, which is still relayed.
fn prompt_from_body(body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(v) => v
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Err(e) => {
            warn!("request body is not JSON: {e}");
            String::new()
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// POST /api/generate
pub(super) async fn generate(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = Uuid::now_v7();
    let span = info_span!("generate", %request_id);

    async move {
        let prompt = prompt_from_body(&body);
        info!(
            model = %state.relay.config().model,
            prompt_len = prompt.len(),
            "generate request"
        );

        let outcome: Outcome = state.relay.handle(&prompt).await;

        match (&outcome.error, outcome.error_kind) {
            (Some(error), Some(kind)) => warn!(?kind, %error, "generate failed"),
            _ => info!("generate succeeded"),
        }

        (StatusCode::OK, Json(outcome)).into_response()
    }
    .instrument(span)
    .await
}

/// GET /api/health
pub(super) async fn health(State(state): State<AppState>) -> Response {
    let cfg = state.relay.config();
    let body = json!({
        "status": "ok",
        "provider": state.relay.provider_name(),
        "model": cfg.model,
        "responseFormat": cfg.response_format.as_str(),
    });
    (StatusCode::OK, Json(body)).into_response()
}
