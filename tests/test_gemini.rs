//! End-to-end tests against a fake Generative Language API served locally.
//!
//! The fake vendor picks its behaviour from the model id in the request path.

use axum::{
    Json, Router,
    extract::{Path, RawQuery},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use svg_relay::config::Config;
use svg_relay::llm::ResponseFormat;
use svg_relay::relay::{DataUrl, ErrorKind, Relay};
use svg_relay::server::{AppState, HttpChannel};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const API_KEY: &str = "test-key";

fn text_reply(parts: &[&str]) -> Response {
    let parts: Vec<Value> = parts.iter().map(|t| json!({ "text": t })).collect();
    Json(json!({
        "candidates": [{ "content": { "role": "model", "parts": parts }, "finishReason": "STOP" }]
    }))
    .into_response()
}

fn vendor_error(status: StatusCode, message: &str, vendor_status: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": status.as_u16(), "message": message, "status": vendor_status } })),
    )
        .into_response()
}

fn has_key(query: &Option<String>) -> bool {
    query.as_deref().is_some_and(|q| q.split('&').any(|kv| kv == format!("key={API_KEY}")))
}

async fn fake_generate(Path(call): Path<String>, RawQuery(query): RawQuery, Json(body): Json<Value>) -> Response {
    if !has_key(&query) {
        return vendor_error(StatusCode::BAD_REQUEST, "API key not valid.", "INVALID_ARGUMENT");
    }
    let Some(model) = call.strip_suffix(":generateContent") else {
        return vendor_error(StatusCode::NOT_FOUND, "unknown method", "NOT_FOUND");
    };
    match model {
        "gemini-ok" => text_reply(&["Here you go:\n```svg\n<svg viewBox=\"0 0 512 512\"><circle r=\"5\"/></svg>\n```"]),
        "gemini-split" => text_reply(&["<svg><rect/>", "</svg>"]),
        "gemini-json" => {
            if body["generationConfig"]["responseMimeType"] == "application/json" {
                text_reply(&[r#"{"svg_code":"<svg><rect width=\"1\"/></svg>"}"#])
            } else {
                text_reply(&["no format hint received"])
            }
        }
        "gemini-echo" => {
            let instruction = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default();
            text_reply(&[format!("<svg><desc>{instruction}</desc></svg>").as_str()])
        }
        "gemini-prose" => text_reply(&["I would rather not draw today."]),
        "gemini-empty" => Json(json!({ "candidates": [] })).into_response(),
        "gemini-denied" => vendor_error(StatusCode::FORBIDDEN, "Permission denied on resource.", "PERMISSION_DENIED"),
        other => vendor_error(
            StatusCode::NOT_FOUND,
            &format!("models/{other} is not found for API version v1, or is not supported for generateContent."),
            "NOT_FOUND",
        ),
    }
}

async fn fake_list(RawQuery(query): RawQuery) -> Response {
    if !has_key(&query) {
        return vendor_error(StatusCode::BAD_REQUEST, "API key not valid.", "INVALID_ARGUMENT");
    }
    Json(json!({
        "models": [
            { "name": "models/gemini-ok", "supportedGenerationMethods": ["generateContent", "countTokens"] },
            { "name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"] },
            { "name": "models/gemini-json", "supportedGenerationMethods": ["generateContent"] }
        ]
    }))
    .into_response()
}

async fn spawn_vendor() -> String {
    let app = Router::new()
        .route("/v1/models", get(fake_list))
        .route("/v1/models/{call}", post(fake_generate));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config_for(base_url: &str, model: &str) -> Config {
    let mut cfg = Config::test_default();
    cfg.llm.provider = "gemini".into();
    cfg.llm.gemini.api_base_url = base_url.to_string();
    cfg.llm.gemini.model = model.to_string();
    cfg.llm.gemini.timeout_seconds = 5;
    cfg.api_key = Some(API_KEY.to_string());
    cfg
}

async fn relay_for(model: &str) -> Relay {
    let base = spawn_vendor().await;
    Relay::from_config(&config_for(&base, model)).unwrap()
}

#[tokio::test]
async fn freeform_reply_is_extracted() {
    let url = relay_for("gemini-ok").await.generate("a cat").await.unwrap();
    assert_eq!(url, DataUrl::svg(r#"<svg viewBox="0 0 512 512"><circle r="5"/></svg>"#));
}

#[tokio::test]
async fn parts_are_concatenated() {
    let url = relay_for("gemini-split").await.generate("a box").await.unwrap();
    assert_eq!(url, DataUrl::svg("<svg><rect/></svg>"));
}

#[tokio::test]
async fn json_format_is_negotiated() {
    let base = spawn_vendor().await;
    let mut cfg = config_for(&base, "gemini-json");
    cfg.relay.response_format = ResponseFormat::Json;
    let relay = Relay::from_config(&cfg).unwrap();

    let url = relay.generate("a box").await.unwrap();
    assert_eq!(url, DataUrl::svg(r#"<svg><rect width="1"/></svg>"#));
}

#[tokio::test]
async fn text_format_sends_no_hint() {
    let err = relay_for("gemini-json").await.generate("a box").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Extraction);
}

#[tokio::test]
async fn instruction_carries_template_and_prompt() {
    let base = spawn_vendor().await;
    let mut cfg = config_for(&base, "gemini-echo");
    cfg.relay.system_prompt = "Be red.".into();
    let relay = Relay::from_config(&cfg).unwrap();

    let url = relay.generate("a cat").await.unwrap();
    let (_, bytes) = DataUrl::decode(url.as_str()).unwrap();
    let svg = String::from_utf8(bytes).unwrap();
    assert_eq!(svg, "<svg><desc>Be red.\n\nUser request: a cat</desc></svg>");
}

#[tokio::test]
async fn prose_reply_is_extraction_error() {
    let out = relay_for("gemini-prose").await.handle("a cat").await;
    assert!(!out.success);
    assert_eq!(out.error_kind, Some(ErrorKind::Extraction));
    assert!(!out.error.unwrap().contains("rather not draw"));
}

#[tokio::test]
async fn no_candidates_is_empty_content() {
    let err = relay_for("gemini-empty").await.generate("a cat").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyContent);
}

#[tokio::test]
async fn vendor_error_message_is_surfaced() {
    let err = relay_for("gemini-denied").await.generate("a cat").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert!(err.to_string().contains("403"));
    assert!(err.to_string().contains("Permission denied on resource."));
}

#[tokio::test]
async fn bad_key_is_upstream_error() {
    let base = spawn_vendor().await;
    let mut cfg = config_for(&base, "gemini-ok");
    cfg.api_key = Some("wrong".into());
    let err = Relay::from_config(&cfg).unwrap().generate("a cat").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert!(err.to_string().contains("API key not valid"));
}

#[tokio::test]
async fn missing_model_lists_usable_models() {
    let err = relay_for("gemini-9000").await.generate("a cat").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelNotFound);
    let msg = err.to_string();
    assert!(msg.contains("gemini-9000"));
    assert!(msg.contains("gemini-ok, gemini-json"), "got: {msg}");
    assert!(!msg.contains("embedding-001"));
}

#[tokio::test]
async fn missing_model_without_diagnostics() {
    let base = spawn_vendor().await;
    let mut cfg = config_for(&base, "gemini-9000");
    cfg.llm.gemini.diagnose_missing_model = false;
    let err = Relay::from_config(&cfg).unwrap().generate("a cat").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelNotFound);
    let msg = err.to_string();
    assert!(!msg.contains("usable models"));
    assert!(msg.contains("is not found for API version v1"), "got: {msg}");
}

#[tokio::test]
async fn unreachable_vendor_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let cfg = config_for(&format!("http://{addr}"), "gemini-ok");
    let out = Relay::from_config(&cfg).unwrap().handle("a cat").await;
    assert_eq!(out.error_kind, Some(ErrorKind::Transport));
    assert!(!out.error.unwrap().contains(API_KEY), "API key leaked into error text");
}

#[tokio::test]
async fn http_channel_serves_and_shuts_down() {
    let base = spawn_vendor().await;
    let relay = Relay::from_config(&config_for(&base, "gemini-ok")).unwrap();
    let channel = HttpChannel::bind("127.0.0.1:0", AppState::new(relay)).await.unwrap();
    let addr = channel.local_addr().unwrap();

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(channel.run(shutdown.clone()));

    let body: Value = reqwest::Client::new()
        .post(format!("http://{addr}/api/generate"))
        .json(&json!({ "prompt": "a cat" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert!(body["imageUrl"].as_str().unwrap().starts_with("data:image/svg+xml;base64,"));

    shutdown.cancel();
    server.await.unwrap().unwrap();
}
