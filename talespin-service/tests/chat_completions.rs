//! Integration tests for `/v1/chat/completions`.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use talespin_service::config::TalespinConfig;
use talespin_service::models::VoiceStyle;
use talespin_service::services::fallback::fallback_continuation;
use talespin_service::services::providers::mock::{MockBehavior, MockTextProvider};
use talespin_service::services::providers::TextProvider;
use talespin_service::startup::{AppState, Application};

struct TestApp {
    address: String,
    state: AppState,
    client: Client,
}

impl TestApp {
    async fn chat(&self, body: Value) -> Value {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.address))
            .json(&body)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.expect("Failed to parse JSON")
    }
}

async fn spawn_app_with(config: TalespinConfig, provider: Option<Arc<dyn TextProvider>>) -> TestApp {
    let app = Application::build_with_provider(config, provider)
        .await
        .expect("Failed to build application");

    let address = format!("http://localhost:{}", app.http_port());
    let state = app.state().clone();

    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    TestApp {
        address,
        state,
        client: Client::new(),
    }
}

async fn spawn_app(provider: Option<Arc<dyn TextProvider>>) -> TestApp {
    spawn_app_with(TalespinConfig::local(), provider).await
}

fn story(body: &Value) -> &str {
    body["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
}

#[tokio::test]
async fn generated_story_is_returned_in_chat_shape() {
    let provider = Arc::new(MockTextProvider::responding("The old house creaked. Nobody answered."));
    let app = spawn_app(Some(provider.clone())).await;

    let body = app
        .chat(json!({
            "messages": [{"role": "user", "content": "Tell me a scary story about a haunted house"}],
            "session_id": "caller-1"
        }))
        .await;

    assert_eq!(story(&body), "The old house creaked. Nobody answered.");
    assert_eq!(body["object"], "chat.completion");
    assert!(body["id"].as_str().unwrap_or_default().starts_with("chatcmpl-"));
    assert_eq!(body["model"], "mock-model");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["voice_style"], "mystery");
    assert_eq!(body["session_id"], "caller-1");
    assert_eq!(body["continuation"], false);
    assert_eq!(body["usage"]["prompt_tokens"], 9);
    assert_eq!(body["usage"]["completion_tokens"], 6);
    assert_eq!(body["usage"]["total_tokens"], 15);

    assert!(provider.last_prompt().unwrap_or_default().contains("a haunted house"));
    let session = app.state.orchestrator.store().get("caller-1").expect("session");
    assert_eq!(session.last_story, "The old house creaked. Nobody answered.");
    assert_eq!(session.voice_style, VoiceStyle::Mystery);
}

#[tokio::test]
async fn continuation_follows_previous_story() {
    let app = spawn_app(Some(Arc::new(MockTextProvider::failing()))).await;

    let first = app
        .chat(json!({
            "messages": [{"role": "user", "content": "Tell me a scary story about a haunted house"}],
            "session_id": "caller-2"
        }))
        .await;
    assert_eq!(first["continuation"], false);
    assert!(!story(&first).is_empty());

    let second = app
        .chat(json!({
            "messages": [
                {"role": "user", "content": "Tell me a scary story about a haunted house"},
                {"role": "assistant", "content": story(&first)},
                {"role": "user", "content": "What happens next?"}
            ],
            "session_id": "caller-2"
        }))
        .await;

    assert_eq!(second["continuation"], true);
    assert_eq!(second["voice_style"], "mystery");
    assert_eq!(story(&second), fallback_continuation(VoiceStyle::Mystery));

    let session = app.state.orchestrator.store().get("caller-2").expect("session");
    assert_eq!(session.recent_entries.len(), 2);
}

#[tokio::test]
async fn continue_without_history_starts_a_new_story() {
    let app = spawn_app(None).await;

    let body = app
        .chat(json!({
            "messages": [{"role": "user", "content": "continue"}],
            "session_id": "brand-new"
        }))
        .await;

    assert_eq!(body["continuation"], false);
    assert!(!story(&body).is_empty());
    assert_eq!(body["model"], "talespin-local");
}

#[tokio::test]
async fn session_id_can_come_from_header() {
    let app = spawn_app(None).await;

    let response = app
        .client
        .post(format!("{}/v1/chat/completions", app.address))
        .header("x-session-id", "header-session")
        .json(&json!({"messages": [{"role": "user", "content": "a story about otters"}]}))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse JSON");

    assert_eq!(body["session_id"], "header-session");
    assert!(app.state.orchestrator.store().get("header-session").is_some());
}

#[tokio::test]
async fn missing_session_id_is_generated() {
    let app = spawn_app(None).await;

    let body = app
        .chat(json!({"messages": [{"role": "user", "content": "a story about otters"}]}))
        .await;

    let session_id = body["session_id"].as_str().unwrap_or_default();
    assert!(session_id.starts_with("talespin-"));
    assert!(app.state.orchestrator.store().get(session_id).is_some());
}

#[tokio::test]
async fn malformed_requests_still_get_a_story() {
    let app = spawn_app(None).await;

    for body in ["", "not json at all", "{}", r#"{"messages": "oops"}"#] {
        let response = app
            .client
            .post(format!("{}/v1/chat/completions", app.address))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(response.status(), StatusCode::OK, "body {:?}", body);
        let json: Value = response.json().await.expect("Failed to parse JSON");
        assert!(!story(&json).is_empty(), "body {:?}", body);
    }
}

#[tokio::test]
async fn slow_provider_falls_back_after_timeout() {
    let mut config = TalespinConfig::local();
    config.generation.timeout_secs = 1;
    let provider = Arc::new(MockTextProvider::new(MockBehavior::Slow(Duration::from_secs(5))));
    let app = spawn_app_with(config, Some(provider)).await;

    let started = std::time::Instant::now();
    let body = app
        .chat(json!({"messages": [{"role": "user", "content": "an adventure story about space pirates"}]}))
        .await;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_ne!(story(&body), "A story that took far too long.");
    assert!(story(&body).contains("space pirates"));
    assert_eq!(body["voice_style"], "adventure");
}

#[tokio::test]
async fn streaming_emits_chunks_then_done() {
    let app = spawn_app(Some(Arc::new(MockTextProvider::responding(
        "Captain Vega spotted the comet. The crew cheered loudly.",
    ))))
    .await;

    let response = app
        .client
        .post(format!("{}/v1/chat/completions", app.address))
        .json(&json!({
            "messages": [{"role": "user", "content": "an adventure about space pirates"}],
            "stream": true,
            "session_id": "streamer"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let text = response.text().await.expect("Failed to read stream");
    let data: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .collect();

    assert_eq!(data.last(), Some(&"[DONE]"));
    let chunks: Vec<Value> = data[..data.len() - 1]
        .iter()
        .map(|d| serde_json::from_str(d).expect("chunk JSON"))
        .collect();

    assert_eq!(chunks[0]["choices"][0]["delta"]["role"], "assistant");
    assert_eq!(chunks[0]["object"], "chat.completion.chunk");
    assert_eq!(chunks[0]["session_id"], "streamer");
    assert_eq!(chunks[0]["voice_style"], "adventure");

    let last = chunks.last().expect("stop chunk");
    assert_eq!(last["choices"][0]["finish_reason"], "stop");

    let content: String = chunks
        .iter()
        .filter_map(|c| c["choices"][0]["delta"]["content"].as_str())
        .collect();
    assert_eq!(content, "Captain Vega spotted the comet. The crew cheered loudly.");
    assert!(chunks.iter().all(|c| c["id"] == chunks[0]["id"]));
}

#[tokio::test]
async fn readiness_probe_lists_styles() {
    let app = spawn_app(None).await;

    let response = app
        .client
        .get(format!("{}/v1/chat/completions", app.address))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ready");
    assert_eq!(body["streaming"], true);
    assert_eq!(body["generation_configured"], false);
    assert_eq!(body["voice_styles"].as_array().map(Vec::len), Some(4));
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let app = spawn_app(None).await;

    let response = app
        .client
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/v1/chat/completions", app.address),
        )
        .header("origin", "https://voice.example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|h| h.to_str().ok()),
        Some("*")
    );
}
