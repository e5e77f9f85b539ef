use crate::dtos::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, Usage};
use crate::models::VoiceStyle;
use crate::services::classifier::CONTINUATION_KEYWORDS;
use crate::services::StoryOutcome;
use crate::startup::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::FutureExt;
use serde_json::json;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

/// Alternative carrier for the session id when the body has none.
pub const SESSION_HEADER: &str = "x-session-id";

/// Words per streamed content chunk.
const WORDS_PER_CHUNK: usize = 2;

/// Told in place of a story when producing one failed unexpectedly.
pub const APOLOGY_STORY: &str = "Oh dear, my storybook slipped right out of my hands for a moment. \
    While I find my page, here is a little one. Once upon a time, a curious traveler \
    followed a quiet path through the hills, and at the end of it found a warm fire, \
    a friendly face, and the promise of another tale tomorrow.";

/// `POST /v1/chat/completions`
///
/// The body is read as raw bytes so that a missing content type or malformed
/// JSON still gets a story back.
pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = ChatCompletionRequest::from_body(&body);
    let session_id = resolve_session_id(&request, &headers);
    let user_text = request.user_text();

    tracing::info!(
        session_id = %session_id,
        stream = request.stream,
        chars = user_text.len(),
        "Chat completion requested"
    );

    let outcome = match AssertUnwindSafe(
        state.orchestrator.produce_story(&user_text, &session_id),
    )
    .catch_unwind()
    .await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::error!(session_id = %session_id, "Story production panicked, apologising");
            StoryOutcome {
                story: APOLOGY_STORY.to_string(),
                style: VoiceStyle::default(),
                topic: String::new(),
                continuation: false,
                generated: false,
            }
        }
    };

    let id = format!("chatcmpl-{}", Uuid::new_v4());
    let created = chrono::Utc::now().timestamp();
    let model = state.orchestrator.generator().model().to_string();

    if request.stream {
        let pacing = state.config.streaming.pacing;
        return stream_story(id, created, model, session_id, outcome, pacing).into_response();
    }

    let usage = Usage::from_words(&user_text, &outcome.story);
    Json(ChatCompletionResponse::new(
        id,
        created,
        &model,
        outcome.story,
        usage,
        outcome.style,
        session_id,
        outcome.continuation,
    ))
    .into_response()
}

/// `GET /v1/chat/completions`
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let generator = state.orchestrator.generator();
    Json(json!({
        "status": "ready",
        "service": "talespin",
        "version": env!("CARGO_PKG_VERSION"),
        "model": generator.model(),
        "generation_configured": generator.is_configured(),
        "voice_styles": VoiceStyle::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        "continuation_keywords": CONTINUATION_KEYWORDS,
        "features": ["stories", "continuations", "sessions", "streaming", "local_fallback"],
        "streaming": true
    }))
}

/// Body `session_id`, then the session header, then a fresh id.
fn resolve_session_id(request: &ChatCompletionRequest, headers: &HeaderMap) -> String {
    request
        .session_id()
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("talespin-{}", Uuid::new_v4()))
}

/// Split a story into content deltas of a few words each. Concatenating the
/// deltas gives back the story with whitespace normalised.
pub fn story_chunks(story: &str) -> Vec<String> {
    let words: Vec<&str> = story.split_whitespace().collect();
    words
        .chunks(WORDS_PER_CHUNK)
        .enumerate()
        .map(|(i, chunk)| {
            let text = chunk.join(" ");
            if i == 0 {
                text
            } else {
                format!(" {}", text)
            }
        })
        .collect()
}

fn stream_story(
    id: String,
    created: i64,
    model: String,
    session_id: String,
    outcome: StoryOutcome,
    pacing: bool,
) -> Sse<ReceiverStream<Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(32);
    let style = outcome.style;
    let delay = style.profile().chunk_delay;

    tokio::spawn(async move {
        let mut events = Vec::new();
        events.push(ChatCompletionChunk::role(&id, created, &model, style, &session_id));
        for text in story_chunks(&outcome.story) {
            events.push(ChatCompletionChunk::content(
                &id,
                created,
                &model,
                style,
                &session_id,
                text,
            ));
        }
        events.push(ChatCompletionChunk::stop(&id, created, &model, style, &session_id));

        let last = events.len() - 1;
        for (i, chunk) in events.into_iter().enumerate() {
            let event = match Event::default().json_data(&chunk) {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode stream chunk");
                    continue;
                }
            };
            if tx.send(Ok(event)).await.is_err() {
                tracing::debug!(session_id = %session_id, "Stream client went away");
                return;
            }
            if pacing && i > 0 && i < last {
                tokio::time::sleep(delay).await;
            }
        }

        let _ = tx.send(Ok(Event::default().data("[DONE]"))).await;
        tracing::debug!(session_id = %session_id, style = %style, "Stream finished");
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default())
}
