//! Descriptive and demonstration endpoints.

use crate::models::VoiceStyle;
use crate::services::classifier::CONTINUATION_KEYWORDS;
use crate::services::fallback::fallback_story;
use crate::startup::AppState;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Local, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

const DEMO_TOPIC: &str = "a curious little robot";
const PREVIEW_CHARS: usize = 120;

/// Prompts used by `/test-generation`; each should yield a different story.
pub const TEST_PROMPTS: [&str; 3] = [
    "Tell me a story about a lighthouse keeper",
    "Tell me a funny story about a robot chef",
    "Tell me a spooky story about an old library",
];

#[derive(Debug, Deserialize)]
pub struct DemoQuery {
    pub topic: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StyleSample {
    pub voice_style: VoiceStyle,
    pub description: String,
    pub pacing: String,
    pub temperature: f32,
    pub story: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationCheck {
    pub prompt: String,
    pub voice_style: VoiceStyle,
    pub topic: String,
    pub generated: bool,
    pub preview: String,
    pub hash: String,
}

/// `GET /voice-demo?topic=...`
///
/// One fallback story per style. Never calls the provider.
pub async fn voice_demo(
    State(state): State<AppState>,
    Query(query): Query<DemoQuery>,
) -> impl IntoResponse {
    let mut rng = StdRng::from_entropy();
    let topic = query
        .topic
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEMO_TOPIC.to_string());

    let swept = if rng.gen::<f64>() < state.config.sessions.demo_sweep_probability {
        Some(state.orchestrator.store().sweep_expired(chrono::Utc::now()))
    } else {
        None
    };

    let samples: Vec<StyleSample> = VoiceStyle::ALL
        .iter()
        .map(|&style| {
            let profile = style.profile();
            StyleSample {
                voice_style: style,
                description: profile.description.to_string(),
                pacing: profile.pacing.to_string(),
                temperature: profile.temperature,
                story: fallback_story(&topic, style, &mut rng),
            }
        })
        .collect();

    Json(json!({
        "topic": topic,
        "samples": samples,
        "expired_sessions_removed": swept
    }))
}

/// `GET /features`
pub async fn features(State(state): State<AppState>) -> impl IntoResponse {
    let styles: Vec<_> = VoiceStyle::ALL
        .iter()
        .map(|style| {
            let profile = style.profile();
            json!({
                "name": profile.name,
                "description": profile.description,
                "pacing": profile.pacing,
                "temperature": profile.temperature,
                "max_output_tokens": profile.max_output_tokens,
                "stream_chunk_delay_ms": profile.chunk_delay.as_millis() as u64
            })
        })
        .collect();

    Json(json!({
        "voice_styles": styles,
        "default_style": VoiceStyle::default(),
        "continuation_keywords": CONTINUATION_KEYWORDS,
        "sessions": {
            "ttl_secs": state.orchestrator.store().ttl().num_seconds(),
            "recent_entries": crate::models::MAX_RECENT_ENTRIES
        },
        "generation": {
            "configured": state.orchestrator.generator().is_configured(),
            "model": state.orchestrator.generator().model(),
            "timeout_secs": state.orchestrator.generator().timeout().as_secs()
        },
        "streaming": true,
        "local_fallback": true
    }))
}

/// `GET /`
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "service": "Talespin",
        "description": "Turns chat requests from a voice agent into short stories for narration",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "chat": "POST /v1/chat/completions",
            "readiness": "GET /v1/chat/completions",
            "health": "GET /health",
            "voice_demo": "GET /voice-demo?topic=...",
            "features": "GET /features",
            "test_generation": "GET /test-generation",
            "metrics": "GET /metrics"
        }
    }))
}

/// `GET /test-generation`
///
/// Runs [`TEST_PROMPTS`] through the new-story path without touching
/// sessions and reports whether the results differ.
pub async fn test_generation(State(state): State<AppState>) -> impl IntoResponse {
    let mut rng = StdRng::from_entropy();
    let hour = Local::now().hour();

    let mut checks = Vec::with_capacity(TEST_PROMPTS.len());
    for prompt in TEST_PROMPTS {
        let outcome = state.orchestrator.compose(prompt, hour, &mut rng).await;
        checks.push(GenerationCheck {
            prompt: prompt.to_string(),
            voice_style: outcome.style,
            topic: outcome.topic,
            generated: outcome.generated,
            preview: preview(&outcome.story),
            hash: short_hash(&outcome.story),
        });
    }

    let distinct: HashSet<&str> = checks.iter().map(|c| c.hash.as_str()).collect();
    let all_unique = distinct.len() == checks.len();
    tracing::info!(all_unique, "Generation self-test finished");

    Json(json!({
        "model": state.orchestrator.generator().model(),
        "generation_configured": state.orchestrator.generator().is_configured(),
        "results": checks,
        "all_unique": all_unique
    }))
}

fn preview(story: &str) -> String {
    if story.chars().count() <= PREVIEW_CHARS {
        return story.to_string();
    }
    let head: String = story.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", head)
}

/// First 8 hex digits of the SHA-256 of `text`.
fn short_hash(text: &str) -> String {
    let mut digest = hex::encode(Sha256::digest(text.as_bytes()));
    digest.truncate(8);
    digest
}
