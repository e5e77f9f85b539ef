//! Chat-completion shaped request and response bodies.
//!
//! Requests are decoded leniently: missing fields default, and message
//! content may be a plain string or a list of text parts.

use crate::models::VoiceStyle;
use serde::{Deserialize, Serialize};

/// Used when the request carries no usable user message.
pub const DEFAULT_USER_PROMPT: &str = "Tell me a story";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    #[serde(default)]
    pub text: Option<String>,
}

impl MessageContent {
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl ChatCompletionRequest {
    /// Decode a raw body; anything unreadable becomes an empty request.
    pub fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        serde_json::from_slice(body).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Unreadable chat request body, using defaults");
            Self::default()
        })
    }

    /// Text of the latest non-empty user message.
    pub fn user_text(&self) -> String {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role.eq_ignore_ascii_case("user"))
            .filter_map(|m| m.content.as_ref().map(MessageContent::text))
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_PROMPT.to_string())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    pub voice_style: VoiceStyle,
    pub session_id: String,
    pub continuation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

/// Word counts standing in for token counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    pub fn from_words(prompt: &str, completion: &str) -> Self {
        let prompt_tokens = prompt.split_whitespace().count();
        let completion_tokens = completion.split_whitespace().count();
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

impl ChatCompletionResponse {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        created: i64,
        model: &str,
        story: String,
        usage: Usage,
        voice_style: VoiceStyle,
        session_id: String,
        continuation: bool,
    ) -> Self {
        Self {
            id,
            object: "chat.completion".to_string(),
            created,
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                message: AssistantMessage {
                    role: "assistant".to_string(),
                    content: story,
                },
                finish_reason: "stop".to_string(),
            }],
            usage,
            voice_style,
            session_id,
            continuation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    pub voice_style: VoiceStyle,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatCompletionChunk {
    fn with_choice(
        id: &str,
        created: i64,
        model: &str,
        voice_style: VoiceStyle,
        session_id: &str,
        delta: Delta,
        finish_reason: Option<&str>,
    ) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
            voice_style,
            session_id: session_id.to_string(),
        }
    }

    pub fn role(id: &str, created: i64, model: &str, style: VoiceStyle, session_id: &str) -> Self {
        let delta = Delta {
            role: Some("assistant".to_string()),
            content: None,
        };
        Self::with_choice(id, created, model, style, session_id, delta, None)
    }

    pub fn content(
        id: &str,
        created: i64,
        model: &str,
        style: VoiceStyle,
        session_id: &str,
        text: String,
    ) -> Self {
        let delta = Delta {
            role: None,
            content: Some(text),
        };
        Self::with_choice(id, created, model, style, session_id, delta, None)
    }

    pub fn stop(id: &str, created: i64, model: &str, style: VoiceStyle, session_id: &str) -> Self {
        Self::with_choice(id, created, model, style, session_id, Delta::default(), Some("stop"))
    }
}
