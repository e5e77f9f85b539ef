pub mod chat;

pub use chat::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Usage,
    DEFAULT_USER_PROMPT,
};
