//! Model client trait — the streaming boundary to the chat-completion API.
//!
//! Every backend implements [`ModelClient`]. The `HttpProvider` in
//! `http_provider.rs` covers all OpenAI-compatible APIs.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use mcpilot_core::types::{Message, ToolDefinition};

/// Sampling settings passed with each call.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// Whether the model may call tools on this request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
}

impl ToolChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
        }
    }
}

/// Everything one model invocation needs.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub config: LlmRequestConfig,
}

/// One incremental event from a streamed model response.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Append to the current text buffer.
    TextDelta(String),
    /// Append to the argument buffer of call `id`. `name` is set on the
    /// delta that introduces the call.
    ToolCallDelta {
        id: String,
        name: Option<String>,
        arguments: String,
    },
    /// The model finished this turn.
    TurnComplete { finish_reason: Option<String> },
}

/// Failures at the model API boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport failure or non-2xx status (`ModelUnavailable`).
    #[error("model unavailable: {0}")]
    Unavailable(String),
    /// The stream carried something we could not decode.
    #[error("malformed model stream: {0}")]
    Protocol(String),
}

/// Pull-based stream of model events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send>>;

/// Trait that all model backends implement.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Open a streaming chat completion.
    ///
    /// Connection and status errors surface here; errors while reading the
    /// body surface as items of the returned stream.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<EventStream, ProviderError>;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
