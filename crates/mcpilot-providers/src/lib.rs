//! Model API layer for mcpilot.
//!
//! # Architecture
//!
//! - [`traits::ModelClient`] — streaming trait that all model backends implement
//! - [`sse`] — Server-Sent Events decoding into [`traits::StreamEvent`]s
//! - [`http_provider::HttpProvider`] — OpenAI-compatible streaming HTTP client

pub mod http_provider;
pub mod sse;
pub mod traits;

// Re-export main types for convenience
pub use http_provider::HttpProvider;
pub use traits::{
    ChatRequest, EventStream, LlmRequestConfig, ModelClient, ProviderError, StreamEvent,
    ToolChoice,
};
