//! mcpilot core — shared types, transcript, configuration, and utilities.
//!
//! - **types**: OpenAI-compatible wire messages and tool definitions
//! - **transcript**: `Turn`, `ToolCallRequest`, `ToolResult`, `Conversation`
//! - **config**: JSON config schema, loader, env overrides

pub mod config;
pub mod transcript;
pub mod types;
pub mod utils;

pub use transcript::{Conversation, Outcome, ToolCallRequest, ToolResult, Turn};
