//! Tool trait — the interface for tools that run inside this process.
//!
//! In-process tools are grouped into a [`LocalToolServer`](super::server::LocalToolServer)
//! so the registry treats them exactly like a remote MCP server.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use super::server::ToolSpec;

// ─────────────────────────────────────────────
// Tool trait
// ─────────────────────────────────────────────

/// Every in-process tool implements this trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used by the model to call this tool (e.g. `"search_brave"`).
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema describing the parameters.
    ///
    /// Must be `{"type": "object", "properties": {...}, "required": [...]}`.
    fn parameters(&self) -> Value;

    /// Execute the tool with already-validated arguments.
    ///
    /// Returns the tool output as a string (the model reads this).
    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String>;

    /// Describe the tool for discovery.
    fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters(),
        }
    }
}

// ─────────────────────────────────────────────
// Param helpers
// ─────────────────────────────────────────────

/// Extract a required `String` param, returning a user-friendly error.
pub fn require_string(params: &HashMap<String, Value>, key: &str) -> anyhow::Result<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {key}"))
}

/// Extract an optional non-negative count, falling back to `default`.
pub fn optional_usize(params: &HashMap<String, Value>, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(default)
}
