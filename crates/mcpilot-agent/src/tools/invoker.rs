//! Tool Invoker — turns a tool call request into an outcome, never an error.
//!
//! Every failure a single call can hit (unknown name, bad arguments, server
//! error, timeout) becomes a `Failure` outcome the model can read and react to.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use mcpilot_core::{ToolCallRequest, ToolResult};

use super::registry::ToolRegistry;

pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one call. The server is only contacted once the arguments are
    /// known to be a schema-valid JSON object. No retries.
    pub async fn invoke(&self, request: &ToolCallRequest) -> ToolResult {
        let Some(tool) = self.registry.entry(&request.name) else {
            warn!(tool = %request.name, call_id = %request.id, "unknown tool");
            return ToolResult::failure(&request.id, "unknown tool");
        };

        let arguments = match parse_arguments(&request.arguments) {
            Ok(v) => v,
            Err(detail) => {
                warn!(tool = %request.name, error = %detail, "invalid tool arguments");
                return ToolResult::failure(&request.id, format!("invalid arguments: {detail}"));
            }
        };

        if let Err(errors) = tool.validator.validate(&arguments) {
            let detail = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{path}: {e}")
                    }
                })
                .collect::<Vec<_>>()
                .join("; ");
            warn!(tool = %request.name, error = %detail, "tool arguments failed schema validation");
            return ToolResult::failure(&request.id, format!("invalid arguments: {detail}"));
        }

        debug!(
            tool = %request.name,
            server = %tool.descriptor.server,
            call_id = %request.id,
            "dispatching tool call"
        );

        match tokio::time::timeout(self.timeout, tool.handle.call(&request.name, arguments)).await {
            Ok(Ok(output)) => ToolResult::success(&request.id, output),
            Ok(Err(e)) => {
                warn!(tool = %request.name, error = %e, "tool execution failed");
                ToolResult::failure(&request.id, format!("tool execution error: {e}"))
            }
            Err(_) => {
                warn!(tool = %request.name, timeout = ?self.timeout, "tool call timed out");
                ToolResult::failure(
                    &request.id,
                    format!("tool execution error: timed out after {:?}", self.timeout),
                )
            }
        }
    }
}

/// Decode a raw argument payload. Empty means no arguments.
fn parse_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ Value::Object(_)) => Ok(v),
        Ok(other) => Err(format!("expected a JSON object, got {other}")),
        Err(e) => Err(format!("not valid JSON: {e}")),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
