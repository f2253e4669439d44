//! Tool server boundary.
//!
//! A [`ToolServer`] exposes a set of tools over some transport. The registry
//! is polymorphic over this trait: [`McpServer`](super::mcp::McpServer)
//! speaks MCP to a child process, [`LocalToolServer`] dispatches to
//! in-process [`Tool`] objects.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::base::Tool;

/// A tool as advertised by its server, before validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Display name used in logs and collision warnings.
    fn name(&self) -> &str;

    /// Enumerate the tools this server offers.
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolSpec>>;

    /// Call one tool. `arguments` is always a JSON object.
    ///
    /// `Err` covers both transport failures and errors reported by the tool.
    async fn call_tool(&self, name: &str, arguments: Value) -> anyhow::Result<String>;

    /// Whether several calls may be in flight at once.
    fn supports_concurrency(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────
// LocalToolServer
// ─────────────────────────────────────────────

/// Groups in-process tools behind the [`ToolServer`] interface.
pub struct LocalToolServer {
    name: String,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl LocalToolServer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: HashMap::new(),
        }
    }

    /// Add a tool. Overwrites any previous tool with the same name.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolServer for LocalToolServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> anyhow::Result<Vec<ToolSpec>> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.to_spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(specs)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> anyhow::Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Tool '{name}' not found on server '{}'", self.name))?;

        let params: HashMap<String, Value> = match arguments {
            Value::Object(map) => map.into_iter().collect(),
            Value::Null => HashMap::new(),
            other => anyhow::bail!("expected an argument object, got {other}"),
        };

        debug!(server = %self.name, tool = name, "local tool call");
        tool.execute(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }
        async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
            let text = params.get("text").and_then(|v| v.as_str()).unwrap_or("(empty)");
            Ok(format!("Echo: {text}"))
        }
    }

    struct FailTool;

    #[async_trait]
    impl Tool for FailTool {
        fn name(&self) -> &str {
            "fail"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _params: HashMap<String, Value>) -> anyhow::Result<String> {
            anyhow::bail!("intentional failure")
        }
    }

    fn server() -> LocalToolServer {
        LocalToolServer::new("local")
            .with_tool(Arc::new(FailTool))
            .with_tool(Arc::new(EchoTool))
    }

    #[tokio::test]
    async fn test_list_tools_sorted() {
        let specs = server().list_tools().await.unwrap();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "fail"]);
    }

    #[tokio::test]
    async fn test_call_tool_success() {
        let out = server()
            .call_tool("echo", json!({"text": "hello"}))
            .await
            .unwrap();
        assert_eq!(out, "Echo: hello");
    }

    #[tokio::test]
    async fn test_call_tool_error_propagates() {
        let err = server().call_tool("fail", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("intentional failure"));
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let err = server().call_tool("nope", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_local_server_is_concurrent() {
        let s = server();
        assert!(s.supports_concurrency());
        assert_eq!(s.len(), 2);
        assert!(!s.is_empty());
    }
}
