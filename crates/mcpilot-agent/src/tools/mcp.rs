//! MCP tool servers launched as child processes.
//!
//! Each configured server is spawned with stdio pipes and driven by the
//! `rmcp` client. Tool listings and calls go through the running service.

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation},
    service::RunningService,
    transport::TokioChildProcess,
    RoleClient, ServiceExt,
};
use serde_json::Value;
use tracing::{debug, info};

use mcpilot_core::config::ServerConfig;

use super::server::{ToolServer, ToolSpec};
use crate::error::DiscoveryError;

/// A connected MCP server.
pub struct McpServer {
    name: String,
    client: RunningService<RoleClient, ClientInfo>,
    serialize: bool,
}

impl McpServer {
    /// Spawn the server process and run the MCP handshake.
    pub async fn connect(config: &ServerConfig) -> Result<Self, DiscoveryError> {
        let unreachable = |reason: String| DiscoveryError::Unreachable {
            server: config.name.clone(),
            reason,
        };

        info!(
            server = %config.name,
            command = %config.command,
            args = ?config.args,
            "launching MCP server"
        );

        let mut cmd = tokio::process::Command::new(&config.command);
        cmd.args(&config.args).envs(&config.env);

        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| unreachable(format!("failed to spawn '{}': {e}", config.command)))?;

        let client_info = ClientInfo {
            meta: None,
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "mcpilot".to_string(),
                title: Some("mcpilot".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                website_url: None,
                icons: None,
            },
        };

        let client = client_info
            .serve(transport)
            .await
            .map_err(|e| unreachable(format!("initialization failed: {e}")))?;

        info!(server = %config.name, "MCP server connected");

        Ok(Self {
            name: config.name.clone(),
            client,
            serialize: config.serialize,
        })
    }
}

#[async_trait]
impl ToolServer for McpServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> anyhow::Result<Vec<ToolSpec>> {
        let result = self
            .client
            .list_tools(Default::default())
            .await
            .map_err(|e| anyhow::anyhow!("tools/list failed: {e}"))?;

        debug!(server = %self.name, count = result.tools.len(), "listed tools");

        Ok(result
            .tools
            .into_iter()
            .map(|tool| ToolSpec {
                name: tool.name.to_string(),
                description: tool.description.as_deref().unwrap_or_default().to_string(),
                input_schema: Value::Object((*tool.input_schema).clone()),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> anyhow::Result<String> {
        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };

        let result = self
            .client
            .call_tool(params)
            .await
            .map_err(|e| anyhow::anyhow!("tools/call failed: {e}"))?;

        let text = render_result(&result);
        if result.is_error.unwrap_or(false) {
            anyhow::bail!(text);
        }
        Ok(text)
    }

    fn supports_concurrency(&self) -> bool {
        !self.serialize
    }
}

/// Flatten a call result into the text handed back to the model.
///
/// Text blocks are joined with newlines; structured content is used when
/// the server returned no text at all.
fn render_result(result: &CallToolResult) -> String {
    let text: Vec<&str> = result
        .content
        .iter()
        .filter_map(|c| c.as_text())
        .map(|t| t.text.as_str())
        .collect();

    if text.is_empty() {
        if let Some(ref structured) = result.structured_content {
            return structured.to_string();
        }
    }
    text.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_connect_missing_binary_is_unreachable() {
        let config = ServerConfig {
            name: "ghost".into(),
            command: "/nonexistent/mcpilot-test-server".into(),
            args: vec![],
            env: HashMap::new(),
            serialize: false,
        };
        match McpServer::connect(&config).await {
            Err(DiscoveryError::Unreachable { server, .. }) => assert_eq!(server, "ghost"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connecting to a missing binary should fail"),
        }
    }
}
