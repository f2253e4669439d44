//! Configuration schema.
//!
//! Hierarchy: `Config` → `ProviderConfig`, `AgentConfig`, `ServerConfig` list,
//! `ToolsConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ConfigError;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.mcpilot/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub agent: AgentConfig,
    pub servers: Vec<ServerConfig>,
    pub tools: ToolsConfig,
}

impl Config {
    /// Check the parts of the config that must be right before anything starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.tool_model.trim().is_empty() {
            return Err(ConfigError::Invalid("agent.toolModel must not be empty".into()));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::Invalid("agent.maxIterations must be at least 1".into()));
        }
        for server in &self.servers {
            server.validate()?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────

/// Connection settings for the OpenAI-compatible chat completions endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key for Bearer authentication.
    pub api_key: String,
    /// API base URL (e.g. `"https://api.openai.com/v1"`).
    pub api_base: String,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
    /// Connect timeout and per-read idle timeout in seconds. A stream may
    /// run longer as long as data keeps arriving.
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://api.openai.com/v1".to_string(),
            extra_headers: None,
            timeout_secs: 120,
        }
    }
}

// ─────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────

/// Orchestration loop settings, including the two model roles.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Cheap model used for planning and tool calls.
    pub tool_model: String,
    /// Higher-quality model used once for the final answer. Empty disables it.
    pub final_model: String,
    /// Run the final model over the transcript once the tool model is done.
    pub final_polish: bool,
    /// Maximum model round-trips per query before giving up.
    pub max_iterations: u32,
    /// Maximum tokens to generate per response.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
    /// Per tool call timeout in seconds.
    pub tool_timeout_secs: u64,
    /// Dispatch the tool calls of one turn concurrently.
    pub parallel_tool_calls: bool,
    /// Send strict function schemas.
    pub strict_tools: bool,
    /// Retries after a malformed model stream.
    pub stream_retries: u32,
    /// Retries after the model endpoint is unreachable.
    pub model_retries: u32,
    /// Base delay for exponential backoff between model retries.
    pub retry_backoff_ms: u64,
    /// Replaces the built-in system prompt when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tool_model: "gpt-4.1-mini".to_string(),
            final_model: "gpt-4.1".to_string(),
            final_polish: true,
            max_iterations: 25,
            max_tokens: 4096,
            temperature: 0.7,
            tool_timeout_secs: 60,
            parallel_tool_calls: false,
            strict_tools: false,
            stream_retries: 2,
            model_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
        }
    }
}

// ─────────────────────────────────────────────
// Tool servers
// ─────────────────────────────────────────────

/// An MCP tool server launched as a child process speaking stdio.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Display name, used in logs and collision warnings.
    pub name: String,
    /// Executable to launch.
    pub command: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Extra environment variables for the child.
    pub env: HashMap<String, String>,
    /// The server cannot handle concurrent requests; queue calls to it.
    pub serialize: bool,
}

impl ServerConfig {
    /// Build a server entry from a script path, picking the interpreter by extension.
    pub fn from_script(path: &str) -> Result<Self, ConfigError> {
        let command = if path.ends_with(".py") {
            "python3"
        } else if path.ends_with(".js") {
            "node"
        } else {
            return Err(ConfigError::Invalid(format!(
                "server script must be a .py or .js file: {path}"
            )));
        };
        let name = std::path::Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(path)
            .to_string();
        Ok(Self {
            name,
            command: command.to_string(),
            args: vec![path.to_string()],
            env: HashMap::new(),
            serialize: false,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("server entry is missing a name".into()));
        }
        if self.command.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "server '{}' has an empty command",
                self.name
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Built-in tools
// ─────────────────────────────────────────────

/// Built-in tool configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    pub web: WebToolsConfig,
}

/// The in-process web research server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebToolsConfig {
    pub enabled: bool,
    /// Brave Search API key (falls back to `BRAVE_API_KEY`).
    pub brave_api_key: String,
}

impl Default for WebToolsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            brave_api_key: String::new(),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
