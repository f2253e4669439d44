//! Configuration system — schema, loading, and env var overrides.
//!
//! # Usage
//! ```no_run
//! use mcpilot_core::config;
//!
//! let cfg = config::load_config(None).expect("readable config");
//! println!("Tool model: {}", cfg.agent.tool_model);
//! ```

pub mod loader;
pub mod schema;

// Re-export key types
pub use loader::{get_config_path, load_config, save_config};
pub use schema::{AgentConfig, Config, ProviderConfig, ServerConfig, ToolsConfig, WebToolsConfig};

/// Configuration that cannot be used to start the agent.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {reason}")]
    Malformed { path: String, reason: String },
}
