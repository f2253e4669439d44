//! Config loader — reads `~/.mcpilot/config.json`, merges env vars, and
//! applies legacy migrations.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.mcpilot/config.json`
//! 3. `OPENAI_*` variables (`OPENAI_API_KEY`, `OPENAI_TOOL_MODEL`, `OPENAI_FINAL_MODEL`)
//! 4. Environment variables `MCPILOT_<SECTION>__<FIELD>` (override everything)

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::schema::Config;
use super::ConfigError;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` only when the file doesn't exist. A file
/// that exists but cannot be read or parsed is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Ok(apply_env_overrides(Config::default()));
    }

    debug!("Loading config from {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let malformed = |e: serde_json::Error| ConfigError::Malformed {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let mut raw: serde_json::Value = serde_json::from_str(&content).map_err(malformed)?;
    migrate_config(&mut raw);
    let config: Config = serde_json::from_value(raw).map_err(malformed)?;

    Ok(apply_env_overrides(config))
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply legacy config migrations.
///
/// Moves the single-model `agent.model` key → `agent.toolModel`.
fn migrate_config(raw: &mut serde_json::Value) {
    if let Some(agent) = raw.get_mut("agent").and_then(|a| a.as_object_mut()) {
        if agent.get("toolModel").is_none() {
            if let Some(model) = agent.remove("model") {
                agent.insert("toolModel".into(), model);
                debug!("Migrated agent.model → agent.toolModel");
            }
        }
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `MCPILOT_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `MCPILOT_PROVIDER__API_KEY` / `MCPILOT_PROVIDER__API_BASE`
/// - `MCPILOT_AGENT__TOOL_MODEL` / `MCPILOT_AGENT__FINAL_MODEL`
/// - `MCPILOT_AGENT__FINAL_POLISH`
/// - `MCPILOT_AGENT__MAX_ITERATIONS`
/// - `MCPILOT_AGENT__TOOL_TIMEOUT_SECS`
/// - `MCPILOT_AGENT__PARALLEL_TOOL_CALLS`
/// - `MCPILOT_TOOLS__WEB__BRAVE_API_KEY`
fn apply_env_overrides(mut config: Config) -> Config {
    // OPENAI_* fill gaps only
    if config.provider.api_key.is_empty() {
        if let Ok(val) = std::env::var("OPENAI_API_KEY") {
            config.provider.api_key = val;
        }
    }
    if let Ok(val) = std::env::var("OPENAI_TOOL_MODEL") {
        config.agent.tool_model = val;
    }
    if let Ok(val) = std::env::var("OPENAI_FINAL_MODEL") {
        config.agent.final_model = val;
    }

    // Provider
    if let Ok(val) = std::env::var("MCPILOT_PROVIDER__API_KEY") {
        config.provider.api_key = val;
    }
    if let Ok(val) = std::env::var("MCPILOT_PROVIDER__API_BASE") {
        config.provider.api_base = val;
    }

    // Agent
    if let Ok(val) = std::env::var("MCPILOT_AGENT__TOOL_MODEL") {
        config.agent.tool_model = val;
    }
    if let Ok(val) = std::env::var("MCPILOT_AGENT__FINAL_MODEL") {
        config.agent.final_model = val;
    }
    if let Ok(val) = std::env::var("MCPILOT_AGENT__FINAL_POLISH") {
        config.agent.final_polish = parse_flag(&val);
    }
    if let Ok(val) = std::env::var("MCPILOT_AGENT__MAX_ITERATIONS") {
        if let Ok(n) = val.parse::<u32>() {
            config.agent.max_iterations = n;
        }
    }
    if let Ok(val) = std::env::var("MCPILOT_AGENT__TOOL_TIMEOUT_SECS") {
        if let Ok(n) = val.parse::<u64>() {
            config.agent.tool_timeout_secs = n;
        }
    }
    if let Ok(val) = std::env::var("MCPILOT_AGENT__PARALLEL_TOOL_CALLS") {
        config.agent.parallel_tool_calls = parse_flag(&val);
    }

    // Tools
    if let Ok(val) = std::env::var("MCPILOT_TOOLS__WEB__BRAVE_API_KEY") {
        config.tools.web.brave_api_key = val;
    }

    config
}

fn parse_flag(val: &str) -> bool {
    val == "true" || val == "1"
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_missing_file() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.json")).unwrap();
        assert_eq!(config.agent.max_iterations, 25);
        assert_eq!(config.agent.tool_timeout_secs, 60);
    }

    #[test]
    fn test_load_valid_json() {
        let file = write_temp_json(r#"{
            "agent": {
                "finalModel": "gpt-4o",
                "maxIterations": 8
            },
            "servers": [
                { "name": "weather", "command": "node", "args": ["weather.js"], "serialize": true }
            ]
        }"#);

        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.agent.final_model, "gpt-4o");
        assert_eq!(config.agent.max_iterations, 8);
        assert_eq!(config.servers[0].name, "weather");
        assert!(config.servers[0].serialize);
        // Default preserved
        assert_eq!(config.agent.temperature, 0.7);
    }

    #[test]
    fn test_load_invalid_json_is_an_error() {
        let file = write_temp_json("not valid json {{{");
        let err = load_config_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn test_load_wrong_field_type_is_an_error() {
        let file = write_temp_json(r#"{"servers":[{"name":"geo","command":42}]}"#);
        let err = load_config_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
        assert!(err.to_string().contains("malformed config file"));
    }

    #[test]
    fn test_load_unreadable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory exists but cannot be read as a file.
        let err = load_config_from_path(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.agent.final_model = String::new();
        config.provider.api_base = "http://localhost:8080/v1".to_string();

        save_config(&config, Some(&path)).unwrap();

        let reloaded = load_config_from_path(&path).unwrap();
        assert!(reloaded.agent.final_model.is_empty());
        assert_eq!(reloaded.provider.api_base, "http://localhost:8080/v1");
    }

    #[test]
    fn test_migrate_single_model_key() {
        let file = write_temp_json(r#"{ "agent": { "model": "legacy-model" } }"#);
        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.agent.tool_model, "legacy-model");
    }

    #[test]
    fn test_migrate_no_overwrite() {
        let file = write_temp_json(r#"{ "agent": { "model": "legacy", "toolModel": "current" } }"#);
        let config = load_config_from_path(file.path()).unwrap();
        assert_eq!(config.agent.tool_model, "current");
    }

    #[test]
    fn test_env_override_max_iterations() {
        std::env::set_var("MCPILOT_AGENT__MAX_ITERATIONS", "3");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.agent.max_iterations, 3);
        std::env::remove_var("MCPILOT_AGENT__MAX_ITERATIONS");
    }

    #[test]
    fn test_env_override_parallel_flag() {
        std::env::set_var("MCPILOT_AGENT__PARALLEL_TOOL_CALLS", "1");
        let config = apply_env_overrides(Config::default());
        assert!(config.agent.parallel_tool_calls);
        std::env::remove_var("MCPILOT_AGENT__PARALLEL_TOOL_CALLS");
    }

    #[test]
    fn test_env_override_brave_key() {
        std::env::set_var("MCPILOT_TOOLS__WEB__BRAVE_API_KEY", "brave-env-key");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.tools.web.brave_api_key, "brave-env-key");
        std::env::remove_var("MCPILOT_TOOLS__WEB__BRAVE_API_KEY");
    }

    #[test]
    fn test_saved_json_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        save_config(&Config::default(), Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&content).unwrap();

        assert!(raw["agent"].get("toolTimeoutSecs").is_some());
        assert!(raw["agent"].get("tool_timeout_secs").is_none());
    }
}
