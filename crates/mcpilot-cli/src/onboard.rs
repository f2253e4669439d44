//! `mcpilot onboard` — write a default configuration.
//!
//! - Creates `~/.mcpilot/config.json` with defaults (never overwrites)
//! - Creates the REPL history directory

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use mcpilot_core::config::{get_config_path, load_config, save_config};
use mcpilot_core::utils::get_history_path;

/// Run the onboard command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "mcpilot — Setup".cyan().bold());
    println!();

    let config_path = get_config_path();
    if write_default_config(&config_path)? {
        println!("  {} created config at {}", "✓".green(), config_path.display());
    } else {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            config_path.display()
        );
    }

    if let Some(history_dir) = get_history_path().parent() {
        std::fs::create_dir_all(history_dir)?;
        println!("  {} history at {}", "✓".green(), history_dir.display());
    }

    println!();
    println!("  Next steps:");
    println!("    1. Set {} in the config or export OPENAI_API_KEY", "provider.apiKey".bold());
    println!(
        "    2. Add MCP servers under {} or pass {}",
        "servers".bold(),
        "--server path/to/server.py".bold()
    );
    println!("    3. Run {}", "mcpilot agent".bold());
    println!();

    Ok(())
}

/// Write the default config (with env overrides applied) if `path` is free.
///
/// Returns `false` when a file already exists.
fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let config = load_config(Some(path))?;
    save_config(&config, Some(path))?;
    Ok(true)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_config_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        assert!(write_default_config(&path).unwrap());

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(written["agent"]["toolModel"].is_string());
        assert!(written["tools"]["web"]["enabled"].as_bool().unwrap());
    }

    #[test]
    fn existing_config_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{\"agent\":{\"toolModel\":\"mine\"}}").unwrap();

        assert!(!write_default_config(&path).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\"agent\":{\"toolModel\":\"mine\"}}"
        );
    }
}
