//! `mcpilot status` — show the effective configuration.

use anyhow::{Context, Result};
use colored::Colorize;

use mcpilot_core::config::{get_config_path, load_config, Config};

/// Run the status command.
pub fn run() -> Result<()> {
    let config_path = get_config_path();
    let config = load_config(Some(&config_path))
        .with_context(|| format!("cannot show status for {}", config_path.display()))?;

    println!();
    println!("{}", "mcpilot Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        if config_path.exists() {
            "✓".green().to_string()
        } else {
            "(not found, using defaults)".red().to_string()
        }
    );

    // Provider
    println!("  {:<18} {}", "API base:".bold(), config.provider.api_base);
    println!("  {:<18} {}", "API key:".bold(), key_status(config.provider.is_configured()));

    // Models
    let agent = &config.agent;
    println!("  {:<18} {}", "Tool model:".bold(), agent.tool_model);
    println!("  {:<18} {}", "Final model:".bold(), final_model_label(&config));
    println!(
        "  {:<18} {}",
        "Parameters:".bold(),
        format!(
            "temp: {} | max_tokens: {} | max_iterations: {} | tool timeout: {}s",
            agent.temperature, agent.max_tokens, agent.max_iterations, agent.tool_timeout_secs
        )
        .dimmed()
    );
    println!(
        "  {:<18} {}",
        "Tool calls:".bold(),
        if agent.parallel_tool_calls {
            "parallel"
        } else {
            "sequential"
        }
    );

    // Servers
    println!();
    println!("  {}", "Tool servers:".bold());
    if config.servers.is_empty() {
        println!("    {}", "· none configured".dimmed());
    }
    for server in &config.servers {
        let line = format!("{} {}", server.command, server.args.join(" "));
        let status = match server.validate() {
            Ok(()) => line.trim().dimmed().to_string(),
            Err(e) => e.to_string().red().to_string(),
        };
        println!("    {:<20} {}", server.name, status);
    }

    // Web research
    println!();
    let web = &config.tools.web;
    let web_status = if !web.enabled {
        format!("{}", "· disabled".dimmed())
    } else {
        let key_set = !web.brave_api_key.is_empty() || std::env::var("BRAVE_API_KEY").is_ok();
        format!("enabled, Brave key {}", key_status(key_set))
    };
    println!("  {:<18} {}", "Web research:".bold(), web_status);

    if let Err(e) = config.validate() {
        println!();
        println!("  {} {}", "✗".red(), e);
    }

    println!();

    Ok(())
}

fn key_status(set: bool) -> String {
    if set {
        format!("{} (set)", "✓".green())
    } else {
        format!("{}", "· not configured".dimmed())
    }
}

fn final_model_label(config: &Config) -> String {
    let agent = &config.agent;
    if !agent.final_polish {
        "(final pass off)".to_string()
    } else if agent.final_model.trim().is_empty() {
        "(none)".to_string()
    } else {
        agent.final_model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_model_label_reflects_polish_setting() {
        let mut config = Config::default();
        assert_eq!(final_model_label(&config), "gpt-4.1");

        config.agent.final_polish = false;
        assert_eq!(final_model_label(&config), "(final pass off)");

        config.agent.final_polish = true;
        config.agent.final_model.clear();
        assert_eq!(final_model_label(&config), "(none)");
    }
}
