//! mcpilot CLI — entry point.
//!
//! # Commands
//!
//! - `mcpilot agent [-m MESSAGE] [--server PATH]...` — single-shot or REPL
//! - `mcpilot onboard` — write a default config
//! - `mcpilot status` — show the effective configuration

mod helpers;
mod onboard;
mod repl;
mod status;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mcpilot_agent::tools::web_research_server;
use mcpilot_agent::{AgentEvent, AgentLoop, McpServer, ToolRegistry, ToolServer};
use mcpilot_core::config::{load_config, Config, ServerConfig};
use mcpilot_providers::HttpProvider;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// mcpilot — tool-calling research agent over MCP servers
#[derive(Parser)]
#[command(name = "mcpilot", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the agent (single-shot or interactive REPL)
    Agent {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Extra MCP server script to launch (.py or .js). Repeatable.
        #[arg(short, long = "server", value_name = "PATH")]
        servers: Vec<String>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Write a default configuration file
    Onboard,

    /// Show configuration and tool server status
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Agent {
            message,
            servers,
            logs,
        } => {
            init_logging(logs);
            run_agent(message, servers).await
        }
        Commands::Onboard => onboard::run(),
        Commands::Status => status::run(),
    }
}

// ─────────────────────────────────────────────
// Agent command
// ─────────────────────────────────────────────

async fn run_agent(message: Option<String>, scripts: Vec<String>) -> Result<()> {
    let (events_tx, events_rx) = mpsc::unbounded_channel::<AgentEvent>();
    let agent = start_agent(None, &scripts).await?.with_observer(events_tx);
    let progress = tokio::spawn(helpers::render_progress(events_rx));

    match message {
        Some(msg) => {
            info!("processing single message");
            let result = agent.process_direct(&msg).await;
            drop(agent);
            let _ = progress.await;
            match result {
                Ok(answer) => helpers::print_response(&answer),
                Err(e) => {
                    helpers::print_run_error(&e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            repl::run(&agent).await?;
        }
    }

    Ok(())
}

/// Load the config file and build the agent. A config file that exists but
/// cannot be read or parsed stops startup.
async fn start_agent(config_path: Option<&Path>, scripts: &[String]) -> Result<AgentLoop> {
    let config = load_config(config_path).context("failed to load configuration")?;
    build_agent_loop(&config, scripts).await
}

/// Merge configured servers with `--server` scripts and validate them all.
///
/// A leading `~/` in a configured command or argument is expanded.
fn resolve_servers(config: &Config, scripts: &[String]) -> Result<Vec<ServerConfig>> {
    let expand = |s: &String| helpers::expand_tilde(s).to_string_lossy().into_owned();
    let mut servers: Vec<ServerConfig> = config
        .servers
        .iter()
        .map(|server| ServerConfig {
            command: expand(&server.command),
            args: server.args.iter().map(expand).collect(),
            ..server.clone()
        })
        .collect();
    for script in scripts {
        servers.push(ServerConfig::from_script(script)?);
    }
    for server in &servers {
        server.validate()?;
    }
    Ok(servers)
}

/// Build an `AgentLoop` from the loaded configuration.
///
/// Fails when the configuration is invalid or when tool servers were
/// requested but none of them could be registered.
pub async fn build_agent_loop(config: &Config, scripts: &[String]) -> Result<AgentLoop> {
    config.validate()?;
    let server_configs = resolve_servers(config, scripts)?;

    let provider = HttpProvider::new(&config.provider).context("failed to create model client")?;

    let mut connected: Vec<Arc<dyn ToolServer>> = Vec::new();
    let mut unreachable = 0;
    for server in &server_configs {
        match McpServer::connect(server).await {
            Ok(s) => connected.push(Arc::new(s)),
            Err(e) => {
                warn!(error = %e, "excluding tool server");
                unreachable += 1;
            }
        }
    }

    let mut registry = ToolRegistry::new();
    let failed = registry.discover(connected).await.len() + unreachable;
    let usable = server_configs.len() - failed;
    if !server_configs.is_empty() && usable == 0 {
        bail!(
            "none of the {} requested tool servers could be registered",
            server_configs.len()
        );
    }

    if config.tools.web.enabled {
        registry
            .register(Arc::new(web_research_server(&config.tools.web)))
            .await?;
    }

    info!(
        servers = usable,
        tools = registry.len(),
        "tool registry ready"
    );
    debug!(names = ?registry.tool_names(), "registered tools");

    Ok(AgentLoop::new(Arc::new(provider), Arc::new(registry), &config.agent))
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("mcpilot=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
