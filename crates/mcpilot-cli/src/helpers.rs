//! Shared CLI helpers — path expansion, response printing, progress rendering.

use std::path::PathBuf;

use colored::Colorize;
use tokio::sync::mpsc;

use mcpilot_agent::{AgentEvent, ModelRole, RunError};
use mcpilot_core::utils::truncate_string;

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Print an agent response to stdout.
pub fn print_response(response: &str) {
    println!();
    println!("{}", "mcpilot".cyan().bold());
    if response.trim().is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{response}");
    }
    println!();
}

/// Print a failed run. A run that hit the iteration cap still has an answer
/// worth showing.
pub fn print_run_error(err: &RunError) {
    if let Some(partial) = err.partial_answer() {
        print_response(partial);
        eprintln!("{} {err}\n", "⚠".yellow());
    } else {
        eprintln!("\n{} {err}\n", "❌ Error:".red());
    }
}

/// Print the banner shown at REPL start.
pub fn print_banner(tools: usize) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "mcpilot".cyan().bold(), version.dimmed());
    println!("{}", format!("{tools} tools available.").dimmed());
    println!(
        "{}",
        "Type a query, \"quit\" to exit. Ctrl-C cancels a running query.".dimmed()
    );
    println!();
}

/// One progress line for an agent event, or `None` for events not shown.
pub fn format_event(event: &AgentEvent) -> Option<String> {
    match event {
        AgentEvent::ModelSelected {
            model,
            role: ModelRole::Final,
        } => Some(format!("✎ polishing answer with {model}")),
        AgentEvent::ToolStarted {
            name, arguments, ..
        } => Some(format!("→ {name} {}", truncate_string(arguments, 80))),
        AgentEvent::ToolFinished {
            name, success: false, ..
        } => Some(format!("✗ {name} failed")),
        _ => None,
    }
}

/// Print progress lines to stderr until the sender side is dropped.
pub async fn render_progress(mut events: mpsc::UnboundedReceiver<AgentEvent>) {
    while let Some(event) = events.recv().await {
        if let Some(line) = format_event(&event) {
            eprintln!("  {}", line.dimmed());
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
