//! Interactive REPL.
//!
//! Uses `rustyline` for readline-style editing with persistent history.
//! Each query starts a fresh conversation.

use anyhow::Result;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use mcpilot_agent::{AgentLoop, RunError};
use mcpilot_core::utils::get_history_path;

use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["quit", "exit", ":q"];

/// Run the interactive REPL loop.
pub async fn run(agent: &AgentLoop) -> Result<()> {
    helpers::print_banner(agent.registry().len());

    let mut editor = create_editor()?;

    loop {
        let input = match editor.readline("Query: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => break,
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        if is_exit_command(trimmed) {
            println!("\nGoodbye!");
            break;
        }

        let _ = editor.add_history_entry(&input);

        debug!(input = trimmed, "processing query");
        match run_query(agent, trimmed).await {
            Ok(answer) => helpers::print_response(&answer),
            Err(e) => helpers::print_run_error(&e),
        }
    }

    save_history(&mut editor);

    Ok(())
}

/// Run one query; Ctrl-C cancels it and returns to the prompt.
async fn run_query(agent: &AgentLoop, query: &str) -> Result<String, RunError> {
    let cancel = CancellationToken::new();
    let mut conv = agent.new_conversation(query);

    let run = agent.run(&mut conv, &cancel);
    tokio::pin!(run);

    let finished = tokio::select! {
        result = &mut run => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    match finished {
        Some(result) => result,
        None => {
            cancel.cancel();
            run.await
        }
    }
}

/// Create a rustyline editor with history.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = get_history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

/// Save history to disk.
fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = get_history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

/// Check if input is an exit command.
fn is_exit_command(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_COMMANDS.contains(&lower.as_str())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_commands() {
        assert!(is_exit_command("quit"));
        assert!(is_exit_command("EXIT"));
        assert!(is_exit_command(":q"));
        assert!(is_exit_command("Quit"));
        assert!(!is_exit_command("quit now"));
        assert!(!is_exit_command("hello"));
        assert!(!is_exit_command(""));
    }

    #[test]
    fn history_path_under_data_dir() {
        let path = get_history_path();
        assert!(path.to_string_lossy().contains(".mcpilot"));
        assert!(path.to_string_lossy().contains("cli_history"));
    }
}
