//! Conversation transcript — the ordered turns replayed on every model call.
//!
//! The orchestration loop owns a [`Conversation`] and is the only thing that
//! appends to it. Everything else produces [`Turn`] values and hands them over.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{Message, ToolCall};

// ─────────────────────────────────────────────
// Tool call / result values
// ─────────────────────────────────────────────

/// A tool invocation requested by the model.
///
/// `arguments` is the raw accumulated payload from the stream. It is only
/// guaranteed to be valid JSON once the stream assembler has finalized it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    fn to_wire(&self) -> ToolCall {
        ToolCall::new(&self.id, &self.name, &self.arguments)
    }
}

/// Success payload or failure reason of one tool call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum Outcome {
    Success(String),
    Failure(String),
}

/// The result paired with the [`ToolCallRequest`] it answers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub outcome: Outcome,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: Outcome::Success(payload.into()),
        }
    }

    pub fn failure(call_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: Outcome::Failure(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    /// Text the model sees for this result.
    pub fn content(&self) -> String {
        match &self.outcome {
            Outcome::Success(payload) => payload.clone(),
            Outcome::Failure(reason) => format!("Error: {reason}"),
        }
    }
}

// ─────────────────────────────────────────────
// Turns
// ─────────────────────────────────────────────

/// One unit of conversation content, in transcript order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    UserText { text: String },
    AssistantText { text: String },
    AssistantToolCalls { calls: Vec<ToolCallRequest> },
    ToolOutcome { result: ToolResult },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Turn::UserText { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Turn::AssistantText { text: text.into() }
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Turn::AssistantToolCalls { calls }
    }

    pub fn outcome(result: ToolResult) -> Self {
        Turn::ToolOutcome { result }
    }
}

// ─────────────────────────────────────────────
// Conversation
// ─────────────────────────────────────────────

/// Ordered transcript for one user query, plus the system prompt.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    system_prompt: Option<String>,
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            system_prompt,
            turns: Vec::new(),
        }
    }

    /// Start a conversation with a single user query.
    pub fn with_query(system_prompt: Option<String>, query: impl Into<String>) -> Self {
        let mut conv = Self::new(system_prompt);
        conv.push(Turn::user(query));
        conv
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Replace the text of the most recent assistant text turn.
    ///
    /// Returns `false` (and appends a new text turn) if there was none.
    pub fn replace_last_assistant_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        let last = self
            .turns
            .iter_mut()
            .rev()
            .find_map(|t| match t {
                Turn::AssistantText { text } => Some(text),
                _ => None,
            });
        match last {
            Some(slot) => {
                *slot = text;
                true
            }
            None => {
                self.turns.push(Turn::assistant(text));
                false
            }
        }
    }

    /// All assistant text emitted since the most recent user turn, joined by newlines.
    pub fn assistant_text_since_last_user(&self) -> String {
        let start = self
            .turns
            .iter()
            .rposition(|t| matches!(t, Turn::UserText { .. }))
            .map_or(0, |i| i + 1);
        self.turns[start..]
            .iter()
            .filter_map(|t| match t {
                Turn::AssistantText { text } if !text.trim().is_empty() => Some(text.trim()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Ids of tool calls that have no matching outcome yet, in request order.
    pub fn pending_call_ids(&self) -> Vec<String> {
        let answered: HashSet<&str> = self
            .turns
            .iter()
            .filter_map(|t| match t {
                Turn::ToolOutcome { result } => Some(result.call_id.as_str()),
                _ => None,
            })
            .collect();
        self.turns
            .iter()
            .filter_map(|t| match t {
                Turn::AssistantToolCalls { calls } => Some(calls),
                _ => None,
            })
            .flatten()
            .filter(|c| !answered.contains(c.id.as_str()))
            .map(|c| c.id.clone())
            .collect()
    }

    /// Every tool call batch is answered, in order, before the next assistant
    /// turn. Text the model emitted after its calls in the same turn may sit
    /// directly behind the batch.
    pub fn is_well_formed(&self) -> bool {
        let mut expected: Vec<&str> = Vec::new();
        let mut after_batch = false;
        for turn in &self.turns {
            match turn {
                Turn::ToolOutcome { result } => {
                    if expected.first() != Some(&result.call_id.as_str()) {
                        return false;
                    }
                    expected.remove(0);
                }
                Turn::AssistantToolCalls { calls } => {
                    if !expected.is_empty() {
                        return false;
                    }
                    expected = calls.iter().map(|c| c.id.as_str()).collect();
                }
                Turn::AssistantText { .. } if after_batch => {}
                Turn::AssistantText { .. } | Turn::UserText { .. } => {
                    if !expected.is_empty() {
                        return false;
                    }
                }
            }
            after_batch = matches!(turn, Turn::AssistantToolCalls { .. });
        }
        expected.is_empty()
    }

    /// Render into wire messages. `system_suffix` is appended to the system prompt.
    ///
    /// An assistant text turn and a tool-call batch next to each other (in
    /// either order) become a single assistant message carrying both.
    pub fn render(&self, system_suffix: Option<&str>) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.turns.len() + 1);

        let system = match (self.system_prompt.as_deref(), system_suffix) {
            (Some(p), Some(s)) => Some(format!("{p}\n{s}")),
            (Some(p), None) => Some(p.to_string()),
            (None, Some(s)) => Some(s.to_string()),
            (None, None) => None,
        };
        if let Some(system) = system {
            messages.push(Message::system(system));
        }

        let mut iter = self.turns.iter().peekable();
        while let Some(turn) = iter.next() {
            match turn {
                Turn::UserText { text } => messages.push(Message::user(text)),
                Turn::AssistantText { text } => {
                    if let Some(Turn::AssistantToolCalls { calls }) = iter.peek() {
                        let wire = calls.iter().map(ToolCallRequest::to_wire).collect();
                        messages.push(Message::assistant_tool_calls(Some(text.clone()), wire));
                        iter.next();
                    } else {
                        messages.push(Message::assistant(text));
                    }
                }
                Turn::AssistantToolCalls { calls } => {
                    let wire = calls.iter().map(ToolCallRequest::to_wire).collect();
                    let content = if let Some(Turn::AssistantText { text }) = iter.peek() {
                        let text = text.clone();
                        iter.next();
                        Some(text)
                    } else {
                        None
                    };
                    messages.push(Message::assistant_tool_calls(content, wire));
                }
                Turn::ToolOutcome { result } => {
                    messages.push(Message::tool_result(&result.call_id, result.content()));
                }
            }
        }

        messages
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
