//! Stream Assembler — folds incremental model events into complete turns.
//!
//! Text deltas are concatenated; tool-call deltas are grouped by call id in
//! first-seen order. Nothing is parsed until `TurnComplete` arrives, at which
//! point each call's name and argument payload are checked.

use std::collections::HashMap;

use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use mcpilot_core::{ToolCallRequest, Turn};
use mcpilot_providers::{EventStream, ProviderError, StreamEvent};

use crate::error::{AssemblyError, StreamProtocolError};
use crate::events::{emit, AgentEvent, EventSender};

/// One finished model turn.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssembledTurn {
    pub text: Option<String>,
    pub calls: Vec<ToolCallRequest>,
    pub finish_reason: Option<String>,
    /// A tool-call delta arrived before any text.
    pub calls_first: bool,
}

impl AssembledTurn {
    pub fn has_tool_calls(&self) -> bool {
        !self.calls.is_empty()
    }

    /// Transcript turns, text and call batch in the order the stream
    /// produced them.
    pub fn into_turns(self) -> Vec<Turn> {
        let mut turns = Vec::with_capacity(2);
        if let Some(text) = self.text {
            turns.push(Turn::assistant(text));
        }
        if !self.calls.is_empty() {
            let batch = Turn::tool_calls(self.calls);
            if self.calls_first {
                turns.insert(0, batch);
            } else {
                turns.push(batch);
            }
        }
        turns
    }
}

#[derive(Debug)]
struct PendingCall {
    id: String,
    name: Option<String>,
    arguments: String,
}

/// Accumulation state for a single turn.
#[derive(Debug, Default)]
pub struct TurnBuffer {
    text: String,
    calls: Vec<PendingCall>,
    by_id: HashMap<String, usize>,
    /// Set by the first content event of the turn: `true` for a call delta.
    calls_first: Option<bool>,
}

impl TurnBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns the finished turn on `TurnComplete`.
    pub fn apply(&mut self, event: StreamEvent) -> Result<Option<AssembledTurn>, StreamProtocolError> {
        match event {
            StreamEvent::TextDelta(delta) => {
                if !delta.is_empty() {
                    self.calls_first.get_or_insert(false);
                }
                self.text.push_str(&delta);
                Ok(None)
            }
            StreamEvent::ToolCallDelta {
                id,
                name,
                arguments,
            } => {
                self.calls_first.get_or_insert(true);
                let idx = match self.by_id.get(&id) {
                    Some(&idx) => idx,
                    None => {
                        self.calls.push(PendingCall {
                            id: id.clone(),
                            name: None,
                            arguments: String::new(),
                        });
                        self.by_id.insert(id, self.calls.len() - 1);
                        self.calls.len() - 1
                    }
                };
                let call = &mut self.calls[idx];
                if call.name.is_none() {
                    call.name = name.filter(|n| !n.is_empty());
                }
                call.arguments.push_str(&arguments);
                Ok(None)
            }
            StreamEvent::TurnComplete { finish_reason } => self.finish(finish_reason).map(Some),
        }
    }

    fn finish(&mut self, finish_reason: Option<String>) -> Result<AssembledTurn, StreamProtocolError> {
        let pending = std::mem::take(&mut self.calls);
        self.by_id.clear();
        let calls_first = self.calls_first.take() == Some(true);

        if finish_reason.as_deref() == Some("length") && !pending.is_empty() {
            return Err(StreamProtocolError::Truncated {
                pending: pending.len(),
            });
        }

        let mut calls = Vec::with_capacity(pending.len());
        for call in pending {
            let name = call
                .name
                .ok_or_else(|| StreamProtocolError::MissingName { id: call.id.clone() })?;
            let arguments = if call.arguments.trim().is_empty() {
                "{}".to_string()
            } else {
                serde_json::from_str::<Value>(&call.arguments).map_err(|e| {
                    StreamProtocolError::InvalidArguments {
                        id: call.id.clone(),
                        reason: e.to_string(),
                    }
                })?;
                call.arguments
            };
            calls.push(ToolCallRequest::new(call.id, name, arguments));
        }

        let text = std::mem::take(&mut self.text);
        Ok(AssembledTurn {
            text: (!text.is_empty()).then_some(text),
            calls,
            finish_reason,
            calls_first,
        })
    }
}

/// Drain `stream` into one turn, forwarding text deltas to `observer`.
///
/// Stops reading at `TurnComplete`. A stream that ends first is
/// [`StreamProtocolError::Incomplete`]; a transport error is
/// [`AssemblyError::Unavailable`].
pub async fn assemble(
    mut stream: EventStream,
    observer: Option<&EventSender>,
    cancel: &CancellationToken,
) -> Result<AssembledTurn, AssemblyError> {
    let mut buffer = TurnBuffer::new();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Err(AssemblyError::Cancelled),
            next = stream.next() => next,
        };

        let event = match next {
            None => return Err(StreamProtocolError::Incomplete.into()),
            Some(Err(ProviderError::Unavailable(reason))) => {
                return Err(AssemblyError::Unavailable(reason))
            }
            Some(Err(ProviderError::Protocol(reason))) => {
                return Err(StreamProtocolError::Decode(reason).into())
            }
            Some(Ok(event)) => event,
        };
        trace!(?event, "stream event");

        if let StreamEvent::TextDelta(ref delta) = event {
            emit(observer, AgentEvent::TextDelta(delta.clone()));
        }

        if let Some(turn) = buffer.apply(event)? {
            debug!(
                text_len = turn.text.as_ref().map_or(0, |t| t.len()),
                tool_calls = turn.calls.len(),
                finish_reason = ?turn.finish_reason,
                "turn assembled"
            );
            return Ok(turn);
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
