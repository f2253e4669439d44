//! Progress events emitted while a run is in flight.
//!
//! Consumers (the CLI) subscribe through an unbounded channel and render
//! them live. Sending never blocks the loop; a dropped receiver is ignored.

use tokio::sync::mpsc;

use crate::router::ModelRole;

#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A model was picked for the next invocation.
    ModelSelected { model: String, role: ModelRole },
    /// A text chunk streamed from the model.
    TextDelta(String),
    /// A tool call is about to be dispatched.
    ToolStarted {
        call_id: String,
        name: String,
        arguments: String,
    },
    /// A tool call produced its outcome.
    ToolFinished {
        call_id: String,
        name: String,
        success: bool,
    },
}

pub type EventSender = mpsc::UnboundedSender<AgentEvent>;

/// Send if anyone is listening.
pub(crate) fn emit(observer: Option<&EventSender>, event: AgentEvent) {
    if let Some(tx) = observer {
        let _ = tx.send(event);
    }
}
