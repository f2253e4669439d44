//! Error types for discovery, stream assembly, and whole runs.

use thiserror::Error;

/// A tool server could not be added to the registry.
///
/// Never fatal: the server is logged and left out.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("tool server '{server}' is unreachable: {reason}")]
    Unreachable { server: String, reason: String },

    #[error("tool server '{server}' returned a malformed schema for '{tool}': {reason}")]
    MalformedSchema {
        server: String,
        tool: String,
        reason: String,
    },
}

/// The model stream could not be assembled into a well-formed turn.
#[derive(Debug, Error, PartialEq)]
pub enum StreamProtocolError {
    #[error("stream ended before the turn was complete")]
    Incomplete,

    #[error("tool call '{id}' has no function name")]
    MissingName { id: String },

    #[error("tool call '{id}' has arguments that are not valid JSON: {reason}")]
    InvalidArguments { id: String, reason: String },

    #[error("response was cut off at the token limit with {pending} tool call(s) pending")]
    Truncated { pending: usize },

    #[error("{0}")]
    Decode(String),
}

/// Why a single assembly attempt failed.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Protocol(#[from] StreamProtocolError),

    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("cancelled")]
    Cancelled,
}

/// Terminal failure of one orchestration run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("model stream stayed malformed after {attempts} attempt(s): {source}")]
    StreamProtocol {
        attempts: u32,
        #[source]
        source: StreamProtocolError,
    },

    #[error("model unavailable after {attempts} attempt(s): {reason}")]
    ModelUnavailable { attempts: u32, reason: String },

    #[error("no final answer after {iterations} iteration(s)")]
    MaxIterationsExceeded { partial: String, iterations: u32 },

    #[error("final model '{model}' requested tool calls")]
    ProtocolViolation { model: String },

    #[error("run cancelled")]
    Cancelled,
}

impl RunError {
    /// The partial answer carried by [`RunError::MaxIterationsExceeded`].
    pub fn partial_answer(&self) -> Option<&str> {
        match self {
            RunError::MaxIterationsExceeded { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_answer_only_on_max_iterations() {
        let err = RunError::MaxIterationsExceeded {
            partial: "so far".into(),
            iterations: 3,
        };
        assert_eq!(err.partial_answer(), Some("so far"));
        assert_eq!(err.to_string(), "no final answer after 3 iteration(s)");
        assert!(RunError::Cancelled.partial_answer().is_none());
    }

    #[test]
    fn test_stream_protocol_error_chains_source() {
        use std::error::Error;
        let err = RunError::StreamProtocol {
            attempts: 3,
            source: StreamProtocolError::Incomplete,
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("3 attempt(s)"));
    }
}
