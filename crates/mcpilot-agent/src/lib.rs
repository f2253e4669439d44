//! mcpilot agent — orchestration loop, tools, and context builder.
//!
//! This crate contains:
//! - **tools**: tool servers (MCP, in-process web research), registry, invoker
//! - **assembler**: folds streamed model events into complete turns
//! - **router**: tool model vs final model selection
//! - **context**: system prompt construction
//! - **agent_loop**: the LLM ↔ tool-calling main loop

pub mod agent_loop;
pub mod assembler;
pub mod context;
pub mod error;
pub mod events;
pub mod router;
pub mod tools;

pub use agent_loop::AgentLoop;
pub use assembler::{assemble, AssembledTurn, TurnBuffer};
pub use context::{ContextBuilder, FINAL_INSTRUCTION};
pub use error::{AssemblyError, DiscoveryError, RunError, StreamProtocolError};
pub use events::{AgentEvent, EventSender};
pub use router::{IterationContext, ModelConfig, ModelRole, ModelRouter, Phase};
pub use tools::{McpServer, ToolInvoker, ToolRegistry, ToolServer};
