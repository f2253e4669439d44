//! Tool servers, the merged registry, and the invoker.

pub mod base;
pub mod invoker;
pub mod mcp;
pub mod registry;
pub mod server;
pub mod web;

pub use base::{optional_usize, require_string, Tool};
pub use invoker::ToolInvoker;
pub use mcp::McpServer;
pub use registry::{ToolDescriptor, ToolRegistry};
pub use server::{LocalToolServer, ToolServer, ToolSpec};
pub use web::web_research_server;
