//! Tool Registry — the merged tool catalogue across all servers.
//!
//! Servers are registered one by one; each registration lists the server's
//! tools, checks every schema, and records which server owns which name.
//! The registry is built once at startup and then shared read-only.

use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use mcpilot_core::types::ToolDefinition;

use super::server::{ToolServer, ToolSpec};
use crate::error::DiscoveryError;

// ─────────────────────────────────────────────
// Descriptor & handle
// ─────────────────────────────────────────────

/// A discovered tool, as the model sees it.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema for the argument object.
    pub parameters: Value,
    /// Name of the server that owns the tool.
    pub server: String,
}

impl ToolDescriptor {
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, &self.description, self.parameters.clone())
    }
}

/// Shared handle to one server. Servers that cannot take concurrent
/// requests get a gate so calls to them are queued.
pub(crate) struct ServerHandle {
    server: Arc<dyn ToolServer>,
    gate: Option<Mutex<()>>,
}

impl ServerHandle {
    fn new(server: Arc<dyn ToolServer>) -> Self {
        let gate = (!server.supports_concurrency()).then(|| Mutex::new(()));
        Self { server, gate }
    }

    pub(crate) async fn call(&self, tool: &str, arguments: Value) -> anyhow::Result<String> {
        let _guard = match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };
        self.server.call_tool(tool, arguments).await
    }
}

pub(crate) struct RegisteredTool {
    pub(crate) descriptor: ToolDescriptor,
    pub(crate) handle: Arc<ServerHandle>,
    pub(crate) validator: JSONSchema,
}

// ─────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────

/// Stores tools keyed by name.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register every tool of `server`.
    ///
    /// All-or-nothing per server: if the listing fails or any schema is
    /// malformed, nothing from this server is added. A name already owned by
    /// another server is taken over (last registration wins) with a warning.
    pub async fn register(
        &mut self,
        server: Arc<dyn ToolServer>,
    ) -> Result<Vec<ToolDescriptor>, DiscoveryError> {
        let server_name = server.name().to_string();

        let specs = server
            .list_tools()
            .await
            .map_err(|e| DiscoveryError::Unreachable {
                server: server_name.clone(),
                reason: e.to_string(),
            })?;

        let mut checked = Vec::with_capacity(specs.len());
        for spec in specs {
            let validator =
                compile_schema(&spec).map_err(|reason| DiscoveryError::MalformedSchema {
                    server: server_name.clone(),
                    tool: spec.name.clone(),
                    reason,
                })?;
            checked.push((spec, validator));
        }

        let handle = Arc::new(ServerHandle::new(server));
        let mut descriptors = Vec::with_capacity(checked.len());

        for (spec, validator) in checked {
            if let Some(previous) = self.tools.get(&spec.name) {
                warn!(
                    tool = %spec.name,
                    previous_server = %previous.descriptor.server,
                    new_server = %server_name,
                    "tool name collision, last registration wins"
                );
            }

            let descriptor = ToolDescriptor {
                name: spec.name,
                description: spec.description,
                parameters: spec.input_schema,
                server: server_name.clone(),
            };
            descriptors.push(descriptor.clone());
            self.tools.insert(
                descriptor.name.clone(),
                RegisteredTool {
                    descriptor,
                    handle: handle.clone(),
                    validator,
                },
            );
        }

        info!(
            server = %server_name,
            tools = descriptors.len(),
            serialized = handle.gate.is_some(),
            "registered tool server"
        );
        Ok(descriptors)
    }

    /// Best-effort registration of several servers in order.
    ///
    /// Failed servers are logged and skipped; their errors are returned.
    pub async fn discover(&mut self, servers: Vec<Arc<dyn ToolServer>>) -> Vec<DiscoveryError> {
        let mut failures = Vec::new();
        for server in servers {
            if let Err(e) = self.register(server).await {
                warn!(error = %e, "excluding tool server");
                failures.push(e);
            }
        }
        failures
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name).map(|t| &t.descriptor)
    }

    pub(crate) fn entry(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Check if a tool is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Names of all registered tools, sorted for determinism.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// All descriptors, sorted by name.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descs: Vec<ToolDescriptor> =
            self.tools.values().map(|t| t.descriptor.clone()).collect();
        descs.sort_by(|a, b| a.name.cmp(&b.name));
        descs
    }

    /// Model-facing definitions, sorted by name.
    ///
    /// With `strict`, every schema is closed (`additionalProperties: false`)
    /// and every property is required.
    pub fn definitions(&self, strict: bool) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| {
                let def = t.descriptor.to_definition();
                if strict {
                    def.into_strict()
                } else {
                    def
                }
            })
            .collect();
        defs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        defs
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check the advertised schema and compile it for argument validation.
fn compile_schema(spec: &ToolSpec) -> Result<JSONSchema, String> {
    let schema = spec
        .input_schema
        .as_object()
        .ok_or_else(|| "input schema is not a JSON object".to_string())?;

    if let Some(ty) = schema.get("type") {
        if ty != "object" {
            return Err(format!("input schema type must be \"object\", got {ty}"));
        }
    }
    if let Some(props) = schema.get("properties") {
        if !props.is_object() {
            return Err("input schema properties must be an object".to_string());
        }
    }

    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&spec.input_schema)
        .map_err(|e| format!("invalid JSON Schema: {e}"))
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
