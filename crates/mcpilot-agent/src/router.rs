//! Model Router — picks which model serves each invocation.
//!
//! Planning iterations go to the cheap tool model. Once it answers in plain
//! text, an optional single pass with the final model rewrites that answer.

use std::fmt;

use mcpilot_core::config::AgentConfig;
use mcpilot_providers::{LlmRequestConfig, ToolChoice};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelRole {
    Tool,
    Final,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::Tool => write!(f, "tool"),
            ModelRole::Final => write!(f, "final"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub model: String,
    pub role: ModelRole,
    pub request: LlmRequestConfig,
}

/// Where the loop is within a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Planning,
    Finalizing,
}

#[derive(Clone, Copy, Debug)]
pub struct IterationContext {
    pub iteration: u32,
    pub phase: Phase,
}

#[derive(Clone, Debug)]
pub struct ModelRouter {
    tool: ModelConfig,
    final_model: Option<ModelConfig>,
}

impl ModelRouter {
    pub fn new(tool: ModelConfig, final_model: Option<ModelConfig>) -> Self {
        Self { tool, final_model }
    }

    /// Build from config. The final pass is on only when `finalPolish` is set
    /// and `finalModel` is non-empty.
    pub fn from_config(config: &AgentConfig) -> Self {
        let request = LlmRequestConfig {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };
        let tool = ModelConfig {
            model: config.tool_model.clone(),
            role: ModelRole::Tool,
            request: request.clone(),
        };
        let final_model = (config.final_polish && !config.final_model.trim().is_empty()).then(|| {
            ModelConfig {
                model: config.final_model.clone(),
                role: ModelRole::Final,
                request,
            }
        });
        Self::new(tool, final_model)
    }

    pub fn select(&self, ctx: &IterationContext) -> &ModelConfig {
        match (ctx.phase, &self.final_model) {
            (Phase::Finalizing, Some(final_model)) => final_model,
            _ => &self.tool,
        }
    }

    /// Tools are offered while planning and withheld on the final pass.
    pub fn tool_choice(&self, ctx: &IterationContext) -> ToolChoice {
        match ctx.phase {
            Phase::Planning => ToolChoice::Auto,
            Phase::Finalizing => ToolChoice::None,
        }
    }

    pub fn has_final_pass(&self) -> bool {
        self.final_model.is_some()
    }

    pub fn tool_model(&self) -> &str {
        &self.tool.model
    }

    pub fn final_model(&self) -> Option<&str> {
        self.final_model.as_ref().map(|m| m.model.as_str())
    }
}
