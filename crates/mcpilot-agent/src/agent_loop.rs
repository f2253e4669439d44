//! Agent loop — the model ↔ tool-calling main loop.
//!
//! One run drives a [`Conversation`] through
//! `AwaitingModel → {ExecutingTools, Finalizing} → Done`:
//! the tool model is called with the transcript; tool calls are executed and
//! their outcomes appended in request order; plain text ends planning and,
//! if configured, gets one rewrite by the final model.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mcpilot_core::config::AgentConfig;
use mcpilot_core::types::ToolDefinition;
use mcpilot_core::{Conversation, ToolCallRequest, ToolResult, Turn};
use mcpilot_providers::{ChatRequest, ModelClient, ProviderError};

use crate::assembler::{assemble, AssembledTurn};
use crate::context::{ContextBuilder, FINAL_INSTRUCTION};
use crate::error::{AssemblyError, RunError, StreamProtocolError};
use crate::events::{emit, AgentEvent, EventSender};
use crate::router::{IterationContext, ModelRouter, Phase};
use crate::tools::{ToolInvoker, ToolRegistry};

/// Partial answer used when the iteration cap is hit before any text.
const NO_PROGRESS_ANSWER: &str =
    "I ran out of steps before reaching an answer. The tool results gathered so far are in the transcript.";

/// Loop limits and retry budgets.
#[derive(Clone, Debug)]
struct LoopSettings {
    max_iterations: u32,
    parallel_tool_calls: bool,
    strict_tools: bool,
    stream_retries: u32,
    model_retries: u32,
    retry_backoff: Duration,
}

impl From<&AgentConfig> for LoopSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_iterations: config.max_iterations.max(1),
            parallel_tool_calls: config.parallel_tool_calls,
            strict_tools: config.strict_tools,
            stream_retries: config.stream_retries,
            model_retries: config.model_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

// ─────────────────────────────────────────────
// AgentLoop
// ─────────────────────────────────────────────

pub struct AgentLoop {
    /// Streaming model client.
    model: Arc<dyn ModelClient>,
    /// Dispatches tool calls against the shared registry.
    invoker: ToolInvoker,
    /// Chooses tool vs final model.
    router: ModelRouter,
    /// System prompt builder.
    context: ContextBuilder,
    settings: LoopSettings,
    /// Optional progress sink.
    observer: Option<EventSender>,
}

impl AgentLoop {
    pub fn new(model: Arc<dyn ModelClient>, registry: Arc<ToolRegistry>, config: &AgentConfig) -> Self {
        let invoker = ToolInvoker::new(registry, Duration::from_secs(config.tool_timeout_secs));
        let router = ModelRouter::from_config(config);

        info!(
            provider = model.display_name(),
            tool_model = %router.tool_model(),
            final_model = router.final_model().unwrap_or("(none)"),
            tools = invoker.registry().len(),
            max_iterations = config.max_iterations,
            "agent loop initialized"
        );

        Self {
            model,
            invoker,
            router,
            context: ContextBuilder::new(config.system_prompt.clone()),
            settings: LoopSettings::from(config),
            observer: None,
        }
    }

    /// Report progress to `observer` during runs.
    pub fn with_observer(mut self, observer: EventSender) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a reference to the tool registry.
    pub fn registry(&self) -> &ToolRegistry {
        self.invoker.registry()
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    /// Fresh conversation for one user query.
    pub fn new_conversation(&self, query: &str) -> Conversation {
        let prompt = self
            .context
            .build_system_prompt(&self.registry().descriptors());
        Conversation::with_query(Some(prompt), query)
    }

    /// Direct processing mode (CLI entry point).
    pub async fn process_direct(&self, text: &str) -> Result<String, RunError> {
        let mut conv = self.new_conversation(text);
        self.run(&mut conv, &CancellationToken::new()).await
    }

    /// Drive `conv` to a final answer.
    ///
    /// The conversation is left well-formed on every exit path: a partially
    /// streamed turn is never appended, and calls that were cut short by
    /// cancellation get a `cancelled` failure outcome.
    pub async fn run(&self, conv: &mut Conversation, cancel: &CancellationToken) -> Result<String, RunError> {
        let definitions = self.registry().definitions(self.settings.strict_tools);
        let mut iteration = 0;

        loop {
            if iteration >= self.settings.max_iterations {
                let partial = conv.assistant_text_since_last_user();
                let partial = if partial.is_empty() {
                    NO_PROGRESS_ANSWER.to_string()
                } else {
                    partial
                };
                warn!(iterations = iteration, "iteration cap reached without a final answer");
                return Err(RunError::MaxIterationsExceeded {
                    partial,
                    iterations: iteration,
                });
            }

            let ctx = IterationContext {
                iteration,
                phase: Phase::Planning,
            };
            let turn = self.call_model(conv, &ctx, &definitions, None, cancel).await?;
            iteration += 1;

            if turn.has_tool_calls() {
                let calls = turn.calls.clone();
                for t in turn.into_turns() {
                    conv.push(t);
                }
                self.execute_tools(conv, &calls, cancel).await?;
                continue;
            }

            let draft = turn.text.unwrap_or_default();
            conv.push(Turn::assistant(draft.clone()));

            if !self.router.has_final_pass() {
                info!(iterations = iteration, "run complete");
                return Ok(draft);
            }

            return self.finalize(conv, iteration, &definitions, draft, cancel).await;
        }
    }

    /// One final-model pass over the full transcript, tools withheld.
    async fn finalize(
        &self,
        conv: &mut Conversation,
        iteration: u32,
        definitions: &[ToolDefinition],
        draft: String,
        cancel: &CancellationToken,
    ) -> Result<String, RunError> {
        let ctx = IterationContext {
            iteration,
            phase: Phase::Finalizing,
        };
        let turn = self
            .call_model(conv, &ctx, definitions, Some(FINAL_INSTRUCTION), cancel)
            .await?;

        if turn.has_tool_calls() {
            let model = self.router.select(&ctx).model.clone();
            warn!(model = %model, calls = turn.calls.len(), "final model requested tools");
            return Err(RunError::ProtocolViolation { model });
        }

        info!(iterations = iteration, "run complete after final pass");
        match turn.text {
            Some(text) => {
                conv.replace_last_assistant_text(text.clone());
                Ok(text)
            }
            None => Ok(draft),
        }
    }

    // ────────────── Model calls ──────────────

    /// Invoke the routed model, retrying malformed streams and transport
    /// failures within their budgets.
    async fn call_model(
        &self,
        conv: &Conversation,
        ctx: &IterationContext,
        definitions: &[ToolDefinition],
        system_suffix: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AssembledTurn, RunError> {
        let selected = self.router.select(ctx);
        emit(
            self.observer.as_ref(),
            AgentEvent::ModelSelected {
                model: selected.model.clone(),
                role: selected.role,
            },
        );

        let request = ChatRequest {
            model: selected.model.clone(),
            messages: conv.render(system_suffix),
            tools: definitions.to_vec(),
            tool_choice: self.router.tool_choice(ctx),
            config: selected.request.clone(),
        };

        debug!(
            iteration = ctx.iteration,
            phase = ?ctx.phase,
            model = %request.model,
            messages = request.messages.len(),
            "calling model"
        );

        let mut protocol_failures = 0;
        let mut transport_failures = 0;
        loop {
            match self.attempt(&request, cancel).await {
                Ok(turn) => return Ok(turn),
                Err(AssemblyError::Cancelled) => return Err(RunError::Cancelled),
                Err(AssemblyError::Protocol(source)) => {
                    protocol_failures += 1;
                    if protocol_failures > self.settings.stream_retries {
                        return Err(RunError::StreamProtocol {
                            attempts: protocol_failures,
                            source,
                        });
                    }
                    warn!(attempt = protocol_failures, error = %source, "malformed model stream, retrying");
                }
                Err(AssemblyError::Unavailable(reason)) => {
                    transport_failures += 1;
                    if transport_failures > self.settings.model_retries {
                        return Err(RunError::ModelUnavailable {
                            attempts: transport_failures,
                            reason,
                        });
                    }
                    let delay = self.settings.retry_backoff * 2u32.saturating_pow(transport_failures - 1);
                    warn!(attempt = transport_failures, delay = ?delay, error = %reason, "model unavailable, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(RunError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn attempt(&self, request: &ChatRequest, cancel: &CancellationToken) -> Result<AssembledTurn, AssemblyError> {
        let opened = tokio::select! {
            _ = cancel.cancelled() => return Err(AssemblyError::Cancelled),
            opened = self.model.stream_chat(request) => opened,
        };
        let stream = opened.map_err(|e| match e {
            ProviderError::Unavailable(reason) => AssemblyError::Unavailable(reason),
            ProviderError::Protocol(reason) => StreamProtocolError::Decode(reason).into(),
        })?;
        assemble(stream, self.observer.as_ref(), cancel).await
    }

    // ────────────── Tool execution ──────────────

    /// Execute one batch. Outcomes are appended in request order even when
    /// calls run concurrently and finish out of order.
    async fn execute_tools(
        &self,
        conv: &mut Conversation,
        calls: &[ToolCallRequest],
        cancel: &CancellationToken,
    ) -> Result<(), RunError> {
        let limit = if self.settings.parallel_tool_calls {
            calls.len().max(1)
        } else {
            1
        };

        let mut outcomes =
            std::pin::pin!(futures::stream::iter(calls.iter().map(|call| self.run_one(call))).buffered(limit));

        let mut answered = 0;
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    for call in &calls[answered..] {
                        conv.push(Turn::outcome(ToolResult::failure(&call.id, "cancelled")));
                    }
                    warn!(cancelled = calls.len() - answered, "run cancelled during tool execution");
                    return Err(RunError::Cancelled);
                }
                next = outcomes.next() => next,
            };
            match next {
                Some(result) => {
                    conv.push(Turn::outcome(result));
                    answered += 1;
                }
                None => {
                    debug_assert!(conv.pending_call_ids().is_empty(), "tool batch left unanswered");
                    return Ok(());
                }
            }
        }
    }

    async fn run_one(&self, call: &ToolCallRequest) -> ToolResult {
        info!(tool = %call.name, call_id = %call.id, "executing tool call");
        emit(
            self.observer.as_ref(),
            AgentEvent::ToolStarted {
                call_id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        );

        let result = self.invoker.invoke(call).await;

        debug!(
            tool = %call.name,
            success = result.is_success(),
            result_len = result.content().len(),
            "tool result"
        );
        emit(
            self.observer.as_ref(),
            AgentEvent::ToolFinished {
                call_id: call.id.clone(),
                name: call.name.clone(),
                success: result.is_success(),
            },
        );
        result
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
