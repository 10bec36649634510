//! Generate and act steps of a conversation turn.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::types::{ActOutcome, DispatchOutcome};
use crate::approval::{
    is_rejection, ApprovalGate, ApprovalPolicy, ApprovalResponse, Decision, GateVerdict,
    PendingApproval, REJECTION_ANNOUNCEMENT,
};
use crate::config::{AgentConfig, TurnstileConfig};
use crate::error::{Result, TurnstileError};
use crate::provider::{sanitize_history, stream_message, ModelProvider, ProviderRequest};
use crate::tools::{render_tool_output, ToolRegistry};
use crate::types::{AssistantMessage, ChunkSink, GenerationSettings, Message, ToolCall, ToolResultMessage};

/// Runs the two steps of a turn against a provider and a tool registry.
///
/// The orchestrator holds no conversation state: both steps read and append
/// to the history they are handed, so a suspended act step can be re-entered
/// from a restored history.
pub struct TurnOrchestrator {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<dyn ToolRegistry>,
    gate: ApprovalGate,
    settings: GenerationSettings,
    agent: AgentConfig,
    sink: Option<ChunkSink>,
}

impl TurnOrchestrator {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        registry: Arc<dyn ToolRegistry>,
        config: &TurnstileConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            gate: ApprovalGate::from_config(&config.approval),
            settings: config.generation.clone(),
            agent: config.agent.clone(),
            sink: None,
        }
    }

    /// Replace the name-based sensitivity policy.
    pub fn with_policy(mut self, policy: Arc<dyn ApprovalPolicy>) -> Self {
        self.gate = self.gate.with_policy(policy);
        self
    }

    /// Receive content and reasoning chunks while a message streams.
    pub fn with_chunk_sink(mut self, sink: ChunkSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn agent_config(&self) -> &AgentConfig {
        &self.agent
    }

    pub fn registry(&self) -> &Arc<dyn ToolRegistry> {
        &self.registry
    }

    /// Produce the next assistant message and append it to `history`.
    ///
    /// Right after a rejected action the model is not called; a fixed
    /// announcement is appended instead so the rejected call is not retried.
    pub async fn generate(&self, history: &mut Vec<Message>) -> Result<AssistantMessage> {
        if let Some(Message::ToolResult(last)) = history.last() {
            if is_rejection(last) {
                debug!(tool_call_id = %last.tool_call_id, "last action was rejected, skipping model call");
                let message = AssistantMessage::text(REJECTION_ANNOUNCEMENT);
                history.push(Message::Assistant(message.clone()));
                return Ok(message);
            }
        }

        let tools = self.registry.list_tools().await?;
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(prompt) = &self.agent.system_prompt {
            if !history.iter().any(|m| matches!(m, Message::System { .. })) {
                messages.push(Message::system(prompt.clone()));
            }
        }
        messages.extend(sanitize_history(history));

        let request = ProviderRequest {
            messages,
            settings: self.settings.clone(),
            tools,
        };
        let message = stream_message(self.provider.as_ref(), &request, self.sink.clone()).await?;
        history.push(Message::Assistant(message.clone()));
        Ok(message)
    }

    /// Execute the tool calls of the most recent assistant message.
    ///
    /// Calls that already have a result in `history` are skipped, so
    /// re-entering after a suspension never dispatches a call twice. `resume`
    /// carries the reviewer's answer for the suspended call.
    pub async fn act(
        &self,
        history: &mut Vec<Message>,
        resume: Option<ApprovalResponse>,
    ) -> Result<ActOutcome> {
        let calls = history
            .iter()
            .rev()
            .find_map(Message::as_assistant)
            .map(|msg| msg.tool_calls.clone())
            .ok_or_else(|| TurnstileError::InvalidState("act needs an assistant message in history".into()))?;

        let answered: HashSet<&str> = history
            .iter()
            .filter_map(Message::as_tool_result)
            .map(|r| r.tool_call_id.as_str())
            .collect();
        let pending: Vec<ToolCall> = calls
            .into_iter()
            .filter(|call| !answered.contains(call.id.as_str()))
            .collect();
        drop(answered);

        debug!(pending = pending.len(), resuming = resume.is_some(), "act step");

        let mut decision: Option<Decision> = resume.map(|r| r.first_decision());
        let mut results: Vec<ToolResultMessage> = Vec::new();
        let mut batch: Vec<&ToolCall> = Vec::new();
        let mut sequential = !self.agent.parallel_tool_calls;

        for (position, call) in pending.iter().enumerate() {
            let sensitive = self.gate.requires_approval(call, self.registry.as_ref());
            if !sensitive && !sequential {
                batch.push(call);
                continue;
            }
            sequential = true;

            let mut steps = self.dispatch_parallel(std::mem::take(&mut batch)).await;
            let outcome = if sensitive {
                self.dispatch_gated(call, decision.take()).await
            } else {
                self.dispatch(call, &call.args).await
            };
            steps.push((call, outcome));

            match settle(&mut results, steps) {
                Flow::Continue => {}
                Flow::Stop => {
                    let abandoned = pending.len() - position - 1;
                    if abandoned > 0 {
                        debug!(abandoned, "rejection abandoned the remaining tool calls");
                    }
                    return Ok(complete(history, results));
                }
                Flow::Suspend(pending) => return Ok(suspend(history, results, pending)),
            }
        }

        let steps = self.dispatch_parallel(batch).await;
        if let Flow::Suspend(pending) = settle(&mut results, steps) {
            return Ok(suspend(history, results, pending));
        }
        Ok(complete(history, results))
    }

    async fn dispatch(&self, call: &ToolCall, args: &Map<String, Value>) -> DispatchOutcome {
        match self.registry.call_tool(&call.name, args).await {
            Ok(value) => DispatchOutcome::Output(render_tool_output(&value)),
            Err(err) => {
                warn!(tool = %call.name, tool_call_id = %call.id, error = %err, "tool dispatch failed");
                DispatchOutcome::Failed(failure_message(err))
            }
        }
    }

    async fn dispatch_gated(&self, call: &ToolCall, decision: Option<Decision>) -> DispatchOutcome {
        match self.gate.review(call, decision) {
            GateVerdict::Proceed(args) => self.dispatch(call, &args).await,
            GateVerdict::Rejected(result) => DispatchOutcome::Rejected(result),
            GateVerdict::Suspend(pending) => DispatchOutcome::Suspend(pending),
        }
    }

    async fn dispatch_parallel<'a>(
        &self,
        batch: Vec<&'a ToolCall>,
    ) -> Vec<(&'a ToolCall, DispatchOutcome)> {
        if batch.is_empty() {
            return Vec::new();
        }
        debug!(calls = batch.len(), "dispatching tool calls concurrently");
        let outcomes = join_all(batch.iter().map(|call| self.dispatch(call, &call.args))).await;
        batch.into_iter().zip(outcomes).collect()
    }
}

impl std::fmt::Debug for TurnOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_id())
            .field("gate", &self.gate)
            .field("agent", &self.agent)
            .finish_non_exhaustive()
    }
}

enum Flow {
    Continue,
    Stop,
    Suspend(PendingApproval),
}

/// Turn dispatch outcomes into results, in order, until one stops the batch.
fn settle<'a>(
    results: &mut Vec<ToolResultMessage>,
    steps: impl IntoIterator<Item = (&'a ToolCall, DispatchOutcome)>,
) -> Flow {
    for (call, outcome) in steps {
        match outcome {
            DispatchOutcome::Output(text) => results.push(ToolResultMessage::success(call, text)),
            DispatchOutcome::Failed(message) => results.push(ToolResultMessage::error(
                call,
                format!("Error executing tool: {message}"),
            )),
            DispatchOutcome::Rejected(result) => {
                results.push(result);
                return Flow::Stop;
            }
            DispatchOutcome::Suspend(pending) => return Flow::Suspend(pending),
        }
    }
    Flow::Continue
}

fn complete(history: &mut Vec<Message>, results: Vec<ToolResultMessage>) -> ActOutcome {
    history.extend(results.iter().cloned().map(Message::ToolResult));
    ActOutcome::Completed(results)
}

fn suspend(
    history: &mut Vec<Message>,
    completed: Vec<ToolResultMessage>,
    pending: PendingApproval,
) -> ActOutcome {
    history.extend(completed.iter().cloned().map(Message::ToolResult));
    ActOutcome::Suspended { completed, pending }
}

fn failure_message(err: TurnstileError) -> String {
    match err {
        TurnstileError::ToolExecution { message, .. } => message,
        other => other.to_string(),
    }
}
