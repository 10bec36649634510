//! Resumable conversation driver.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::runner::TurnOrchestrator;
use super::types::{route, ActOutcome, Route, TurnOutcome};
use crate::approval::{ApprovalResponse, PendingApproval};
use crate::error::{Result, TurnstileError};
use crate::types::Message;

/// Serializable state of a conversation, taken between steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub history: Vec<Message>,
    #[serde(default)]
    pub pending: Option<PendingApproval>,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Owns a history and drives generate → act until the model stops calling
/// tools or a call needs approval.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use turnstile::prelude::*;
/// # async fn demo(orchestrator: Arc<TurnOrchestrator>) -> turnstile::Result<()> {
/// let mut conversation = Conversation::new(orchestrator);
/// let mut outcome = conversation.send("Close the stale browser windows").await?;
/// while let TurnOutcome::AwaitingApproval { request } = outcome {
///     println!("{}", request.action_requests[0].description);
///     outcome = conversation.resume(ApprovalResponse::approve()).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Conversation {
    orchestrator: Arc<TurnOrchestrator>,
    history: Vec<Message>,
    pending: Option<PendingApproval>,
}

impl Conversation {
    pub fn new(orchestrator: Arc<TurnOrchestrator>) -> Self {
        Self::with_history(orchestrator, Vec::new())
    }

    pub fn with_history(orchestrator: Arc<TurnOrchestrator>, history: Vec<Message>) -> Self {
        Self {
            orchestrator,
            history,
            pending: None,
        }
    }

    /// Rebuild a conversation from a checkpoint, including any pending approval.
    pub fn restore(orchestrator: Arc<TurnOrchestrator>, checkpoint: Checkpoint) -> Self {
        Self {
            orchestrator,
            history: checkpoint.history,
            pending: checkpoint.pending,
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            history: self.history.clone(),
            pending: self.pending.clone(),
            saved_at: Utc::now(),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn pending(&self) -> Option<&PendingApproval> {
        self.pending.as_ref()
    }

    /// Append a human message and run the loop.
    pub async fn send(&mut self, text: impl Into<String>) -> Result<TurnOutcome> {
        self.ensure_not_pending()?;
        self.history.push(Message::human(text));
        self.run().await
    }

    /// Run generate/act until the turn finishes or suspends.
    pub async fn run(&mut self) -> Result<TurnOutcome> {
        self.ensure_not_pending()?;
        let max_iterations = self.orchestrator.agent_config().max_iterations;

        for iteration in 1..=max_iterations {
            let message = self.orchestrator.generate(&mut self.history).await?;
            debug!(
                iteration,
                message_id = %message.id,
                tool_calls = message.tool_calls.len(),
                "generate step complete"
            );
            if route(&self.history) == Route::End {
                return Ok(TurnOutcome::Finished { message });
            }
            match self.orchestrator.act(&mut self.history, None).await? {
                ActOutcome::Completed(_) => {}
                ActOutcome::Suspended { pending, .. } => return Ok(self.suspend(pending)),
            }
        }

        Err(TurnstileError::InvalidState(format!(
            "tool loop exceeded max iterations ({max_iterations})"
        )))
    }

    /// Apply a reviewer's answer to the pending call and continue the loop.
    pub async fn resume(&mut self, response: ApprovalResponse) -> Result<TurnOutcome> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| TurnstileError::InvalidState("no tool call is awaiting approval".into()))?;
        debug!(tool = %pending.name, tool_call_id = %pending.tool_call_id, "resuming act step");

        match self.orchestrator.act(&mut self.history, Some(response)).await {
            Ok(ActOutcome::Suspended { pending, .. }) => Ok(self.suspend(pending)),
            Ok(ActOutcome::Completed(_)) => self.run().await,
            Err(err) => {
                self.pending = Some(pending);
                Err(err)
            }
        }
    }

    fn suspend(&mut self, pending: PendingApproval) -> TurnOutcome {
        let request = pending.request.clone();
        self.pending = Some(pending);
        TurnOutcome::AwaitingApproval { request }
    }

    fn ensure_not_pending(&self) -> Result<()> {
        match &self.pending {
            Some(pending) => Err(TurnstileError::InvalidState(format!(
                "tool call {} is awaiting approval; resume it first",
                pending.tool_call_id
            ))),
            None => Ok(()),
        }
    }
}
