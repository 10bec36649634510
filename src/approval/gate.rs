use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use super::{rejection_result, ApprovalPolicy, Decision, DestructiveBrowserPolicy, PendingApproval};
use crate::config::ApprovalConfig;
use crate::tools::ToolRegistry;
use crate::types::{ToolCall, ToolResultMessage};

/// What the gate lets happen to one sensitive call.
#[derive(Debug, Clone, PartialEq)]
pub enum GateVerdict {
    /// Dispatch with these arguments.
    Proceed(Map<String, Value>),
    /// Do not dispatch; record this result and abandon the rest of the batch.
    Rejected(ToolResultMessage),
    /// No decision yet; suspend the act step.
    Suspend(PendingApproval),
}

/// Applies an [`ApprovalPolicy`] and reviewer decisions to tool calls.
#[derive(Clone)]
pub struct ApprovalGate {
    policy: Arc<dyn ApprovalPolicy>,
    allow_edit: bool,
}

impl ApprovalGate {
    pub fn new(policy: Arc<dyn ApprovalPolicy>, allow_edit: bool) -> Self {
        Self { policy, allow_edit }
    }

    pub fn from_config(config: &ApprovalConfig) -> Self {
        Self::new(
            Arc::new(DestructiveBrowserPolicy::from_config(config)),
            config.allow_edit,
        )
    }

    pub fn with_policy(mut self, policy: Arc<dyn ApprovalPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn requires_approval(&self, call: &ToolCall, registry: &dyn ToolRegistry) -> bool {
        self.policy.requires_approval(call) || registry.requires_approval(call)
    }

    /// Apply `decision` (if any) to a call already known to be sensitive.
    pub fn review(&self, call: &ToolCall, decision: Option<Decision>) -> GateVerdict {
        let Some(decision) = decision else {
            debug!(tool = %call.name, tool_call_id = %call.id, "suspending for approval");
            return GateVerdict::Suspend(PendingApproval::new(call, self.allow_edit));
        };
        debug!(tool = %call.name, tool_call_id = %call.id, decision = %decision.kind(), "applying approval decision");
        match decision {
            Decision::Approve => GateVerdict::Proceed(call.args.clone()),
            Decision::Edit { edited_action } if self.allow_edit => {
                GateVerdict::Proceed(edited_action.args)
            }
            Decision::Edit { .. } => GateVerdict::Rejected(rejection_result(
                call,
                Some("Editing this action is not allowed; it was treated as rejected."),
            )),
            Decision::Reject { message } => {
                GateVerdict::Rejected(rejection_result(call, message.as_deref()))
            }
        }
    }
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::from_config(&ApprovalConfig::default())
    }
}

impl std::fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("allow_edit", &self.allow_edit)
            .finish_non_exhaustive()
    }
}
