//! Human approval for destructive tool calls.
//!
//! A sensitive call suspends the act step with an [`ApprovalRequest`]. The
//! caller answers with an [`ApprovalResponse`]; its first decision is applied
//! when `act` is re-entered.

mod gate;

pub use gate::{ApprovalGate, GateVerdict};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::Display;

use crate::config::ApprovalConfig;
use crate::types::{ToolCall, ToolResultMessage};

/// Embedded in the tool result of a rejected call; `generate` looks for it.
pub const REJECT_MARKER: &str = "[turnstile:action-rejected]";

/// Assistant reply used instead of a model call right after a rejection.
pub const REJECTION_ANNOUNCEMENT: &str =
    "The action was rejected, so I did not perform it. Let me know if you would like me to do something else.";

const DEFAULT_REJECT_MESSAGE: &str = "The user rejected this action.";

/// Decides whether a tool call must be approved before it runs.
pub trait ApprovalPolicy: Send + Sync {
    fn requires_approval(&self, call: &ToolCall) -> bool;
}

/// Flags calls whose name mentions both a window/browser resource and a
/// destructive verb, e.g. `delete_browser_window`.
#[derive(Debug, Clone, PartialEq)]
pub struct DestructiveBrowserPolicy {
    resource_keywords: Vec<String>,
    action_keywords: Vec<String>,
}

impl DestructiveBrowserPolicy {
    pub fn new<R, A>(resource_keywords: R, action_keywords: A) -> Self
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        let lower = |s: &str| s.to_lowercase();
        Self {
            resource_keywords: resource_keywords.into_iter().map(|k| lower(k.as_ref())).collect(),
            action_keywords: action_keywords.into_iter().map(|k| lower(k.as_ref())).collect(),
        }
    }

    pub fn from_config(config: &ApprovalConfig) -> Self {
        Self::new(&config.resource_keywords, &config.action_keywords)
    }
}

impl Default for DestructiveBrowserPolicy {
    fn default() -> Self {
        Self::from_config(&ApprovalConfig::default())
    }
}

impl ApprovalPolicy for DestructiveBrowserPolicy {
    fn requires_approval(&self, call: &ToolCall) -> bool {
        let name = call.name.to_lowercase();
        let mentions = |keywords: &[String]| keywords.iter().any(|k| name.contains(k.as_str()));
        mentions(&self.resource_keywords[..]) && mentions(&self.action_keywords[..])
    }
}

/// Decision kinds a reviewer may choose from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DecisionKind {
    Approve,
    Reject,
    Edit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRequest {
    pub name: String,
    pub args: Map<String, Value>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewConfig {
    pub action_name: String,
    pub allowed_decisions: Vec<DecisionKind>,
}

/// Surfaced to the caller when a call is suspended for review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalRequest {
    pub action_requests: Vec<ActionRequest>,
    pub review_configs: Vec<ReviewConfig>,
}

impl ApprovalRequest {
    pub fn for_call(call: &ToolCall, allow_edit: bool) -> Self {
        let mut allowed_decisions = vec![DecisionKind::Approve, DecisionKind::Reject];
        if allow_edit {
            allowed_decisions.push(DecisionKind::Edit);
        }
        Self {
            action_requests: vec![ActionRequest {
                name: call.name.clone(),
                args: call.args.clone(),
                description: format!(
                    "'{}' is a destructive action and needs approval before it runs. \
                     Review the arguments carefully.",
                    call.name
                ),
            }],
            review_configs: vec![ReviewConfig {
                action_name: call.name.clone(),
                allowed_decisions,
            }],
        }
    }

    pub fn allows(&self, kind: DecisionKind) -> bool {
        self.review_configs
            .iter()
            .any(|c| c.allowed_decisions.contains(&kind))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditedAction {
    pub args: Map<String, Value>,
}

/// A reviewer's answer for one suspended call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Edit { edited_action: EditedAction },
}

impl Decision {
    pub fn reject() -> Self {
        Self::Reject { message: None }
    }

    /// Parse one decision leniently; anything malformed is a rejection.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|_| Self::reject())
    }

    pub fn kind(&self) -> DecisionKind {
        match self {
            Self::Approve => DecisionKind::Approve,
            Self::Reject { .. } => DecisionKind::Reject,
            Self::Edit { .. } => DecisionKind::Edit,
        }
    }
}

/// Reply injected when resuming a suspended act step.
///
/// Decisions stay raw JSON until applied so one malformed entry cannot
/// poison the whole response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApprovalResponse {
    #[serde(default)]
    pub decisions: Vec<Value>,
}

impl ApprovalResponse {
    pub fn new(decision: Decision) -> Self {
        let value = serde_json::to_value(&decision).unwrap_or(Value::Null);
        Self {
            decisions: vec![value],
        }
    }

    pub fn approve() -> Self {
        Self::new(Decision::Approve)
    }

    pub fn reject(message: Option<String>) -> Self {
        Self::new(Decision::Reject { message })
    }

    pub fn edit(args: Map<String, Value>) -> Self {
        Self::new(Decision::Edit {
            edited_action: EditedAction { args },
        })
    }

    /// Parse any JSON value; a value that is not a response yields no decisions.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Only the first decision is honored; none at all means reject.
    pub fn first_decision(&self) -> Decision {
        self.decisions
            .first()
            .map(Decision::from_value)
            .unwrap_or_else(Decision::reject)
    }
}

/// A suspended call awaiting a decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingApproval {
    pub tool_call_id: String,
    pub name: String,
    pub args: Map<String, Value>,
    pub request: ApprovalRequest,
}

impl PendingApproval {
    pub fn new(call: &ToolCall, allow_edit: bool) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            args: call.args.clone(),
            request: ApprovalRequest::for_call(call, allow_edit),
        }
    }
}

/// Error-flagged result recording that `call` was rejected.
pub fn rejection_result(call: &ToolCall, message: Option<&str>) -> ToolResultMessage {
    let message = message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_REJECT_MESSAGE);
    ToolResultMessage::error(call, format!("{REJECT_MARKER} {message}"))
}

pub fn is_rejection(result: &ToolResultMessage) -> bool {
    result.is_error && result.content.contains(REJECT_MARKER)
}
