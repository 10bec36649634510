//! Outcome types for the turn loop.

use serde::{Deserialize, Serialize};

use crate::approval::{ApprovalRequest, PendingApproval};
use crate::types::{AssistantMessage, Message, ToolResultMessage};

/// Where the loop goes after a generate step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Act,
    End,
}

/// `Act` iff the last history entry is an assistant message with tool calls.
pub fn route(history: &[Message]) -> Route {
    match history.last() {
        Some(Message::Assistant(msg)) if msg.has_tool_calls() => Route::Act,
        _ => Route::End,
    }
}

/// Result of dispatching one tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Rendered tool output.
    Output(String),
    /// Execution failed; the message becomes an error-flagged result.
    Failed(String),
    /// A rejected sensitive call; the rest of the batch is abandoned.
    Rejected(ToolResultMessage),
    /// Waiting on a reviewer.
    Suspend(PendingApproval),
}

/// Result of one act step.
#[derive(Debug, Clone, PartialEq)]
pub enum ActOutcome {
    /// Results appended to history this step.
    Completed(Vec<ToolResultMessage>),
    /// Results produced before the suspension were appended; one call awaits review.
    Suspended {
        completed: Vec<ToolResultMessage>,
        pending: PendingApproval,
    },
}

/// Result of driving a conversation until it stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Finished { message: AssistantMessage },
    AwaitingApproval { request: ApprovalRequest },
}

impl TurnOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;
    use serde_json::Map;

    #[test]
    fn routes_on_last_message() {
        let mut with_calls = AssistantMessage::text("");
        with_calls.tool_calls.push(ToolCall::new("t1", "lookup", Map::new()));
        let call = with_calls.tool_calls[0].clone();

        assert_eq!(route(&[]), Route::End);
        assert_eq!(route(&[Message::human("hi")]), Route::End);
        assert_eq!(route(&[Message::Assistant(AssistantMessage::text("done"))]), Route::End);
        assert_eq!(route(&[Message::Assistant(with_calls.clone())]), Route::Act);
        assert_eq!(
            route(&[
                Message::Assistant(with_calls),
                Message::ToolResult(ToolResultMessage::success(&call, "ok")),
            ]),
            Route::End
        );
    }
}
