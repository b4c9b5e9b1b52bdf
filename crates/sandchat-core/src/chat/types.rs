//! Conversation data model
//!
//! Messages are append-only once their turn completes; only the in-progress
//! last assistant message mutates while a stream is being consumed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Reference to a file attached to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Lifecycle of a single tool call inside an assistant turn.
/// Transitions only move forward; `Result` and `Error` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Pending,
    Executing,
    Result,
    Error,
}

impl InvocationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Result | Self::Error)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Executing => 1,
            Self::Result | Self::Error => 2,
        }
    }
}

/// One tool call embedded in an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub call_id: String,
    pub tool_name: String,
    pub state: InvocationState,
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ToolInvocation {
    /// A call announced before its arguments finished streaming
    pub fn pending(call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            state: InvocationState::Pending,
            args: Value::Null,
            result: None,
        }
    }

    /// A fully specified call the backend is executing
    pub fn executing(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            state: InvocationState::Executing,
            args,
            result: None,
        }
    }

    /// Move to a later lifecycle state. Returns false (and leaves the
    /// invocation untouched) if the transition would regress or the current
    /// state is already terminal.
    pub fn advance(&mut self, next: InvocationState) -> bool {
        if self.state.is_terminal() || next.rank() < self.state.rank() {
            return false;
        }
        self.state = next;
        true
    }
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub tool_invocations: Vec<ToolInvocation>,
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            text: text.into(),
            tool_invocations: Vec::new(),
            attachments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Empty assistant message, built up incrementally as frames arrive
    pub fn assistant() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            text: String::new(),
            tool_invocations: Vec::new(),
            attachments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn invocation(&self, call_id: &str) -> Option<&ToolInvocation> {
        self.tool_invocations.iter().find(|t| t.call_id == call_id)
    }

    pub fn invocation_mut(&mut self, call_id: &str) -> Option<&mut ToolInvocation> {
        self.tool_invocations
            .iter_mut()
            .find(|t| t.call_id == call_id)
    }

    /// Wire shape the backend expects in the `messages` array
    pub fn to_wire(&self) -> Value {
        let mut message = json!({
            "role": self.role,
            "content": self.text,
        });
        if !self.tool_invocations.is_empty() {
            let invocations: Vec<Value> = self
                .tool_invocations
                .iter()
                .map(|inv| {
                    let mut wire = json!({
                        "state": if inv.state == InvocationState::Result { "result" } else { "call" },
                        "toolCallId": inv.call_id,
                        "toolName": inv.tool_name,
                        "args": inv.args,
                    });
                    if let Some(result) = &inv.result {
                        wire["result"] = result.clone();
                    }
                    wire
                })
                .collect();
            message["toolInvocations"] = Value::Array(invocations);
        }
        if !self.attachments.is_empty() {
            let attachments: Vec<Value> = self
                .attachments
                .iter()
                .map(|a| json!({ "name": a.name, "url": a.url }))
                .collect();
            message["experimental_attachments"] = Value::Array(attachments);
        }
        message
    }
}

/// Why the backend ended a generation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Other,
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "stop" => Self::Stop,
            "tool-calls" => Self::ToolCalls,
            _ => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invocation_moves_forward_only() {
        let mut inv = ToolInvocation::pending("call-1", "python_interpreter");
        assert!(inv.advance(InvocationState::Executing));
        assert!(inv.advance(InvocationState::Result));

        // Terminal states are immutable
        assert!(!inv.advance(InvocationState::Executing));
        assert!(!inv.advance(InvocationState::Pending));
        assert!(!inv.advance(InvocationState::Error));
        assert_eq!(inv.state, InvocationState::Result);
    }

    #[test]
    fn test_executing_never_regresses_to_pending() {
        let mut inv = ToolInvocation::executing("call-2", "get_current_weather", json!({}));
        assert!(!inv.advance(InvocationState::Pending));
        assert_eq!(inv.state, InvocationState::Executing);
    }

    #[test]
    fn test_wire_shape_includes_tool_results() {
        let mut message = ChatMessage::assistant();
        message.text = "done".to_string();
        let mut inv =
            ToolInvocation::executing("call-3", "python_interpreter", json!({"code": "1+1"}));
        inv.advance(InvocationState::Result);
        inv.result = Some(json!({"outputs": []}));
        message.tool_invocations.push(inv);

        let wire = message.to_wire();
        assert_eq!(wire["role"], "assistant");
        assert_eq!(wire["toolInvocations"][0]["state"], "result");
        assert_eq!(wire["toolInvocations"][0]["toolCallId"], "call-3");
        assert_eq!(wire["toolInvocations"][0]["result"]["outputs"], json!([]));
    }

    #[test]
    fn test_wire_shape_includes_attachments() {
        let mut message = ChatMessage::user("analyze this");
        message.attachments.push(Attachment {
            name: "sales.csv".to_string(),
            url: None,
        });

        let wire = message.to_wire();
        assert_eq!(wire["experimental_attachments"][0]["name"], "sales.csv");
        // Plain messages stay minimal
        let plain = ChatMessage::user("hi").to_wire();
        assert!(plain.get("experimental_attachments").is_none());
        assert!(plain.get("toolInvocations").is_none());
    }

    #[test]
    fn test_finish_reason_parse() {
        assert_eq!(FinishReason::parse("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::parse("tool-calls"), FinishReason::ToolCalls);
        assert_eq!(FinishReason::parse("length"), FinishReason::Other);
    }
}
