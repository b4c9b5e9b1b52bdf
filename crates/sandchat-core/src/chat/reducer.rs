//! Merge reducer for streamed frames
//!
//! Folds the ordered frame sequence into the message history. This is the
//! only place the in-progress assistant message mutates, so everything
//! downstream can treat the transcript as an append-only list. The reducer
//! is independent of rendering and of the transport that produced the
//! frames.

use serde_json::Value;

use super::frames::StreamFrame;
use super::types::{ChatMessage, InvocationState, Role, ToolInvocation};

/// The conversation history plus the merge state machine over it
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::user(text));
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Apply one frame. Frames must be applied strictly in arrival order.
    pub fn apply(&mut self, frame: StreamFrame) {
        match frame {
            StreamFrame::TextDelta(delta) => {
                self.current_assistant().text.push_str(&delta);
            }
            StreamFrame::ToolCallBegin { call_id, tool_name } => {
                let message = self.current_assistant();
                if message.invocation(&call_id).is_none() {
                    message
                        .tool_invocations
                        .push(ToolInvocation::pending(call_id, tool_name));
                }
            }
            StreamFrame::ToolArgsDelta { call_id, delta } => {
                if let Some(inv) = self.current_assistant().invocation_mut(&call_id) {
                    // Arguments accumulate as text until the full call frame
                    // arrives with the parsed value.
                    match &mut inv.args {
                        Value::String(partial) => partial.push_str(&delta),
                        other => *other = Value::String(delta),
                    }
                }
            }
            StreamFrame::ToolCall {
                call_id,
                tool_name,
                args,
            } => {
                let message = self.current_assistant();
                let known = message
                    .tool_invocations
                    .iter()
                    .position(|t| t.call_id == call_id);
                match known {
                    Some(index) => {
                        let inv = &mut message.tool_invocations[index];
                        if inv.advance(InvocationState::Executing) {
                            inv.tool_name = tool_name;
                            inv.args = args;
                        }
                    }
                    None => {
                        message
                            .tool_invocations
                            .push(ToolInvocation::executing(call_id, tool_name, args));
                    }
                }
            }
            StreamFrame::ToolResult {
                call_id,
                tool_name,
                result,
            } => {
                let message = self.current_assistant();
                let known = message
                    .tool_invocations
                    .iter()
                    .position(|t| t.call_id == call_id);
                match known {
                    Some(index) => {
                        let inv = &mut message.tool_invocations[index];
                        if inv.advance(InvocationState::Result) {
                            inv.result = Some(result);
                        }
                    }
                    None => {
                        // A result may arrive for a call we never saw
                        // announced; record it rather than drop it.
                        let mut inv = ToolInvocation::executing(
                            call_id,
                            tool_name.unwrap_or_default(),
                            Value::Null,
                        );
                        inv.advance(InvocationState::Result);
                        inv.result = Some(result);
                        message.tool_invocations.push(inv);
                    }
                }
            }
            // Terminal frames carry no message content
            StreamFrame::Error(_) | StreamFrame::StepEnd { .. } | StreamFrame::TurnEnd { .. } => {}
        }
    }

    /// Discard every invocation still waiting on the stream. Called when a
    /// turn is cancelled or fails so nothing is left dangling in Executing;
    /// text that already merged is retained.
    pub fn sanitize(&mut self) {
        for message in &mut self.messages {
            message
                .tool_invocations
                .retain(|inv| inv.state.is_terminal());
        }
        let drop_last = matches!(
            self.messages.last(),
            Some(last) if last.role == Role::Assistant
                && last.text.is_empty()
                && last.tool_invocations.is_empty()
        );
        if drop_last {
            self.messages.pop();
        }
    }

    fn current_assistant(&mut self) -> &mut ChatMessage {
        let last_is_assistant = matches!(
            self.messages.last(),
            Some(message) if message.role == Role::Assistant
        );
        if !last_is_assistant {
            self.messages.push(ChatMessage::assistant());
        }
        let index = self.messages.len() - 1;
        &mut self.messages[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tokens_merge_in_order() {
        let mut transcript = Transcript::new();
        transcript.push_user("hello");
        transcript.apply(StreamFrame::TextDelta("Hi".to_string()));
        transcript.apply(StreamFrame::TextDelta(" there".to_string()));
        transcript.apply(StreamFrame::StepEnd {
            finish_reason: "stop".to_string(),
        });

        let messages = transcript.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].text, "Hi there");
    }

    #[test]
    fn test_result_after_many_tokens() {
        let mut transcript = Transcript::new();
        transcript.apply(StreamFrame::ToolCall {
            call_id: "call_1".to_string(),
            tool_name: "python_interpreter".to_string(),
            args: json!({"code": "print(1)"}),
        });
        for _ in 0..16 {
            transcript.apply(StreamFrame::TextDelta("x".to_string()));
        }
        transcript.apply(StreamFrame::ToolResult {
            call_id: "call_1".to_string(),
            tool_name: None,
            result: json!({"outputs": [{"output_type": "stream", "name": "stdout", "text": "1\n"}]}),
        });

        let message = &transcript.messages()[0];
        let inv = message.invocation("call_1").unwrap();
        assert_eq!(inv.state, InvocationState::Result);
        assert!(inv.result.is_some());
        assert_eq!(message.text.len(), 16);
    }

    #[test]
    fn test_pending_call_upgrades_through_lifecycle() {
        let mut transcript = Transcript::new();
        transcript.apply(StreamFrame::ToolCallBegin {
            call_id: "call_2".to_string(),
            tool_name: "get_current_weather".to_string(),
        });
        transcript.apply(StreamFrame::ToolArgsDelta {
            call_id: "call_2".to_string(),
            delta: "{\"latitude\":".to_string(),
        });

        assert_eq!(
            transcript.messages()[0].invocation("call_2").unwrap().state,
            InvocationState::Pending
        );

        transcript.apply(StreamFrame::ToolCall {
            call_id: "call_2".to_string(),
            tool_name: "get_current_weather".to_string(),
            args: json!({"latitude": 37.77, "longitude": -122.42}),
        });

        let inv = transcript.messages()[0].invocation("call_2").unwrap();
        assert_eq!(inv.state, InvocationState::Executing);
        assert_eq!(inv.args["latitude"], json!(37.77));
    }

    #[test]
    fn test_duplicate_result_does_not_regress() {
        let mut transcript = Transcript::new();
        transcript.apply(StreamFrame::ToolCall {
            call_id: "call_3".to_string(),
            tool_name: "python_interpreter".to_string(),
            args: Value::Null,
        });
        transcript.apply(StreamFrame::ToolResult {
            call_id: "call_3".to_string(),
            tool_name: None,
            result: json!({"outputs": []}),
        });
        // A replayed call frame for a finished invocation is ignored
        transcript.apply(StreamFrame::ToolCall {
            call_id: "call_3".to_string(),
            tool_name: "python_interpreter".to_string(),
            args: json!({"code": "later"}),
        });

        let inv = transcript.messages()[0].invocation("call_3").unwrap();
        assert_eq!(inv.state, InvocationState::Result);
        assert_eq!(inv.args, Value::Null);
    }

    #[test]
    fn test_sanitize_discards_incomplete_invocations() {
        let mut transcript = Transcript::new();
        transcript.push_user("run this");
        transcript.apply(StreamFrame::TextDelta("Working on it".to_string()));
        transcript.apply(StreamFrame::ToolCall {
            call_id: "call_4".to_string(),
            tool_name: "python_interpreter".to_string(),
            args: json!({"code": "while True: pass"}),
        });

        transcript.sanitize();

        let message = &transcript.messages()[1];
        // Partial text is retained, the executing invocation is not
        assert_eq!(message.text, "Working on it");
        assert!(message.tool_invocations.is_empty());
    }

    #[test]
    fn test_sanitize_drops_empty_assistant_message() {
        let mut transcript = Transcript::new();
        transcript.push_user("hi");
        transcript.apply(StreamFrame::ToolCallBegin {
            call_id: "call_5".to_string(),
            tool_name: "python_interpreter".to_string(),
        });

        transcript.sanitize();

        assert_eq!(transcript.messages().len(), 1);
        assert_eq!(transcript.messages()[0].role, Role::User);
    }

    #[test]
    fn test_sanitize_keeps_finished_invocations() {
        let mut transcript = Transcript::new();
        transcript.apply(StreamFrame::ToolCall {
            call_id: "done".to_string(),
            tool_name: "python_interpreter".to_string(),
            args: Value::Null,
        });
        transcript.apply(StreamFrame::ToolResult {
            call_id: "done".to_string(),
            tool_name: None,
            result: json!({"outputs": []}),
        });
        transcript.apply(StreamFrame::ToolCall {
            call_id: "in-flight".to_string(),
            tool_name: "python_interpreter".to_string(),
            args: Value::Null,
        });

        transcript.sanitize();

        let message = &transcript.messages()[0];
        assert_eq!(message.tool_invocations.len(), 1);
        assert_eq!(message.tool_invocations[0].call_id, "done");
    }
}
