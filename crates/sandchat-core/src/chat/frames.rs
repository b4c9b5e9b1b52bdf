//! Wire frames of the streamed chat response
//!
//! The backend answers a chat request with newline-delimited parts, each a
//! one-character code, a colon, and a JSON payload. The parser is
//! incremental: bytes go in as they arrive off the socket, complete lines
//! come out as frames, and anything it does not recognize is skipped so an
//! unexpected part never kills the stream.

use serde_json::Value;

/// One incremental unit of the streamed response
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Assistant text token
    TextDelta(String),
    /// A tool call announced before its arguments finished streaming
    ToolCallBegin { call_id: String, tool_name: String },
    /// Argument text for a previously announced call
    ToolArgsDelta { call_id: String, delta: String },
    /// A fully specified tool call the backend is now executing
    ToolCall {
        call_id: String,
        tool_name: String,
        args: Value,
    },
    /// The executed call's result
    ToolResult {
        call_id: String,
        tool_name: Option<String>,
        result: Value,
    },
    /// Backend-reported stream error
    Error(String),
    /// End of one generation step
    StepEnd { finish_reason: String },
    /// End of the whole turn
    TurnEnd { finish_reason: String },
}

/// Incremental parser for the line-framed stream
#[derive(Debug, Default)]
pub struct DataStreamParser {
    buffer: String,
}

impl DataStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete frames.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamFrame> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut frames = Vec::new();

        while let Some(split) = self.buffer.find('\n') {
            let line = self.buffer[..split].trim_end_matches('\r').to_string();
            self.buffer.drain(0..split + 1);

            if let Some(frame) = parse_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}

fn parse_line(line: &str) -> Option<StreamFrame> {
    let (code, payload) = line.split_once(':')?;
    let value: Value = serde_json::from_str(payload).ok()?;

    match code {
        "0" => value
            .as_str()
            .map(|text| StreamFrame::TextDelta(text.to_string())),
        "3" => value
            .as_str()
            .map(|message| StreamFrame::Error(message.to_string())),
        "b" => {
            let call_id = str_field(&value, "toolCallId")?;
            let tool_name = str_field(&value, "toolName")?;
            Some(StreamFrame::ToolCallBegin { call_id, tool_name })
        }
        "c" => {
            let call_id = str_field(&value, "toolCallId")?;
            let delta = str_field(&value, "argsTextDelta")?;
            Some(StreamFrame::ToolArgsDelta { call_id, delta })
        }
        "9" => {
            let call_id = str_field(&value, "toolCallId")?;
            let tool_name = str_field(&value, "toolName")?;
            let args = value.get("args").cloned().unwrap_or(Value::Null);
            Some(StreamFrame::ToolCall {
                call_id,
                tool_name,
                args,
            })
        }
        "a" => {
            let call_id = str_field(&value, "toolCallId")?;
            let tool_name = str_field(&value, "toolName");
            let result = value.get("result").cloned().unwrap_or(Value::Null);
            Some(StreamFrame::ToolResult {
                call_id,
                tool_name,
                result,
            })
        }
        "e" => Some(StreamFrame::StepEnd {
            finish_reason: finish_reason(&value),
        }),
        "d" => Some(StreamFrame::TurnEnd {
            finish_reason: finish_reason(&value),
        }),
        // Unknown part codes are tolerated, never fatal
        _ => None,
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

fn finish_reason(value: &Value) -> String {
    value
        .get("finishReason")
        .and_then(Value::as_str)
        .unwrap_or("stop")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_frames_incrementally() {
        let mut parser = DataStreamParser::default();

        // Lines can be split at arbitrary byte boundaries
        let mut frames = parser.feed(b"0:\"Hel");
        assert!(frames.is_empty());
        frames.extend(parser.feed(b"lo\"\n0:\" there\"\n"));

        assert_eq!(
            frames,
            vec![
                StreamFrame::TextDelta("Hello".to_string()),
                StreamFrame::TextDelta(" there".to_string()),
            ]
        );
        assert!(parser.is_empty_buffer());
    }

    #[test]
    fn test_parse_tool_call_lifecycle_frames() {
        let mut parser = DataStreamParser::default();
        let input = concat!(
            "b:{\"toolCallId\":\"call_1\",\"toolName\":\"python_interpreter\"}\n",
            "c:{\"toolCallId\":\"call_1\",\"argsTextDelta\":\"{\\\"code\\\":\"}\n",
            "9:{\"toolCallId\":\"call_1\",\"toolName\":\"python_interpreter\",\"args\":{\"code\":\"1+1\"}}\n",
            "a:{\"toolCallId\":\"call_1\",\"toolName\":\"python_interpreter\",\"result\":{\"outputs\":[]}}\n",
        );
        let frames = parser.feed(input.as_bytes());

        assert_eq!(frames.len(), 4);
        assert_eq!(
            frames[0],
            StreamFrame::ToolCallBegin {
                call_id: "call_1".to_string(),
                tool_name: "python_interpreter".to_string(),
            }
        );
        assert!(matches!(&frames[1], StreamFrame::ToolArgsDelta { .. }));
        assert_eq!(
            frames[2],
            StreamFrame::ToolCall {
                call_id: "call_1".to_string(),
                tool_name: "python_interpreter".to_string(),
                args: json!({"code": "1+1"}),
            }
        );
        assert_eq!(
            frames[3],
            StreamFrame::ToolResult {
                call_id: "call_1".to_string(),
                tool_name: Some("python_interpreter".to_string()),
                result: json!({"outputs": []}),
            }
        );
    }

    #[test]
    fn test_step_and_turn_end() {
        let mut parser = DataStreamParser::default();
        let frames = parser.feed(
            b"e:{\"finishReason\":\"tool-calls\",\"usage\":{\"promptTokens\":10,\"completionTokens\":20},\"isContinued\":false}\nd:{\"finishReason\":\"stop\"}\n",
        );
        assert_eq!(
            frames,
            vec![
                StreamFrame::StepEnd {
                    finish_reason: "tool-calls".to_string()
                },
                StreamFrame::TurnEnd {
                    finish_reason: "stop".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_unknown_codes_and_garbage_are_skipped() {
        let mut parser = DataStreamParser::default();
        let frames = parser.feed(b"8:{\"whatever\":1}\nnot a frame\n0:\"ok\"\n3:\"boom\"\n");
        assert_eq!(
            frames,
            vec![
                StreamFrame::TextDelta("ok".to_string()),
                StreamFrame::Error("boom".to_string()),
            ]
        );
    }
}
