//! Tool-invocation outcome and rendering dispatch
//!
//! The status indicator for a finished call is driven by what its outputs
//! contain, not by the raw lifecycle enum: one error record anywhere in the
//! result marks the whole invocation as failed. Rendering dispatch is
//! table-driven so adding a tool is one table row plus one `ToolDisplay`
//! arm, both checked at compile time.

use serde_json::Value;

use crate::chat::{InvocationState, ToolInvocation};
use crate::output::ExecutionOutput;

/// Known tools, plus an explicit fallback for anything the table misses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Weather,
    CodeInterpreter,
    Other,
}

/// Name table. Unrecognized names fall through to `Other`.
const TOOL_TABLE: &[(&str, ToolKind)] = &[
    ("get_current_weather", ToolKind::Weather),
    ("python_interpreter", ToolKind::CodeInterpreter),
];

impl ToolKind {
    pub fn from_name(name: &str) -> Self {
        TOOL_TABLE
            .iter()
            .find(|(table_name, _)| *table_name == name)
            .map(|(_, kind)| *kind)
            .unwrap_or(ToolKind::Other)
    }

    /// Short activity label shown while the call runs
    pub fn activity_label(self) -> &'static str {
        match self {
            Self::Weather => "Fetching weather...",
            Self::CodeInterpreter => "Executing code in sandbox...",
            Self::Other => "Processing...",
        }
    }
}

/// Overall outcome of a finished invocation; drives the status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    Completed,
    Error,
}

/// What the presentation layer should draw for one invocation
#[derive(Debug, Clone)]
pub enum ToolDisplay {
    /// Content-free skeleton while the call is still running
    Placeholder(ToolKind),
    /// Weather payload for the dedicated renderer
    Weather(Value),
    /// Code cell with its classified execution outputs
    CodeCell {
        code: String,
        outputs: Vec<ExecutionOutput>,
    },
    /// Structured dump for tools without a dedicated renderer
    Generic(Value),
}

/// Classify a finished invocation: any Error output in the result marks the
/// whole call as failed, even when sibling outputs succeeded.
pub fn outcome(invocation: &ToolInvocation) -> InvocationOutcome {
    if invocation.state == InvocationState::Error {
        return InvocationOutcome::Error;
    }

    let has_error_output = invocation
        .result
        .as_ref()
        .and_then(|result| result.get("outputs"))
        .map(|outputs| {
            ExecutionOutput::classify_all(outputs)
                .iter()
                .any(ExecutionOutput::is_error)
        })
        .unwrap_or(false);

    if has_error_output {
        InvocationOutcome::Error
    } else {
        InvocationOutcome::Completed
    }
}

/// Resolve display state for an invocation. Exhaustive over `ToolKind`.
pub fn display(invocation: &ToolInvocation) -> ToolDisplay {
    let kind = ToolKind::from_name(&invocation.tool_name);

    if !invocation.state.is_terminal() {
        // No output data exists yet by definition
        return ToolDisplay::Placeholder(kind);
    }

    let result = invocation.result.clone().unwrap_or(Value::Null);
    match kind {
        ToolKind::Weather => ToolDisplay::Weather(result),
        ToolKind::CodeInterpreter => {
            let code = result
                .get("code")
                .and_then(Value::as_str)
                .or_else(|| invocation.args.get("code").and_then(Value::as_str))
                .unwrap_or_default()
                .to_string();
            let outputs = result
                .get("outputs")
                .map(ExecutionOutput::classify_all)
                .unwrap_or_default();
            ToolDisplay::CodeCell { code, outputs }
        }
        ToolKind::Other => ToolDisplay::Generic(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn finished(tool_name: &str, args: Value, result: Value) -> ToolInvocation {
        let mut inv = ToolInvocation::executing("call-1", tool_name, args);
        inv.advance(InvocationState::Result);
        inv.result = Some(result);
        inv
    }

    #[test]
    fn test_table_lookup_with_fallback() {
        assert_eq!(ToolKind::from_name("python_interpreter"), ToolKind::CodeInterpreter);
        assert_eq!(ToolKind::from_name("get_current_weather"), ToolKind::Weather);
        assert_eq!(ToolKind::from_name("search_web"), ToolKind::Other);
    }

    #[test]
    fn test_single_error_output_fails_the_invocation() {
        let inv = finished(
            "python_interpreter",
            Value::Null,
            json!({
                "outputs": [
                    {"output_type": "stream", "name": "stdout", "text": "partial\n"},
                    {"output_type": "error", "ename": "ValueError", "evalue": "bad", "traceback": []},
                    {"output_type": "execute_result", "data": {"text/plain": "42"}}
                ]
            }),
        );
        assert_eq!(outcome(&inv), InvocationOutcome::Error);
    }

    #[test]
    fn test_clean_outputs_complete() {
        let inv = finished(
            "python_interpreter",
            Value::Null,
            json!({"outputs": [{"output_type": "stream", "name": "stdout", "text": "ok\n"}]}),
        );
        assert_eq!(outcome(&inv), InvocationOutcome::Completed);
    }

    #[test]
    fn test_error_state_outweighs_missing_outputs() {
        let mut inv = ToolInvocation::executing("call-err", "python_interpreter", Value::Null);
        inv.advance(InvocationState::Error);
        assert_eq!(outcome(&inv), InvocationOutcome::Error);
    }

    #[test]
    fn test_executing_invocation_gets_placeholder() {
        let inv = ToolInvocation::executing("call-2", "python_interpreter", json!({"code": "1"}));
        assert!(matches!(
            display(&inv),
            ToolDisplay::Placeholder(ToolKind::CodeInterpreter)
        ));
    }

    #[test]
    fn test_code_cell_prefers_result_code_over_args() {
        let inv = finished(
            "python_interpreter",
            json!({"code": "draft"}),
            json!({"code": "final", "outputs": []}),
        );
        let ToolDisplay::CodeCell { code, outputs } = display(&inv) else {
            panic!("expected code cell");
        };
        assert_eq!(code, "final");
        assert!(outputs.is_empty());
    }

    #[test]
    fn test_code_cell_falls_back_to_args_code() {
        let inv = finished(
            "python_interpreter",
            json!({"code": "print('hi')"}),
            json!({"outputs": []}),
        );
        let ToolDisplay::CodeCell { code, .. } = display(&inv) else {
            panic!("expected code cell");
        };
        assert_eq!(code, "print('hi')");
    }

    #[test]
    fn test_unrecognized_tool_renders_generic() {
        let inv = finished("search_web", Value::Null, json!({"hits": 3}));
        let ToolDisplay::Generic(value) = display(&inv) else {
            panic!("expected generic dump");
        };
        assert_eq!(value, json!({"hits": 3}));
    }
}
