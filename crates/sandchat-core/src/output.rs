//! Execution-output classification
//!
//! The sandbox reports each executed cell as a list of loosely shaped
//! records discriminated by an `output_type` field. Classification is
//! total: anything unrecognized lands in the `Unknown` arm and renders as
//! raw structured data instead of failing the whole message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which channel a stream record was captured from. Controls presentation
/// emphasis only, not classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamName {
    Stdout,
    Stderr,
}

/// MIME-keyed alternative encodings of one result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MimeBundle(pub Map<String, Value>);

/// Fixed preference order when a single representation must be chosen:
/// richer, human-authored encodings win over raw data.
const MIME_PREFERENCE: [&str; 4] = ["text/html", "image/png", "image/jpeg", "text/plain"];

/// The single representation picked for display.
#[derive(Debug, Clone, PartialEq)]
pub enum Representation {
    Html(String),
    /// Base64 payload
    Png(String),
    /// Base64 payload
    Jpeg(String),
    Plain(String),
    /// No preferred MIME type present; pretty-printed raw mapping.
    Raw(String),
}

impl MimeBundle {
    pub fn get(&self, mime: &str) -> Option<&Value> {
        self.0.get(mime)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pick one human-facing representation by the fixed preference order.
    /// Total: falls back to the pretty-printed raw mapping.
    pub fn preferred(&self) -> Representation {
        for mime in MIME_PREFERENCE {
            if let Some(payload) = self.0.get(mime) {
                let text = payload_text(payload);
                return match mime {
                    "text/html" => Representation::Html(text),
                    "image/png" => Representation::Png(text),
                    "image/jpeg" => Representation::Jpeg(text),
                    _ => Representation::Plain(text),
                };
            }
        }
        let raw = serde_json::to_string_pretty(&Value::Object(self.0.clone())).unwrap_or_default();
        Representation::Raw(raw)
    }
}

/// Notebook payloads arrive either as one string or as a list of line
/// fragments; both flatten to verbatim text.
fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .concat(),
        other => other.to_string(),
    }
}

/// One unit of result data produced by running code in the sandbox.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutput {
    /// Captured stdout/stderr text
    Stream { name: StreamName, text: String },
    /// The value of the last expression, in one or more encodings
    ExecuteResult { data: MimeBundle },
    /// Rich output emitted mid-execution (plots, tables)
    DisplayData { data: MimeBundle },
    /// An exception with its traceback, line order preserved
    Error {
        name: String,
        message: String,
        traceback: Vec<String>,
    },
    /// Unrecognized record, kept raw so the UI can still show something
    Unknown(Value),
}

impl ExecutionOutput {
    /// Classify a raw record by its `output_type` discriminant.
    pub fn classify(record: Value) -> Self {
        let Some(output_type) = record.get("output_type").and_then(Value::as_str) else {
            return Self::Unknown(record);
        };

        match output_type {
            "stream" => {
                let name = match record.get("name").and_then(Value::as_str) {
                    Some("stderr") => StreamName::Stderr,
                    _ => StreamName::Stdout,
                };
                let text = record.get("text").map(payload_text).unwrap_or_default();
                Self::Stream { name, text }
            }
            "execute_result" | "display_data" => {
                let data = record
                    .get("data")
                    .and_then(Value::as_object)
                    .cloned()
                    .map(MimeBundle)
                    .unwrap_or_default();
                if output_type == "execute_result" {
                    Self::ExecuteResult { data }
                } else {
                    Self::DisplayData { data }
                }
            }
            "error" => Self::Error {
                name: record
                    .get("ename")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                message: record
                    .get("evalue")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                traceback: record
                    .get("traceback")
                    .and_then(Value::as_array)
                    .map(|lines| {
                        lines
                            .iter()
                            .filter_map(Value::as_str)
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            _ => Self::Unknown(record),
        }
    }

    /// Classify every record of a result's `outputs` array.
    pub fn classify_all(outputs: &Value) -> Vec<Self> {
        outputs
            .as_array()
            .map(|records| records.iter().cloned().map(Self::classify).collect())
            .unwrap_or_default()
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Traceback joined with newlines for display, order untouched.
    pub fn traceback_text(&self) -> Option<String> {
        match self {
            Self::Error { traceback, .. } => Some(traceback.join("\n")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_stream_channels() {
        let out = ExecutionOutput::classify(json!({
            "output_type": "stream", "name": "stdout", "text": "hello\n"
        }));
        assert_eq!(
            out,
            ExecutionOutput::Stream {
                name: StreamName::Stdout,
                text: "hello\n".to_string()
            }
        );

        let err = ExecutionOutput::classify(json!({
            "output_type": "stream", "name": "stderr", "text": "warning"
        }));
        assert!(matches!(
            err,
            ExecutionOutput::Stream { name: StreamName::Stderr, .. }
        ));
    }

    #[test]
    fn test_html_preferred_over_png() {
        let out = ExecutionOutput::classify(json!({
            "output_type": "execute_result",
            "data": {
                "image/png": "aGVsbG8=",
                "text/html": "<table></table>",
                "text/plain": "<pandas frame>"
            }
        }));
        let ExecutionOutput::ExecuteResult { data } = out else {
            panic!("expected execute_result");
        };
        assert_eq!(
            data.preferred(),
            Representation::Html("<table></table>".to_string())
        );
    }

    #[test]
    fn test_plain_text_is_verbatim() {
        let bundle = MimeBundle(
            json!({ "text/plain": "  42\n\n" })
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(bundle.preferred(), Representation::Plain("  42\n\n".to_string()));
    }

    #[test]
    fn test_line_list_payload_flattens() {
        let bundle = MimeBundle(
            json!({ "text/plain": ["line one\n", "line two"] })
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(
            bundle.preferred(),
            Representation::Plain("line one\nline two".to_string())
        );
    }

    #[test]
    fn test_unfamiliar_mime_falls_back_to_raw() {
        let bundle = MimeBundle(
            json!({ "application/vnd.plotly.v1+json": {"data": []} })
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(matches!(bundle.preferred(), Representation::Raw(_)));
    }

    #[test]
    fn test_error_traceback_order_preserved() {
        let out = ExecutionOutput::classify(json!({
            "output_type": "error",
            "ename": "ZeroDivisionError",
            "evalue": "division by zero",
            "traceback": ["Traceback (most recent call last):", "  File \"<stdin>\"", "ZeroDivisionError: division by zero"]
        }));
        assert!(out.is_error());
        assert_eq!(
            out.traceback_text().unwrap(),
            "Traceback (most recent call last):\n  File \"<stdin>\"\nZeroDivisionError: division by zero"
        );
    }

    #[test]
    fn test_unknown_output_type_kept_raw() {
        let record = json!({ "output_type": "update_display_data", "data": {} });
        let out = ExecutionOutput::classify(record.clone());
        assert_eq!(out, ExecutionOutput::Unknown(record));
    }

    #[test]
    fn test_missing_discriminant_kept_raw() {
        let record = json!({ "text": "no type here" });
        assert!(matches!(
            ExecutionOutput::classify(record),
            ExecutionOutput::Unknown(_)
        ));
    }
}
