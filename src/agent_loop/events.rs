//! Turn event stream types.

use serde::{Deserialize, Serialize};

use crate::types::FinishReason;

/// Tags the loop emits, in wire form.
const KNOWN_KINDS: &[&str] = &[
    "step-start",
    "text-delta",
    "tool-call",
    "tool-result",
    "error",
    "step-finish",
    "finish",
];

/// One unit of a turn's incremental output.
///
/// Events of one turn are delivered strictly in the order the loop
/// produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    StepStart {
        step: usize,
    },
    TextDelta {
        text: String,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: serde_json::Value,
    },
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        result: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    /// Provider or transport failure. Always the last event of a turn.
    Error {
        retryable: bool,
        data: serde_json::Value,
    },
    StepFinish {
        step: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<FinishReason>,
    },
    Finish {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<FinishReason>,
        steps: usize,
        /// The step ceiling ended the turn, not the model.
        #[serde(default)]
        truncated: bool,
    },
    /// An event whose tag this crate does not know.
    #[serde(skip)]
    Unrecognized { kind: String },
}

impl StreamEvent {
    /// The event's wire tag.
    pub fn kind(&self) -> &str {
        match self {
            Self::StepStart { .. } => "step-start",
            Self::TextDelta { .. } => "text-delta",
            Self::ToolCall { .. } => "tool-call",
            Self::ToolResult { .. } => "tool-result",
            Self::Error { .. } => "error",
            Self::StepFinish { .. } => "step-finish",
            Self::Finish { .. } => "finish",
            Self::Unrecognized { kind } => kind,
        }
    }

    /// Decode an event, keeping unknown tags as [`StreamEvent::Unrecognized`].
    ///
    /// A known tag with malformed fields is still an error.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        match kind {
            Some(kind) if !KNOWN_KINDS.contains(&kind.as_str()) => Ok(Self::Unrecognized { kind }),
            _ => serde_json::from_value(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_tags_are_kebab_case() {
        let event = StreamEvent::ToolResult {
            tool_call_id: "c1".into(),
            tool_name: "obsidian-open-note".into(),
            result: json!({ "success": true }),
            is_error: false,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "tool-result");
        assert_eq!(value["toolCallId"], "c1");
        assert_eq!(value["isError"], false);
        assert_eq!(event.kind(), "tool-result");
    }

    #[test]
    fn from_value_keeps_unknown_tags() {
        let event = StreamEvent::from_value(json!({ "type": "reasoning", "text": "hm" })).unwrap();
        assert_eq!(
            event,
            StreamEvent::Unrecognized {
                kind: "reasoning".into()
            }
        );
        assert_eq!(event.kind(), "reasoning");
    }

    #[test]
    fn from_value_decodes_known_tags() {
        let event = StreamEvent::from_value(json!({ "type": "text-delta", "text": "hi" })).unwrap();
        assert_eq!(event, StreamEvent::TextDelta { text: "hi".into() });

        let event = StreamEvent::from_value(json!({ "type": "finish", "steps": 3 })).unwrap();
        assert_eq!(
            event,
            StreamEvent::Finish {
                finish_reason: None,
                steps: 3,
                truncated: false
            }
        );
    }

    #[test]
    fn from_value_rejects_malformed_known_tag() {
        assert!(StreamEvent::from_value(json!({ "type": "text-delta" })).is_err());
    }
}
