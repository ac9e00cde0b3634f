//! Fold a turn's event stream into the display and plain channels.
//!
//! Both channels only ever grow. `display` is Markdown for a human reader
//! and records every tool call, tool result, and failure as a folded
//! callout. `plain` holds assistant text only and becomes the durable
//! transcript.

pub mod callout;

use serde_json::json;

use crate::agent_loop::StreamEvent;

pub use callout::{callout, json_block, json_callout, CalloutKind};

/// Incremental reducer state for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamReducer {
    display: String,
    plain: String,
}

impl StreamReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event. Returns whether the display channel changed.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::TextDelta { text } => {
                self.display.push_str(text);
                self.plain.push_str(text);
                !text.is_empty()
            }
            StreamEvent::ToolCall { tool_name, args, .. } => {
                let title = format!("Tool Call ({tool_name})");
                self.display
                    .push_str(&json_callout(CalloutKind::Important, &title, args));
                true
            }
            StreamEvent::ToolResult {
                tool_name,
                result,
                is_error,
                ..
            } => {
                let title = format!("Tool Result ({tool_name})");
                let kind = if *is_error {
                    CalloutKind::Failure
                } else {
                    CalloutKind::Success
                };
                self.display.push_str(&json_callout(kind, &title, result));
                true
            }
            StreamEvent::Error { retryable, data } => {
                let body = json!({ "isRetryable": retryable, "data": data });
                self.display
                    .push_str(&json_callout(CalloutKind::Failure, "Error", &body));
                true
            }
            StreamEvent::StepStart { .. }
            | StreamEvent::StepFinish { .. }
            | StreamEvent::Finish { .. } => false,
            StreamEvent::Unrecognized { kind } => {
                self.display.push_str(&format!("Unknown part type: {kind}"));
                true
            }
        }
    }

    /// Append a failure raised outside the loop (model resolution, toolset
    /// assembly). Plain text is left alone.
    pub fn apply_failure(&mut self, message: &str) {
        self.display.push_str(&json_callout(
            CalloutKind::Failure,
            "Error",
            &json!({ "message": message }),
        ));
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn plain(&self) -> &str {
        &self.plain
    }

    pub fn into_parts(self) -> (String, String) {
        (self.display, self.plain)
    }
}

/// Fold a complete event sequence into `(display, plain)`.
pub fn reduce<'a>(events: impl IntoIterator<Item = &'a StreamEvent>) -> (String, String) {
    let mut reducer = StreamReducer::new();
    for event in events {
        reducer.apply(event);
    }
    reducer.into_parts()
}
