//! Collapsible Markdown callouts for the display channel.

use serde_json::Value;
use strum::{AsRefStr, Display};

/// Callout flavours the display channel uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum CalloutKind {
    Important,
    Success,
    Failure,
}

/// Render a folded callout. Every body line is quoted.
pub fn callout(kind: CalloutKind, title: &str, body: &str) -> String {
    format!(
        "\n> [!{kind}]- {title}\n> {}\n\n",
        body.replace('\n', "\n> ")
    )
}

/// A fenced `json` block with two-space indentation.
pub fn json_block(value: &Value) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("```json\n{pretty}\n```")
}

pub fn json_callout(kind: CalloutKind, title: &str, value: &Value) -> String {
    callout(kind, title, &json_block(value))
}
