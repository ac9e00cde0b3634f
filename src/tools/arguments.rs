//! Typed access to tool call arguments.

use crate::error::OgentError;

/// Wrapper around tool call arguments providing typed extraction.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, OgentError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| OgentError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Deserialize the entire arguments into a typed struct.
    ///
    /// Models occasionally send arguments as a JSON-encoded string; that form
    /// is unwrapped first.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, OgentError> {
        let value = normalize(&self.value)?;
        serde_json::from_value(value).map_err(|e| {
            OgentError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

/// Unwrap stringified JSON arguments; `null` and blank strings become `{}`.
pub(crate) fn normalize(value: &serde_json::Value) -> Result<serde_json::Value, OgentError> {
    match value {
        serde_json::Value::Null => Ok(serde_json::json!({})),
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(serde_json::json!({}));
            }
            serde_json::from_str::<serde_json::Value>(trimmed).map_err(|e| {
                OgentError::InvalidArgument(format!("Arguments must be valid JSON: {e}"))
            })
        }
        other => Ok(other.clone()),
    }
}
