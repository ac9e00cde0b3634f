//! Configuration: explicit credential context and persisted agent settings.

pub mod settings;

pub use settings::{AgentSettings, McpServerConfig, DEFAULT_INSTRUCTIONS};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Environment keys picked up by [`CredentialContext::from_env`].
const WELL_KNOWN_KEYS: &[&str] = &[
    "OPENAI_API_KEY",
    "OPENAI_BASE_URL",
    "GOOGLE_GENERATIVE_AI_API_KEY",
    "GOOGLE_BASE_URL",
    "ANTHROPIC_API_KEY",
    "ANTHROPIC_BASE_URL",
    "AZURE_API_KEY",
    "AZURE_RESOURCE_NAME",
    "AZURE_BASE_URL",
    "OLLAMA_BASE_URL",
];

/// Immutable set of credentials and endpoint overrides handed to provider
/// factories and tool handlers.
///
/// Nothing here touches the process environment after construction. The
/// provider resolver derives a new context per resolution instead of
/// mutating a shared one.
#[derive(Clone, Default)]
pub struct CredentialContext {
    values: Arc<HashMap<String, String>>,
}

impl fmt::Debug for CredentialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("CredentialContext")
            .field("keys", &keys)
            .finish()
    }
}

impl CredentialContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the well-known provider keys from the environment, loading
    /// `.env` first when present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut values = HashMap::new();
        for key in WELL_KNOWN_KEYS {
            if let Ok(value) = std::env::var(key) {
                if !value.is_empty() {
                    values.insert((*key).to_string(), value);
                }
            }
        }
        Self {
            values: Arc::new(values),
        }
    }

    /// Return a copy that also carries `key` from the process environment,
    /// for keys outside the well-known set. An existing value is kept.
    pub fn with_env_key(&self, key: &str) -> Self {
        match std::env::var(key) {
            Ok(value) if !value.is_empty() && !self.contains(key) => self.with(key, value),
            _ => self.clone(),
        }
    }

    /// Return a copy with `key` set to `value`.
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value.into());
        Self {
            values: Arc::new(values),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_does_not_mutate_the_original() {
        let base = CredentialContext::new().with("OPENAI_API_KEY", "sk-1");
        let derived = base.with("OPENAI_API_KEY", "sk-2");

        assert_eq!(base.get("OPENAI_API_KEY"), Some("sk-1"));
        assert_eq!(derived.get("OPENAI_API_KEY"), Some("sk-2"));
    }

    #[test]
    fn env_key_outside_the_well_known_set_is_picked_up() {
        std::env::set_var("OGENT_CONTEXT_TEST_ACME_KEY", "acme-secret");
        let ctx = CredentialContext::new().with_env_key("OGENT_CONTEXT_TEST_ACME_KEY");
        assert_eq!(ctx.get("OGENT_CONTEXT_TEST_ACME_KEY"), Some("acme-secret"));

        let pinned = CredentialContext::new()
            .with("OGENT_CONTEXT_TEST_ACME_KEY", "explicit")
            .with_env_key("OGENT_CONTEXT_TEST_ACME_KEY");
        assert_eq!(pinned.get("OGENT_CONTEXT_TEST_ACME_KEY"), Some("explicit"));

        let missing = CredentialContext::new().with_env_key("OGENT_CONTEXT_TEST_UNSET_KEY");
        assert!(missing.is_empty());
    }

    #[test]
    fn empty_values_read_as_missing() {
        let ctx = CredentialContext::new().with("API_KEY", "");
        assert!(!ctx.contains("API_KEY"));
        assert_eq!(ctx.get("API_KEY"), None);
    }

    #[test]
    fn debug_output_hides_secret_values() {
        let ctx = CredentialContext::new().with("ANTHROPIC_API_KEY", "very-secret");
        let rendered = format!("{ctx:?}");
        assert!(rendered.contains("ANTHROPIC_API_KEY"));
        assert!(!rendered.contains("very-secret"));
    }
}
