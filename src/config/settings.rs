//! Persisted agent settings (TOML).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::CredentialContext;
use crate::error::Result;
use crate::provider::config::ModelConfig;

/// Instructions used when the settings leave them blank.
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are a helpful assistant working inside the user's note vault.
- On the first question, call `obsidian-list-commands` to learn which commands are available and explain what you can do.
- Ask for clarification when the request is ambiguous.
- For multi-step tasks, give step-by-step instructions.
- Prefer the vault tools for note, command, and shell operations.";

/// Launch configuration for one remote tool server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Everything the host persists for the agent.
///
/// The core never writes these mid-session except through
/// [`AgentSettings::save`], which callers invoke explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub model: ModelConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(alias = "mcpServers")]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
    #[serde(alias = "disabledToolIds")]
    pub disabled_tool_ids: Vec<String>,
    pub instructions: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            credential: None,
            mcp_servers: BTreeMap::new(),
            disabled_tool_ids: Vec::new(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

impl AgentSettings {
    /// Default settings file location (`<config dir>/ogent/settings.toml`).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ogent")
            .map(|dirs| dirs.config_dir().join("settings.toml"))
    }

    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let mut settings: Self = toml::from_str(raw)?;
        if settings.instructions.trim().is_empty() {
            settings.instructions = DEFAULT_INSTRUCTIONS.to_string();
        }
        Ok(settings)
    }

    /// Write settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Credential for the configured provider: the explicit setting wins,
    /// otherwise the provider's well-known key from `env`.
    pub fn resolve_credential(&self, env: &CredentialContext) -> String {
        if let Some(credential) = self.credential.as_deref().filter(|c| !c.is_empty()) {
            return credential.to_string();
        }
        self.model
            .credential_key()
            .and_then(|key| env.get(&key).map(str::to_string))
            .unwrap_or_default()
    }

    /// Snapshot the environment for this configuration: the well-known keys
    /// plus the model's own credential key, which may be a custom one.
    pub fn credential_context(&self) -> CredentialContext {
        let env = CredentialContext::from_env();
        match self.model.credential_key() {
            Some(key) => env.with_env_key(&key),
            None => env,
        }
    }

    /// Remove `tool_id` from the disable list. Returns whether it was present.
    pub fn enable_tool(&mut self, tool_id: &str) -> bool {
        let before = self.disabled_tool_ids.len();
        self.disabled_tool_ids.retain(|id| id != tool_id);
        before != self.disabled_tool_ids.len()
    }

    /// Add `tool_id` to the disable list. Returns whether it was newly added.
    pub fn disable_tool(&mut self, tool_id: &str) -> bool {
        if self.disabled_tool_ids.iter().any(|id| id == tool_id) {
            return false;
        }
        self.disabled_tool_ids.push(tool_id.to_string());
        true
    }
}
