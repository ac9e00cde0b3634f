//! Declarative model configuration and typed provider identifiers.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Credential key used by custom providers that do not name one.
pub const DEFAULT_CUSTOM_CREDENTIAL_KEY: &str = "API_KEY";

/// Providers known to the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Google,
    Anthropic,
    Azure,
    Ollama,
    Custom,
}

impl ProviderKind {
    /// Canonical provider key string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Google => "google",
            Self::Anthropic => "anthropic",
            Self::Azure => "azure",
            Self::Ollama => "ollama",
            Self::Custom => "custom",
        }
    }

    /// Parse a provider name; aliases are accepted, anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "google" | "gemini" => Some(Self::Google),
            "anthropic" | "claude" => Some(Self::Anthropic),
            "azure" | "azure-openai" => Some(Self::Azure),
            "ollama" => Some(Self::Ollama),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Well-known credential slot for built-in providers.
    ///
    /// `None` means the provider needs no credential (ollama) or takes its
    /// key name from the custom provider config.
    pub const fn credential_key(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Google => Some("GOOGLE_GENERATIVE_AI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Azure => Some("AZURE_API_KEY"),
            Self::Ollama | Self::Custom => None,
        }
    }

    pub const fn requires_credential(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

/// Extension provider named in a `custom` model config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomProviderConfig {
    #[serde(default)]
    pub name: String,
    #[serde(
        default = "default_custom_credential_key",
        alias = "apiKeyName",
        alias = "api_key_name",
        alias = "credentialKey"
    )]
    pub credential_key: String,
}

fn default_custom_credential_key() -> String {
    DEFAULT_CUSTOM_CREDENTIAL_KEY.to_string()
}

/// `{ provider, name, customProvider? }` as persisted by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: String,
    pub name: String,
    #[serde(
        default,
        alias = "customProvider",
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_provider: Option<CustomProviderConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new("google", "gemini-2.5-flash")
    }
}

impl ModelConfig {
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
            custom_provider: None,
        }
    }

    /// Config for a registered extension provider.
    pub fn custom(
        provider_name: impl Into<String>,
        credential_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider: ProviderKind::Custom.as_str().to_string(),
            name: model.into(),
            custom_provider: Some(CustomProviderConfig {
                name: provider_name.into(),
                credential_key: credential_key.into(),
            }),
        }
    }

    pub fn kind(&self) -> Option<ProviderKind> {
        ProviderKind::parse(&self.provider)
    }

    /// Credential slot the resolver fills for this config, if any.
    pub fn credential_key(&self) -> Option<String> {
        match self.kind() {
            Some(ProviderKind::Custom) | None => self
                .custom_provider
                .as_ref()
                .map(|custom| custom.credential_key.clone()),
            Some(kind) => kind.credential_key().map(str::to_string),
        }
    }
}
