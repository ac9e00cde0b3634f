//! Error types for Ogent.

use thiserror::Error;

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Validation,
    ToolExecution,
    Session,
    Unknown,
}

/// Primary error type for all Ogent operations.
#[derive(Error, Debug)]
pub enum OgentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Settings file error: {0}")]
    SettingsFormat(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid input for tool '{tool_id}': {message}")]
    Validation { tool_id: String, message: String },

    #[error("Tool '{tool_id}' failed: {message}")]
    ToolExecution { tool_id: String, message: String },

    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    #[error("Tool id '{id}' is declared by both '{first_toolset}' and '{second_toolset}'")]
    ToolIdCollision {
        id: String,
        first_toolset: String,
        second_toolset: String,
    },

    #[error("Provider '{provider}' is not configured: missing credential")]
    UnconfiguredProvider { provider: String },

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("A turn is already in progress for this session")]
    TurnInProgress,

    #[error("Turn cancelled")]
    Cancelled,

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<toml::de::Error> for OgentError {
    fn from(err: toml::de::Error) -> Self {
        Self::SettingsFormat(err.to_string())
    }
}

impl From<toml::ser::Error> for OgentError {
    fn from(err: toml::ser::Error) -> Self {
        Self::SettingsFormat(err.to_string())
    }
}

impl OgentError {
    /// Create an API error from a status code and body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a handler failure for a tool.
    pub fn tool(tool_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_id: tool_id.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_)
            | Self::SettingsFormat(_)
            | Self::UnconfiguredProvider { .. }
            | Self::UnsupportedProvider(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::Validation { .. } | Self::InvalidArgument(_) => ErrorCategory::Validation,
            Self::ToolExecution { .. } | Self::ToolNotFound(_) => ErrorCategory::ToolExecution,
            Self::ToolIdCollision { .. } | Self::TurnInProgress => ErrorCategory::Session,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Whether this error poisons the whole session until configuration changes.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnconfiguredProvider { .. }
                | Self::UnsupportedProvider(_)
                | Self::ToolIdCollision { .. }
        )
    }

    /// Raw payload attached to `error` stream events.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Api { status, message } => serde_json::json!({
                "status": status,
                "message": message,
            }),
            Self::RateLimited { retry_after_ms } => serde_json::json!({
                "status": 429,
                "retryAfterMs": retry_after_ms,
            }),
            Self::Provider { provider, message } => serde_json::json!({
                "provider": provider,
                "message": message,
            }),
            other => serde_json::json!({ "message": other.to_string() }),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, OgentError>;
