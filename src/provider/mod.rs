//! Model provider trait, resolver, and the built-in streaming backend.

pub mod chat_completions;
pub mod config;
pub mod factory;
pub mod http;
pub mod registry;

mod builtin;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::OgentError;
use crate::tools::Tool;
use crate::types::{GenerationSettings, ModelMessage, TextStreamDelta};

pub use config::{CustomProviderConfig, ModelConfig, ProviderKind, DEFAULT_CUSTOM_CREDENTIAL_KEY};
pub use factory::ModelProviderFactory;
pub use registry::ProviderRegistry;

/// A request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub messages: Vec<ModelMessage>,
    pub settings: GenerationSettings,
    pub tools: Vec<ToolDefinition>,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.id().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters().schema.clone(),
        }
    }
}

/// Stream of deltas produced by one model call.
pub type DeltaStream = BoxStream<'static, Result<TextStreamDelta, OgentError>>;

/// Core trait implemented by all model backends.
///
/// A stream yields text deltas, complete tool calls, and one final
/// [`StreamEventType::Done`](crate::types::StreamEventType::Done) delta.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai", "google").
    fn provider_name(&self) -> &str;

    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Start a streaming completion.
    async fn stream_text(&self, request: &ProviderRequest) -> Result<DeltaStream, OgentError>;
}

/// A resolved, shareable model backend.
pub type ModelHandle = Arc<dyn ModelProvider>;
