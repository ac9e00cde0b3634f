//! Convenience re-exports for common use.

pub use crate::agent_loop::{AgentLoop, StreamEvent, TurnOutcome, TurnRequest, TurnStatus, MAX_STEPS};
pub use crate::config::{AgentSettings, CredentialContext, McpServerConfig};
pub use crate::error::{OgentError, Result};
pub use crate::provider::{ModelConfig, ModelProvider, ModelProviderFactory, ProviderRegistry};
pub use crate::reducer::{reduce, StreamReducer};
pub use crate::session::{AgentSession, Conversation, SessionConfig, TurnStream, TurnUpdate};
pub use crate::tools::{AgentTool, AgentToolParameters, FsVault, Tool, ToolArguments, VaultHost};
pub use crate::toolset::{DisabledToolIds, RemoteToolsetSource, Toolset};
pub use crate::types::{FinishReason, GenerationSettings, ModelMessage, TextStreamDelta};
