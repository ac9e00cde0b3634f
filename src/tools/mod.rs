//! Tool system for function calling.
//!
//! [`Tool`] is the callable unit; [`invoke`] validates input before any
//! handler runs. The local vault tools live in [`vault`] and reach the host
//! through [`VaultHost`].

pub mod arguments;
pub mod fs_host;
pub mod host;
pub mod shell;
pub mod tool;
pub mod types;
pub mod validation;
pub mod vault;

pub use arguments::ToolArguments;
pub use fs_host::FsVault;
pub use host::{HostCommand, NoteFile, VaultHost};
pub use tool::{invoke, AgentTool, Tool, ToolExecutionContext};
pub use types::{AgentToolParameters, ParameterBuilder};
pub use validation::validate_arguments;
pub use vault::{local_tools, LOCAL_TOOLSET};
