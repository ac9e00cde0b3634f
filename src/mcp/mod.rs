//! Remote toolsets over the Model Context Protocol.
//!
//! Each configured endpoint launches a tool server as a child process and
//! its advertised tools join the toolset under the endpoint's name.

pub mod bridge;
pub mod client;
pub mod discovery;
pub mod schema;
pub mod transport;

pub use bridge::MCPTool;
pub use client::{MCPClient, MCPConnectionState, MCPToolCallResult};
pub use discovery::{McpToolsetSource, DISCOVERY_TIMEOUT};
pub use schema::MCPToolSchema;
pub use transport::{MCPTransport, StdioTransport};
