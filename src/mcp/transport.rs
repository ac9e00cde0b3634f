//! MCP transport layer.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rmcp::model::ClientInfo;
use rmcp::service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceExt};
use rmcp::transport::TokioChildProcess;
use tokio::process::Command;

use crate::config::McpServerConfig;

pub type DynClientService = Box<dyn DynService<RoleClient>>;
pub type MCPRunningService = RunningService<RoleClient, DynClientService>;

/// Something that can bring up an initialized rmcp session.
#[async_trait]
pub trait MCPTransport: Send {
    /// Create and initialize a new rmcp running service for this transport.
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<MCPRunningService, ClientInitializeError>;

    /// Refuse further connects.
    fn close(&mut self);
}

/// Stdio transport that launches the tool server as a child process.
#[derive(Debug, Clone)]
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    closed: bool,
}

impl StdioTransport {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: BTreeMap::new(),
            closed: false,
        }
    }

    pub fn from_config(config: &McpServerConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            closed: false,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    fn build_command(&self) -> Command {
        let mut command = Command::new(&self.command);
        command.args(&self.args).envs(&self.env).kill_on_drop(true);
        command
    }
}

#[async_trait]
impl MCPTransport for StdioTransport {
    async fn connect(
        &mut self,
        client_info: ClientInfo,
    ) -> Result<MCPRunningService, ClientInitializeError> {
        if self.closed {
            return Err(ClientInitializeError::ConnectionClosed(
                "MCP transport closed".into(),
            ));
        }

        tracing::debug!(command = %self.command, args = ?self.args, "spawning MCP server");
        let transport = TokioChildProcess::new(self.build_command()).map_err(|error| {
            ClientInitializeError::transport::<TokioChildProcess>(error, "spawn stdio transport")
        })?;

        client_info.into_dyn().serve(transport).await
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_copies_launch_settings() {
        let config = McpServerConfig {
            command: "npx".into(),
            args: vec!["-y".into(), "@modelcontextprotocol/server-everything".into()],
            env: BTreeMap::from([("DEBUG".to_string(), "1".to_string())]),
        };

        let transport = StdioTransport::from_config(&config);
        assert_eq!(transport.command(), "npx");
        assert_eq!(transport.args().len(), 2);
        assert_eq!(transport.env().get("DEBUG").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn connect_after_close_fails_without_spawning() {
        let mut transport = StdioTransport::new("definitely-not-a-real-binary", Vec::new());
        transport.close();

        let err = transport
            .connect(ClientInfo::default())
            .await
            .err().expect("closed transport must refuse to connect");
        assert!(matches!(err, ClientInitializeError::ConnectionClosed(_)));
    }
}
