//! Discover toolsets from configured MCP servers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Mutex;

use super::bridge::{MCPClientOps, MCPTool, SharedClient};
use super::client::MCPClient;
use super::transport::StdioTransport;
use crate::config::McpServerConfig;
use crate::error::{OgentError, Result};
use crate::tools::Tool;
use crate::toolset::{Discovery, DiscoveryDiagnostic, RemoteToolsetSource};

/// Upper bound for one endpoint to start and list its tools.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

type Connector = Box<dyn Fn() -> Box<dyn MCPClientOps> + Send + Sync>;

/// Remote toolset source backed by one MCP server per named endpoint.
///
/// Every discovery starts fresh clients and shuts down the previous ones.
/// Endpoints are contacted concurrently; an endpoint that fails to start or
/// list its tools is reported as a diagnostic and left out.
pub struct McpToolsetSource {
    endpoints: BTreeMap<String, Connector>,
    clients: Mutex<Vec<SharedClient>>,
    timeout: Duration,
}

impl McpToolsetSource {
    pub fn from_configs(configs: &BTreeMap<String, McpServerConfig>) -> Self {
        let endpoints = configs
            .iter()
            .map(|(name, config)| {
                let config = config.clone();
                let connect: Connector = Box::new(move || {
                    Box::new(MCPClient::new(Box::new(StdioTransport::from_config(&config))))
                        as Box<dyn MCPClientOps>
                });
                (name.clone(), connect)
            })
            .collect();
        Self::with_connectors(endpoints)
    }

    fn with_connectors(endpoints: BTreeMap<String, Connector>) -> Self {
        Self {
            endpoints,
            clients: Mutex::new(Vec::new()),
            timeout: DISCOVERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn discover_endpoint(
        &self,
        name: &str,
        connect: &Connector,
    ) -> (SharedClient, Result<Vec<Arc<dyn Tool>>>) {
        let client: SharedClient = Arc::new(Mutex::new(connect()));
        let listed = {
            let mut guard = client.lock().await;
            let listing = async {
                guard.initialize().await?;
                guard.list_tools().await
            };
            match tokio::time::timeout(self.timeout, listing).await {
                Ok(listed) => listed,
                Err(_) => Err(OgentError::Timeout(self.timeout.as_millis() as u64)),
            }
        };

        let tools = listed.map(|schemas| {
            schemas
                .into_iter()
                .map(|schema| {
                    Arc::new(MCPTool::new(name, schema, Arc::clone(&client))) as Arc<dyn Tool>
                })
                .collect()
        });
        (client, tools)
    }

    async fn close_clients(&self, clients: Vec<SharedClient>) {
        for client in clients {
            client.lock().await.close().await;
        }
    }
}

#[async_trait]
impl RemoteToolsetSource for McpToolsetSource {
    async fn discover(&self) -> Result<Discovery> {
        let previous = std::mem::take(&mut *self.clients.lock().await);
        self.close_clients(previous).await;

        let attempts = join_all(self.endpoints.iter().map(|(name, connect)| async move {
            let (client, tools) = self.discover_endpoint(name, connect).await;
            (name.as_str(), client, tools)
        }))
        .await;

        let mut discovery = Discovery::default();
        let mut live = Vec::new();
        let mut failed = Vec::new();
        let mut collision = None;

        for (name, client, tools) in attempts {
            match tools {
                Ok(tools) => {
                    tracing::debug!(toolset = name, tools = tools.len(), "MCP endpoint ready");
                    if collision.is_none() {
                        if let Err(err) = discovery.toolsets.insert_group(name, tools) {
                            collision = Some(err);
                        }
                    }
                    live.push(client);
                }
                Err(err) => {
                    tracing::warn!(toolset = name, error = %err, "MCP endpoint discovery failed");
                    discovery.diagnostics.push(DiscoveryDiagnostic {
                        endpoint: name.to_string(),
                        message: err.to_string(),
                    });
                    failed.push(client);
                }
            }
        }

        self.close_clients(failed).await;
        if let Some(err) = collision {
            self.close_clients(live).await;
            return Err(err);
        }

        *self.clients.lock().await = live;
        Ok(discovery)
    }

    async fn close(&self) {
        let clients = std::mem::take(&mut *self.clients.lock().await);
        self.close_clients(clients).await;
    }
}

impl std::fmt::Debug for McpToolsetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpToolsetSource")
            .field("endpoints", &self.endpoints.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::bridge::test_support::MockClientOps;
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn connector(build: impl Fn() -> MockClientOps + Send + Sync + 'static) -> Connector {
        Box::new(move || Box::new(build()) as Box<dyn MCPClientOps>)
    }

    #[tokio::test]
    async fn one_failing_endpoint_does_not_block_the_others() {
        let source = McpToolsetSource::with_connectors(BTreeMap::from([
            (
                "search".to_string(),
                connector(|| MockClientOps::with_tools(&["query", "index"])),
            ),
            (
                "broken".to_string(),
                connector(|| MockClientOps::failing("spawn failed")),
            ),
        ]));

        let discovery = source.discover().await.unwrap();
        assert_eq!(discovery.toolsets.len(), 2);
        assert_eq!(discovery.toolsets.toolset_of("query"), Some("search"));
        assert!(discovery.toolsets.group("broken").is_none());
        assert_eq!(discovery.diagnostics.len(), 1);
        assert_eq!(discovery.diagnostics[0].endpoint, "broken");
        assert!(discovery.diagnostics[0].message.contains("spawn failed"));
    }

    #[tokio::test]
    async fn ids_shared_by_two_endpoints_fail_discovery() {
        let source = McpToolsetSource::with_connectors(BTreeMap::from([
            ("a".to_string(), connector(|| MockClientOps::with_tools(&["query"]))),
            ("b".to_string(), connector(|| MockClientOps::with_tools(&["query"]))),
        ]));

        let err = source.discover().await.unwrap_err();
        assert!(matches!(err, OgentError::ToolIdCollision { ref id, .. } if id == "query"));
    }

    #[tokio::test]
    async fn close_shuts_down_live_clients() {
        let closed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&closed);
        let source = McpToolsetSource::with_connectors(BTreeMap::from([(
            "search".to_string(),
            connector(move || MockClientOps {
                closed: Arc::clone(&flag),
                ..MockClientOps::with_tools(&["query"])
            }),
        )]));

        source.discover().await.unwrap();
        assert!(!closed.load(Ordering::SeqCst));
        source.close().await;
        assert!(closed.load(Ordering::SeqCst));
    }
}
