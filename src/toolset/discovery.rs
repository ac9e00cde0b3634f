//! Remote toolset discovery and its per-session cache.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::Toolset;
use crate::error::Result;

/// A non-fatal problem found while discovering one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDiagnostic {
    pub endpoint: String,
    pub message: String,
}

/// Result of one discovery pass: the toolsets that came up and what failed.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub toolsets: Toolset,
    pub diagnostics: Vec<DiscoveryDiagnostic>,
}

impl Discovery {
    pub fn is_partial(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Source of remotely hosted toolsets.
///
/// One endpoint failing must not abort the others; it shows up in
/// [`Discovery::diagnostics`]. An `Err` is reserved for failures that leave no
/// consistent toolset, such as a tool id advertised by two endpoints.
#[async_trait]
pub trait RemoteToolsetSource: Send + Sync {
    async fn discover(&self) -> Result<Discovery>;

    /// Release connections held by discovered tools.
    async fn close(&self) {}
}

/// Discovers once, then serves the cached result until [`refresh`](Self::refresh).
///
/// Callers that arrive while a discovery is running wait for it instead of
/// starting another.
pub struct SharedDiscovery {
    source: Arc<dyn RemoteToolsetSource>,
    cached: Mutex<Option<Arc<Discovery>>>,
}

impl SharedDiscovery {
    pub fn new(source: Arc<dyn RemoteToolsetSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Result<Arc<Discovery>> {
        let mut cached = self.cached.lock().await;
        if let Some(discovery) = cached.as_ref() {
            return Ok(Arc::clone(discovery));
        }

        let discovery = Arc::new(self.source.discover().await?);
        for diagnostic in &discovery.diagnostics {
            tracing::warn!(
                toolset = %diagnostic.endpoint,
                message = %diagnostic.message,
                "remote toolset unavailable"
            );
        }
        tracing::debug!(tools = discovery.toolsets.len(), "remote discovery complete");
        *cached = Some(Arc::clone(&discovery));
        Ok(discovery)
    }

    /// Drop the cached result; the next [`get`](Self::get) discovers again.
    pub async fn refresh(&self) {
        self.cached.lock().await.take();
    }

    pub async fn close(&self) {
        self.refresh().await;
        self.source.close().await;
    }
}

impl std::fmt::Debug for SharedDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDiscovery").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{AgentTool, AgentToolParameters, Tool};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteToolsetSource for CountingSource {
        async fn discover(&self) -> Result<Discovery> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            let tool: Arc<dyn Tool> = Arc::new(AgentTool::new(
                "remote-search",
                "search",
                AgentToolParameters::empty(),
                |_args, _ctx| async move { Ok(json!([])) },
            ));
            Ok(Discovery {
                toolsets: Toolset::single("search", vec![tool])?,
                diagnostics: vec![DiscoveryDiagnostic {
                    endpoint: "broken".into(),
                    message: "spawn failed".into(),
                }],
            })
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_discovery() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let shared = SharedDiscovery::new(source.clone());

        let (a, b) = tokio::join!(shared.get(), shared.get());
        assert_eq!(a.unwrap().toolsets.len(), 1);
        assert!(b.unwrap().is_partial());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_forces_a_new_discovery() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let shared = SharedDiscovery::new(source.clone());

        shared.get().await.unwrap();
        shared.get().await.unwrap();
        shared.refresh().await;
        shared.get().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
