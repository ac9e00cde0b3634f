//! One chat session: conversation history, the resolved model, and the
//! assembled toolset, driving one turn at a time.

pub mod conversation;

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::sync::{oneshot, OnceCell, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent_loop::{AgentLoop, StreamEvent, TurnId, TurnOutcome, TurnRequest};
use crate::config::{AgentSettings, CredentialContext};
use crate::error::{OgentError, Result};
use crate::provider::{ModelConfig, ModelHandle, ProviderRegistry};
use crate::reducer::StreamReducer;
use crate::tools::{local_tools, Tool, VaultHost, LOCAL_TOOLSET};
use crate::toolset::{DiscoveryDiagnostic, DisabledToolIds, RemoteToolsetSource, SharedDiscovery, Toolset};
use crate::types::GenerationSettings;

pub use conversation::{Conversation, Message, Speaker};

/// Inputs fixed for the lifetime of a session.
///
/// Changing the model, credential, or remote endpoints means starting a new
/// session.
#[derive(Clone)]
pub struct SessionConfig {
    pub model: ModelConfig,
    pub credential: String,
    pub instructions: String,
    pub generation: GenerationSettings,
    /// Passed to tool handlers.
    pub credentials: CredentialContext,
    pub disabled: DisabledToolIds,
}

impl SessionConfig {
    pub fn new(model: ModelConfig, credential: impl Into<String>) -> Self {
        Self {
            model,
            credential: credential.into(),
            instructions: String::new(),
            generation: GenerationSettings::default(),
            credentials: CredentialContext::new(),
            disabled: DisabledToolIds::new(),
        }
    }

    /// Session inputs from persisted settings and the process credentials.
    pub fn from_settings(settings: &AgentSettings, env: &CredentialContext) -> Self {
        Self {
            model: settings.model.clone(),
            credential: settings.resolve_credential(env),
            instructions: settings.instructions.clone(),
            generation: GenerationSettings::default(),
            credentials: env.clone(),
            disabled: settings.disabled_tool_ids.iter().cloned().collect(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_generation(mut self, generation: GenerationSettings) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialContext) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_disabled(mut self, disabled: DisabledToolIds) -> Self {
        self.disabled = disabled;
        self
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("model", &self.model)
            .field("credential", &"[redacted]")
            .field("instructions_len", &self.instructions.len())
            .field("disabled", &self.disabled)
            .finish()
    }
}

/// Snapshot after one event: the event and both channels so far.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnUpdate {
    pub event: StreamEvent,
    pub display: String,
    pub plain: String,
}

/// Final state of a drained turn.
#[derive(Debug, Clone)]
pub struct TurnSummary {
    pub display: String,
    pub plain: String,
    pub outcome: TurnOutcome,
}

/// Live updates for one turn.
///
/// Dropping the stream cancels the turn. Assistant text produced so far is
/// still recorded in the conversation.
pub struct TurnStream {
    turn_id: TurnId,
    updates: BoxStream<'static, TurnUpdate>,
    outcome: oneshot::Receiver<TurnOutcome>,
    cancel: CancellationToken,
    display: String,
    plain: String,
}

impl TurnStream {
    pub fn turn_id(&self) -> TurnId {
        self.turn_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drain the remaining updates and wait for the outcome.
    pub async fn finish(mut self) -> TurnSummary {
        while self.next().await.is_some() {}
        let Self {
            turn_id,
            outcome,
            display,
            plain,
            ..
        } = self;
        let outcome = outcome
            .await
            .unwrap_or_else(|_| TurnOutcome::cancelled(turn_id, 0));
        TurnSummary {
            display,
            plain,
            outcome,
        }
    }
}

impl Stream for TurnStream {
    type Item = TurnUpdate;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = this.updates.poll_next_unpin(cx);
        if let Poll::Ready(Some(update)) = &polled {
            this.display.clone_from(&update.display);
            this.plain.clone_from(&update.plain);
        }
        polled
    }
}

impl std::fmt::Debug for TurnStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnStream")
            .field("turn_id", &self.turn_id)
            .finish_non_exhaustive()
    }
}

/// Owns the reducer for a running turn and writes the assistant message back
/// exactly once, however the turn ends.
struct TurnCommit {
    history: Arc<Mutex<Conversation>>,
    active: Arc<AtomicBool>,
    cancel: CancellationToken,
    reducer: StreamReducer,
}

impl Drop for TurnCommit {
    fn drop(&mut self) {
        self.cancel.cancel();
        let plain = self.reducer.plain();
        if !plain.is_empty() {
            lock(&self.history).push_assistant(plain);
        }
        self.active.store(false, Ordering::Release);
    }
}

/// A conversation with one agent.
pub struct AgentSession {
    config: SessionConfig,
    registry: ProviderRegistry,
    local: Vec<Arc<dyn Tool>>,
    remote: Vec<SharedDiscovery>,
    model: OnceCell<Result<ModelHandle>>,
    disabled: Arc<RwLock<DisabledToolIds>>,
    history: Arc<Mutex<Conversation>>,
    active: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl AgentSession {
    pub fn new(config: SessionConfig, registry: ProviderRegistry, host: Arc<dyn VaultHost>) -> Self {
        let disabled = Arc::new(RwLock::new(config.disabled.clone()));
        Self {
            config,
            registry,
            local: local_tools(host),
            remote: Vec::new(),
            model: OnceCell::new(),
            disabled,
            history: Arc::new(Mutex::new(Conversation::new())),
            active: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }

    /// Add a remote toolset source. Discovery runs on first use.
    pub fn with_remote(mut self, source: Arc<dyn RemoteToolsetSource>) -> Self {
        self.remote.push(SharedDiscovery::new(source));
        self
    }

    /// Add one rmcp client per configured server.
    #[cfg(feature = "mcp")]
    pub fn with_mcp_servers(
        self,
        servers: &std::collections::BTreeMap<String, crate::config::McpServerConfig>,
    ) -> Self {
        if servers.is_empty() {
            return self;
        }
        self.with_remote(Arc::new(crate::mcp::McpToolsetSource::from_configs(servers)))
    }

    /// Continue from an earlier transcript.
    pub fn with_history(self, history: Conversation) -> Self {
        *lock(&self.history) = history;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Shared disable list; edits apply from the next turn.
    pub fn disabled_tools(&self) -> Arc<RwLock<DisabledToolIds>> {
        Arc::clone(&self.disabled)
    }

    pub async fn disable_tool(&self, tool_id: &str) -> bool {
        self.disabled.write().await.disable(tool_id)
    }

    pub async fn enable_tool(&self, tool_id: &str) -> bool {
        self.disabled.write().await.enable(tool_id)
    }

    /// Snapshot of the transcript.
    pub fn history(&self) -> Conversation {
        lock(&self.history).clone()
    }

    pub fn is_turn_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The resolved model. Resolution happens once; a failure is kept and
    /// returned for every later call.
    pub async fn model(&self) -> Result<ModelHandle> {
        let resolved = self
            .model
            .get_or_init(|| async {
                self.registry
                    .resolve(&self.config.model, &self.config.credential)
            })
            .await;
        match resolved {
            Ok(handle) => Ok(Arc::clone(handle)),
            Err(err) => Err(replay(err)),
        }
    }

    /// Local tools merged with every discovered remote toolset, unfiltered.
    pub async fn toolset(&self) -> Result<Toolset> {
        let mut toolset = Toolset::single(LOCAL_TOOLSET, self.local.clone())?;
        for remote in &self.remote {
            let discovery = remote.get().await?;
            toolset = toolset.merge(discovery.toolsets.clone())?;
        }
        Ok(toolset)
    }

    /// The tools a turn started now could call.
    pub async fn enabled_toolset(&self) -> Result<Toolset> {
        let toolset = self.toolset().await?;
        let disabled = self.disabled.read().await;
        Ok(toolset.filtered(&disabled))
    }

    /// Endpoints that failed during the last discovery.
    pub async fn diagnostics(&self) -> Result<Vec<DiscoveryDiagnostic>> {
        let mut diagnostics = Vec::new();
        for remote in &self.remote {
            diagnostics.extend(remote.get().await?.diagnostics.iter().cloned());
        }
        Ok(diagnostics)
    }

    /// Forget discovered toolsets; the next turn discovers again.
    pub async fn refresh_tools(&self) {
        for remote in &self.remote {
            remote.refresh().await;
        }
    }

    /// Append a user message and start a turn.
    ///
    /// Fails with [`OgentError::TurnInProgress`] while another turn is
    /// streaming. A model or toolset failure does not fail the call: it is
    /// recorded in the transcript and reported through the returned stream.
    pub async fn send(&self, text: impl Into<String>) -> Result<TurnStream> {
        if self.is_closed() {
            return Err(OgentError::InvalidState("session is closed".into()));
        }
        if self.active.swap(true, Ordering::AcqRel) {
            return Err(OgentError::TurnInProgress);
        }

        let cancel = self.cancel.child_token();
        let mut commit = TurnCommit {
            history: Arc::clone(&self.history),
            active: Arc::clone(&self.active),
            cancel: cancel.clone(),
            reducer: StreamReducer::new(),
        };
        lock(&self.history).push_user(text);

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let request = match self.prepare_turn().await {
            Ok(request) => request,
            Err(err) => return Ok(self.failed_turn(commit, err, outcome_tx, outcome_rx, cancel)),
        };

        let turn_id = request.turn_id;
        info!(turn_id = %turn_id, tools = request.toolset.len(), "starting turn");
        let loop_cancel = cancel.clone();
        let updates = async_stream::stream! {
            let mut handle = AgentLoop::start_with_cancel(request, loop_cancel);
            while let Some(event) = handle.next_event().await {
                commit.reducer.apply(&event);
                yield TurnUpdate {
                    event,
                    display: commit.reducer.display().to_string(),
                    plain: commit.reducer.plain().to_string(),
                };
            }
            let outcome = handle.join().await;
            drop(commit);
            let _ = outcome_tx.send(outcome);
        };

        Ok(TurnStream {
            turn_id,
            updates: updates.boxed(),
            outcome: outcome_rx,
            cancel,
            display: String::new(),
            plain: String::new(),
        })
    }

    /// Cancel the active turn and shut down remote toolsets.
    pub async fn close(&self) {
        self.cancel.cancel();
        for remote in &self.remote {
            remote.close().await;
        }
        info!("session closed");
    }

    async fn prepare_turn(&self) -> Result<TurnRequest> {
        let model = self.model().await?;
        let toolset = self.toolset().await?;
        let disabled = self.disabled.read().await.clone();
        let history = lock(&self.history).to_model_messages();
        Ok(
            TurnRequest::new(model, self.config.instructions.clone(), history)
                .with_toolset(toolset.filtered(&disabled))
                .with_settings(self.config.generation.clone())
                .with_credentials(self.config.credentials.clone()),
        )
    }

    /// A turn that failed before the loop started: one failure update, and
    /// the error recorded as the assistant's reply.
    fn failed_turn(
        &self,
        mut commit: TurnCommit,
        err: OgentError,
        outcome_tx: oneshot::Sender<TurnOutcome>,
        outcome_rx: oneshot::Receiver<TurnOutcome>,
        cancel: CancellationToken,
    ) -> TurnStream {
        let turn_id = Uuid::new_v4();
        let message = err.to_string();
        warn!(turn_id = %turn_id, error = %message, "turn could not start");

        commit.reducer.apply_failure(&message);
        let update = TurnUpdate {
            event: StreamEvent::Error {
                retryable: err.is_retryable(),
                data: err.payload(),
            },
            display: commit.reducer.display().to_string(),
            plain: String::new(),
        };
        lock(&self.history).push_assistant(format!("Error: {message}"));
        drop(commit);
        let _ = outcome_tx.send(TurnOutcome::failed(turn_id, 0, message));

        TurnStream {
            turn_id,
            updates: futures::stream::iter([update]).boxed(),
            outcome: outcome_rx,
            cancel,
            display: String::new(),
            plain: String::new(),
        }
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("config", &self.config)
            .field("local_tools", &self.local.len())
            .field("remote_sources", &self.remote.len())
            .field("turn_active", &self.is_turn_active())
            .finish_non_exhaustive()
    }
}

fn lock(history: &Mutex<Conversation>) -> MutexGuard<'_, Conversation> {
    history.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Rebuild a cached resolution error.
fn replay(err: &OgentError) -> OgentError {
    match err {
        OgentError::UnconfiguredProvider { provider } => OgentError::UnconfiguredProvider {
            provider: provider.clone(),
        },
        OgentError::UnsupportedProvider(provider) => {
            OgentError::UnsupportedProvider(provider.clone())
        }
        OgentError::Configuration(message) => OgentError::Configuration(message.clone()),
        other => OgentError::Configuration(other.to_string()),
    }
}
