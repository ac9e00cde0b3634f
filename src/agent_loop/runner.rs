//! Bounded multi-step tool-calling loop.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::CredentialContext;
use crate::error::OgentError;
use crate::provider::{ModelHandle, ProviderRequest, ToolDefinition};
use crate::tools::{invoke, ToolExecutionContext};
use crate::toolset::Toolset;
use crate::types::{
    AgentToolCall, FinishReason, GenerationSettings, ModelMessage, StreamEventType,
};

use super::events::StreamEvent;
use super::types::{TurnId, TurnOutcome, MAX_STEPS};

/// Buffer between the loop and its consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Everything one turn needs.
#[derive(Clone)]
pub struct TurnRequest {
    pub turn_id: TurnId,
    pub instructions: String,
    pub model: ModelHandle,
    /// Already filtered by the disable list.
    pub toolset: Toolset,
    pub history: Vec<ModelMessage>,
    pub settings: GenerationSettings,
    pub credentials: CredentialContext,
    pub max_steps: usize,
}

impl TurnRequest {
    pub fn new(model: ModelHandle, instructions: impl Into<String>, history: Vec<ModelMessage>) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            instructions: instructions.into(),
            model,
            toolset: Toolset::new(),
            history,
            settings: GenerationSettings::default(),
            credentials: CredentialContext::new(),
            max_steps: MAX_STEPS,
        }
    }

    pub fn with_toolset(mut self, toolset: Toolset) -> Self {
        self.toolset = toolset;
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialContext) -> Self {
        self.credentials = credentials;
        self
    }

    /// Lower the step ceiling. Values above [`MAX_STEPS`] are clamped.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.clamp(1, MAX_STEPS);
        self
    }
}

/// Handle for an in-flight turn.
#[derive(Debug)]
pub struct TurnHandle {
    turn_id: TurnId,
    events: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    task: JoinHandle<TurnOutcome>,
}

impl TurnHandle {
    pub fn turn_id(&self) -> TurnId {
        self.turn_id
    }

    /// Next event, or `None` once the loop has stopped emitting.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Stop the turn at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to finish. Undrained events are discarded.
    pub async fn join(self) -> TurnOutcome {
        let Self {
            turn_id,
            events,
            task,
            ..
        } = self;
        drop(events);
        match task.await {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => TurnOutcome::cancelled(turn_id, 0),
            Err(err) => TurnOutcome::failed(turn_id, 0, err.to_string()),
        }
    }
}

/// Entry point for running turns.
pub struct AgentLoop;

impl AgentLoop {
    /// Spawn the loop for `request`. Must be called inside a tokio runtime.
    pub fn start(request: TurnRequest) -> TurnHandle {
        Self::start_with_cancel(request, CancellationToken::new())
    }

    /// Like [`AgentLoop::start`], cancelled whenever `cancel` is.
    pub fn start_with_cancel(request: TurnRequest, cancel: CancellationToken) -> TurnHandle {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let turn_id = request.turn_id;
        let span = info_span!("turn", turn_id = %turn_id, model = request.model.model_id());
        let task = tokio::spawn(run_turn(request, tx, cancel.clone()).instrument(span));
        TurnHandle {
            turn_id,
            events: rx,
            cancel,
            task,
        }
    }
}

struct Emitter {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl Emitter {
    /// False once the consumer is gone or the turn is cancelled.
    async fn emit(&self, event: StreamEvent) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }
}

enum StepEnd {
    Answered(Option<FinishReason>),
    Tools(Vec<AgentToolCall>, Option<FinishReason>),
    Failed(OgentError),
    Stopped,
}

async fn run_turn(
    request: TurnRequest,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) -> TurnOutcome {
    let turn_id = request.turn_id;
    let emitter = Emitter {
        tx,
        cancel: cancel.clone(),
    };

    let tool_defs: Vec<ToolDefinition> = request
        .toolset
        .tools()
        .map(|tool| ToolDefinition::from_tool(tool.as_ref()))
        .collect();

    let mut messages = Vec::with_capacity(request.history.len() + 1);
    if !request.instructions.trim().is_empty() {
        messages.push(ModelMessage::system(request.instructions.clone()));
    }
    messages.extend(
        request
            .history
            .iter()
            .filter(|message| !is_blank(message))
            .cloned(),
    );

    info!(tools = tool_defs.len(), history = messages.len(), "turn start");

    let mut step = 0usize;
    let mut last_reason = None;
    loop {
        if step >= request.max_steps {
            info!(steps = step, "step ceiling reached");
            let finish = StreamEvent::Finish {
                finish_reason: last_reason,
                steps: step,
                truncated: true,
            };
            if !emitter.emit(finish).await {
                return TurnOutcome::cancelled(turn_id, step);
            }
            return TurnOutcome::completed(turn_id, step, true);
        }
        step += 1;

        if !emitter.emit(StreamEvent::StepStart { step }).await {
            return TurnOutcome::cancelled(turn_id, step);
        }

        let provider_request = ProviderRequest {
            messages: messages.clone(),
            settings: request.settings.clone(),
            tools: tool_defs.clone(),
        };

        let (text, end) = stream_step(&request, &provider_request, &emitter, &cancel, step).await;
        let (calls, reason) = match end {
            StepEnd::Stopped => return TurnOutcome::cancelled(turn_id, step),
            StepEnd::Failed(err) => {
                warn!(step, error = %err, "model call failed");
                let event = StreamEvent::Error {
                    retryable: err.is_retryable(),
                    data: err.payload(),
                };
                if !emitter.emit(event).await {
                    return TurnOutcome::cancelled(turn_id, step);
                }
                return TurnOutcome::failed(turn_id, step, err.to_string());
            }
            StepEnd::Answered(reason) => (Vec::new(), reason),
            StepEnd::Tools(calls, reason) => (calls, reason),
        };
        last_reason = reason;

        if !emitter
            .emit(StreamEvent::StepFinish {
                step,
                finish_reason: reason,
            })
            .await
        {
            return TurnOutcome::cancelled(turn_id, step);
        }

        debug!(step, tool_calls = calls.len(), text_len = text.len(), "step complete");

        if calls.is_empty() {
            let finish = StreamEvent::Finish {
                finish_reason: reason,
                steps: step,
                truncated: false,
            };
            if !emitter.emit(finish).await {
                return TurnOutcome::cancelled(turn_id, step);
            }
            info!(steps = step, "turn complete");
            return TurnOutcome::completed(turn_id, step, false);
        }

        messages.push(ModelMessage::assistant_with_calls(&text, &calls));

        // One at a time, in call order.
        for call in &calls {
            let Some((result, is_error)) = dispatch(&request, call, &cancel, step).await else {
                return TurnOutcome::cancelled(turn_id, step);
            };
            let event = StreamEvent::ToolResult {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                result: result.clone(),
                is_error,
            };
            if !emitter.emit(event).await {
                return TurnOutcome::cancelled(turn_id, step);
            }
            messages.push(ModelMessage::tool_result(call.id.clone(), result, is_error));
        }
    }
}

/// Stream one model call, forwarding text and tool calls as they arrive.
async fn stream_step(
    request: &TurnRequest,
    provider_request: &ProviderRequest,
    emitter: &Emitter,
    cancel: &CancellationToken,
    step: usize,
) -> (String, StepEnd) {
    let mut text = String::new();

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => return (text, StepEnd::Stopped),
        opened = request.model.stream_text(provider_request) => opened,
    };
    let mut stream = match opened {
        Ok(stream) => stream,
        Err(err) => return (text, StepEnd::Failed(err)),
    };

    let mut calls: Vec<AgentToolCall> = Vec::new();
    let mut reason = None;
    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => return (text, StepEnd::Stopped),
            item = stream.next() => item,
        };
        let Some(item) = item else { break };
        let delta = match item {
            Ok(delta) => delta,
            Err(err) => return (text, StepEnd::Failed(err)),
        };
        match delta.event_type {
            StreamEventType::TextDelta => {
                if delta.text.is_empty() {
                    continue;
                }
                text.push_str(&delta.text);
                if !emitter.emit(StreamEvent::TextDelta { text: delta.text }).await {
                    return (text, StepEnd::Stopped);
                }
            }
            StreamEventType::ToolCallDelta => {
                let Some(call) = delta.tool_call else { continue };
                if let Some(known) = calls.iter_mut().find(|known| known.id == call.id) {
                    *known = call;
                    continue;
                }
                debug!(step, tool_id = %call.name, "tool call requested");
                let event = StreamEvent::ToolCall {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    args: call.arguments.clone(),
                };
                calls.push(call);
                if !emitter.emit(event).await {
                    return (text, StepEnd::Stopped);
                }
            }
            StreamEventType::Done => {
                reason = delta.finish_reason;
                break;
            }
        }
    }

    if calls.is_empty() {
        (text, StepEnd::Answered(reason))
    } else {
        (text, StepEnd::Tools(calls, reason))
    }
}

/// Run one tool call. `None` means the turn was cancelled mid-call.
async fn dispatch(
    request: &TurnRequest,
    call: &AgentToolCall,
    cancel: &CancellationToken,
    step: usize,
) -> Option<(serde_json::Value, bool)> {
    let Some(tool) = request.toolset.tool(&call.name) else {
        warn!(step, tool_id = %call.name, "model called an unavailable tool");
        let err = OgentError::ToolNotFound(call.name.clone());
        return Some((serde_json::json!({ "error": err.to_string() }), true));
    };

    let toolset = request.toolset.toolset_of(&call.name).unwrap_or_default();
    info!(step, tool_id = %call.name, toolset, "dispatching tool");

    let ctx = ToolExecutionContext {
        tool_call_id: Some(call.id.clone()),
        credentials: request.credentials.clone(),
        cancel: cancel.child_token(),
    };
    match invoke(tool.as_ref(), &call.arguments, &ctx).await {
        Ok(value) => Some((value, false)),
        Err(OgentError::Cancelled) if cancel.is_cancelled() => None,
        Err(err) => {
            warn!(step, tool_id = %call.name, error = %err, "tool failed");
            Some((serde_json::json!({ "error": tool_error_message(&err) }), true))
        }
    }
}

/// What the model sees when a tool call fails.
fn tool_error_message(err: &OgentError) -> String {
    match err {
        OgentError::ToolExecution { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn is_blank(message: &ModelMessage) -> bool {
    message.tool_calls().is_empty()
        && !message
            .content
            .iter()
            .any(|part| matches!(part, crate::types::ContentPart::ToolResult(_)))
        && message.text().trim().is_empty()
}
