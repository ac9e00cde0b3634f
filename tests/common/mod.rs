//! Shared test helpers and a scripted model provider.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use ogent::agent_loop::{StreamEvent, TurnHandle, TurnOutcome};
use ogent::error::{OgentError, Result};
use ogent::provider::{DeltaStream, ModelProvider, ProviderRequest};
use ogent::tools::{AgentTool, AgentToolParameters, FsVault, Tool};
use ogent::toolset::{Discovery, RemoteToolsetSource, Toolset};
use ogent::types::{AgentToolCall, FinishReason, TextStreamDelta};

/// What the provider does on one model call.
pub enum Step {
    Stream(Vec<Result<TextStreamDelta>>),
    FailOpen(OgentError),
}

/// A model that replays scripted steps and records every request.
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    repeat_tool_call: Option<(String, Value)>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            repeat_tool_call: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A model that requests `tool` on every call, forever.
    pub fn always_calling(tool: &str, args: Value) -> Self {
        Self {
            repeat_tool_call: Some((tool.to_string(), args)),
            ..Self::new()
        }
    }

    pub fn then(self, step: Step) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    /// Stream `text` in one delta and stop.
    pub fn then_text(self, text: &str) -> Self {
        self.then(Step::Stream(vec![
            Ok(TextStreamDelta::text(text)),
            Ok(TextStreamDelta::done(Some(FinishReason::Stop), None)),
        ]))
    }

    pub fn then_tool_call(self, id: &str, name: &str, args: Value) -> Self {
        self.then(Step::Stream(vec![
            Ok(TextStreamDelta::tool_call(call(id, name, args))),
            Ok(TextStreamDelta::done(Some(FinishReason::ToolCalls), None)),
        ]))
    }

    pub fn then_fail_open(self, err: OgentError) -> Self {
        self.then(Step::FailOpen(err))
    }

    /// Stream `text`, then fail mid-stream.
    pub fn then_fail_after(self, text: &str, err: OgentError) -> Self {
        self.then(Step::Stream(vec![Ok(TextStreamDelta::text(text)), Err(err)]))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-1"
    }

    async fn stream_text(&self, request: &ProviderRequest) -> Result<DeltaStream> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        let step = self.steps.lock().unwrap().pop_front();
        let items = match step {
            Some(Step::FailOpen(err)) => return Err(err),
            Some(Step::Stream(items)) => items,
            None => match &self.repeat_tool_call {
                Some((tool, args)) => vec![
                    Ok(TextStreamDelta::tool_call(call(&format!("call_{n}"), tool, args.clone()))),
                    Ok(TextStreamDelta::done(Some(FinishReason::ToolCalls), None)),
                ],
                None => vec![Ok(TextStreamDelta::done(Some(FinishReason::Stop), None))],
            },
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

pub fn call(id: &str, name: &str, arguments: Value) -> AgentToolCall {
    AgentToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

/// `{ value: string }` in, `{ echo: value }` out.
pub fn echo_tool(id: &str) -> Arc<dyn Tool> {
    let params = AgentToolParameters::object()
        .string("value", "Text to echo", true)
        .build();
    Arc::new(AgentTool::new(id, "Echo the input", params, |args, _ctx| async move {
        let value = args.get_str("value")?.to_string();
        Ok(json!({ "echo": value }))
    }))
}

/// A tool whose handler always fails with `message`.
pub fn failing_tool(id: &str, message: &str) -> Arc<dyn Tool> {
    let tool_id = id.to_string();
    let message = message.to_string();
    Arc::new(AgentTool::new(
        id,
        "Always fails",
        AgentToolParameters::empty(),
        move |_args, _ctx| {
            let err = OgentError::tool(tool_id.clone(), message.clone());
            async move { Err(err) }
        },
    ))
}

/// A tool that never finishes on its own.
pub fn hanging_tool(id: &str) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        id,
        "Never returns",
        AgentToolParameters::empty(),
        |_args, _ctx| async move {
            std::future::pending::<()>().await;
            Ok(Value::Null)
        },
    ))
}

pub fn toolset(name: &str, tools: Vec<Arc<dyn Tool>>) -> Toolset {
    Toolset::single(name, tools).unwrap()
}

/// A temporary vault with a few notes.
pub fn vault() -> (TempDir, Arc<FsVault>) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("Welcome.md"), "# Welcome\nHello vault").unwrap();
    std::fs::create_dir_all(dir.path().join("projects")).unwrap();
    std::fs::write(dir.path().join("projects/Rust.md"), "Ownership and borrowing").unwrap();
    let host = Arc::new(FsVault::new(dir.path()).with_command("app:reload", "Reload app"));
    (dir, host)
}

/// Drain every event, then wait for the outcome.
pub async fn drain(mut handle: TurnHandle) -> (Vec<StreamEvent>, TurnOutcome) {
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    (events, handle.join().await)
}

/// A remote source that serves fixed toolsets.
pub struct StaticSource {
    toolsets: Toolset,
    discoveries: Mutex<usize>,
}

impl StaticSource {
    pub fn new(toolsets: Toolset) -> Self {
        Self {
            toolsets,
            discoveries: Mutex::new(0),
        }
    }

    pub fn discoveries(&self) -> usize {
        *self.discoveries.lock().unwrap()
    }
}

#[async_trait]
impl RemoteToolsetSource for StaticSource {
    async fn discover(&self) -> Result<Discovery> {
        *self.discoveries.lock().unwrap() += 1;
        Ok(Discovery {
            toolsets: self.toolsets.clone(),
            diagnostics: Vec::new(),
        })
    }
}
