//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::arguments::{self, ToolArguments};
use super::types::AgentToolParameters;
use super::validation::validate_arguments;
use crate::config::CredentialContext;
use crate::error::OgentError;

/// Context available during tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    /// Id of the model's tool call, when invoked from the agent loop.
    pub tool_call_id: Option<String>,
    /// Credentials for handlers that call out to authenticated services.
    pub credentials: CredentialContext,
    /// Fires when the hosting turn is cancelled.
    pub cancel: CancellationToken,
}

/// A callable action exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Globally unique tool id (what the model calls).
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the input.
    fn parameters(&self) -> &AgentToolParameters;

    /// JSON Schema for the structured output, when declared.
    fn output_schema(&self) -> Option<&serde_json::Value> {
        None
    }

    /// Run the handler. Callers go through [`invoke`], which validates first.
    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, OgentError>;
}

/// Validate `raw_args` against the tool's input schema, then execute it.
///
/// Malformed input never reaches the handler. Cancellation of `ctx.cancel`
/// drops the in-flight handler future.
pub async fn invoke(
    tool: &dyn Tool,
    raw_args: &serde_json::Value,
    ctx: &ToolExecutionContext,
) -> Result<serde_json::Value, OgentError> {
    let normalized = arguments::normalize(raw_args).map_err(|e| OgentError::Validation {
        tool_id: tool.id().to_string(),
        message: e.to_string(),
    })?;
    validate_arguments(&normalized, &tool.parameters().schema).map_err(|message| {
        OgentError::Validation {
            tool_id: tool.id().to_string(),
            message,
        }
    })?;

    let args = ToolArguments::new(normalized);
    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => Err(OgentError::Cancelled),
        result = tool.execute(&args, ctx) => result,
    }
}

type ToolHandler = dyn Fn(
        ToolArguments,
        ToolExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, OgentError>> + Send>>
    + Send
    + Sync;

/// Closure-based tool for quick tool creation.
pub struct AgentTool {
    id: String,
    description: String,
    parameters: AgentToolParameters,
    output_schema: Option<serde_json::Value>,
    handler: Arc<ToolHandler>,
}

impl AgentTool {
    /// Create a tool from a closure.
    pub fn new<F, Fut>(
        id: impl Into<String>,
        description: impl Into<String>,
        parameters: AgentToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, OgentError>> + Send + 'static,
    {
        Self {
            id: id.into(),
            description: description.into(),
            parameters,
            output_schema: None,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }

    pub fn with_output_schema(mut self, schema: AgentToolParameters) -> Self {
        self.output_schema = Some(schema.schema);
        self
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    fn output_schema(&self) -> Option<&serde_json::Value> {
        self.output_schema.as_ref()
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, OgentError> {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn echo_tool(calls: Arc<AtomicUsize>) -> AgentTool {
        AgentTool::new(
            "echo",
            "Echo the message",
            AgentToolParameters::object()
                .string("message", "Text to echo", true)
                .build(),
            move |args, _ctx| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({ "echo": args.get_str("message")? }))
                }
            },
        )
    }

    #[tokio::test]
    async fn invoke_runs_handler_for_valid_input() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tool = echo_tool(Arc::clone(&calls));

        let result = invoke(&tool, &json!({"message": "hi"}), &ToolExecutionContext::default())
            .await
            .unwrap();

        assert_eq!(result["echo"], "hi");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invoke_rejects_malformed_input_without_running_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tool = echo_tool(Arc::clone(&calls));

        let err = invoke(&tool, &json!({"message": 42}), &ToolExecutionContext::default())
            .await
            .unwrap_err();

        assert!(matches!(err, OgentError::Validation { ref tool_id, .. } if tool_id == "echo"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invoke_accepts_stringified_arguments() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tool = echo_tool(calls);

        let result = invoke(&tool, &json!(r#"{"message":"raw"}"#), &ToolExecutionContext::default())
            .await
            .unwrap();
        assert_eq!(result["echo"], "raw");
    }

    #[tokio::test]
    async fn invoke_stops_when_cancelled() {
        let tool = AgentTool::new(
            "sleepy",
            "Never finishes",
            AgentToolParameters::empty(),
            |_args, _ctx| async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(json!(null))
            },
        );
        let ctx = ToolExecutionContext::default();
        ctx.cancel.cancel();

        let err = invoke(&tool, &json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, OgentError::Cancelled));
    }

    #[test]
    fn output_schema_is_optional() {
        let tool = echo_tool(Arc::new(AtomicUsize::new(0)));
        assert!(tool.output_schema().is_none());

        let tool = tool.with_output_schema(
            AgentToolParameters::object().string("echo", "Echoed text", true).build(),
        );
        assert_eq!(tool.output_schema().unwrap()["properties"]["echo"]["type"], "string");
    }
}
