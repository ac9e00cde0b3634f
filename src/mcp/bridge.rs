//! Bridge MCP tools into the [`Tool`] system.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::client::{MCPClient, MCPToolCallResult};
use super::schema::MCPToolSchema;
use crate::error::OgentError;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

/// Client operations the bridge depends on.
#[async_trait]
pub(crate) trait MCPClientOps: Send {
    async fn initialize(&mut self) -> Result<(), OgentError>;
    async fn list_tools(&mut self) -> Result<Vec<MCPToolSchema>, OgentError>;
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<MCPToolCallResult, OgentError>;
    async fn close(&mut self);
}

#[async_trait]
impl MCPClientOps for MCPClient {
    async fn initialize(&mut self) -> Result<(), OgentError> {
        MCPClient::initialize(self).await
    }

    async fn list_tools(&mut self) -> Result<Vec<MCPToolSchema>, OgentError> {
        MCPClient::list_tools(self).await
    }

    async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<MCPToolCallResult, OgentError> {
        MCPClient::call_tool(self, name, arguments).await
    }

    async fn close(&mut self) {
        MCPClient::close(self).await
    }
}

/// One client shared by every tool its server advertises.
pub(crate) type SharedClient = Arc<Mutex<Box<dyn MCPClientOps>>>;

/// A tool advertised by an MCP server.
///
/// The id is the upstream tool name. Calls are forwarded to the owning
/// server; an error result from the server becomes a tool execution error.
pub struct MCPTool {
    endpoint: String,
    schema: MCPToolSchema,
    parameters: AgentToolParameters,
    client: SharedClient,
}

impl MCPTool {
    pub(crate) fn new(endpoint: impl Into<String>, schema: MCPToolSchema, client: SharedClient) -> Self {
        let parameters = AgentToolParameters::from_schema(schema.normalized_input_schema());
        Self {
            endpoint: endpoint.into(),
            schema,
            parameters,
            client,
        }
    }

    /// Name of the endpoint this tool belongs to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Tool for MCPTool {
    fn id(&self) -> &str {
        &self.schema.name
    }

    fn description(&self) -> &str {
        self.schema.description.as_deref().unwrap_or_default()
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    fn output_schema(&self) -> Option<&serde_json::Value> {
        self.schema.output_schema.as_ref()
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<serde_json::Value, OgentError> {
        tracing::debug!(toolset = %self.endpoint, tool_id = %self.schema.name, "forwarding MCP tool call");
        let mut client = self.client.lock().await;
        client.initialize().await?;
        let result = client.call_tool(&self.schema.name, args.raw().clone()).await?;
        Ok(result.into_value())
    }
}

impl std::fmt::Debug for MCPTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MCPTool")
            .field("endpoint", &self.endpoint)
            .field("name", &self.schema.name)
            .finish()
    }
}
