//! MCP client for one tool server.

use rmcp::{
    model::{
        CallToolRequestParams, CallToolResult, Content, JsonObject, ProtocolVersion,
        ResourceContents,
    },
    service::{ClientInitializeError, ServiceError},
};

use super::schema::MCPToolSchema;
use super::transport::{MCPRunningService, MCPTransport};
use crate::error::OgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MCPConnectionState {
    Disconnected,
    Initialized,
    Closed,
}

/// Successful tool call output.
#[derive(Debug, Clone)]
pub struct MCPToolCallResult {
    pub structured_content: Option<serde_json::Value>,
    pub text_content: Option<String>,
    pub content: Vec<serde_json::Value>,
}

impl MCPToolCallResult {
    /// Structured content when present, else joined text, else the raw content list.
    pub fn into_value(self) -> serde_json::Value {
        if let Some(structured) = self.structured_content {
            return structured;
        }
        if let Some(text) = self.text_content {
            return serde_json::Value::String(text);
        }
        serde_json::Value::Array(self.content)
    }
}

/// Client for a Model Context Protocol server.
///
/// Connects lazily on [`initialize`](Self::initialize) and reconnects once when
/// the session drops mid-request.
pub struct MCPClient {
    transport: Box<dyn MCPTransport>,
    session: Option<MCPRunningService>,
    state: MCPConnectionState,
}

impl MCPClient {
    pub fn new(transport: Box<dyn MCPTransport>) -> Self {
        Self {
            transport,
            session: None,
            state: MCPConnectionState::Disconnected,
        }
    }

    pub fn connection_state(&self) -> MCPConnectionState {
        self.state
    }

    /// Connect if needed. Idempotent while the session is alive.
    pub async fn initialize(&mut self) -> Result<(), OgentError> {
        match self.state {
            MCPConnectionState::Closed => {
                return Err(OgentError::Stream("MCP session is closed".into()))
            }
            MCPConnectionState::Initialized => {
                if self.session.as_ref().is_some_and(|s| !s.is_closed()) {
                    return Ok(());
                }
                self.session = None;
            }
            MCPConnectionState::Disconnected => {}
        }

        let session = self.connect_with_protocol_fallback().await?;
        self.session = Some(session);
        self.state = MCPConnectionState::Initialized;
        Ok(())
    }

    pub async fn list_tools(&mut self) -> Result<Vec<MCPToolSchema>, OgentError> {
        self.ensure_initialized()?;

        let tools = match self.list_tools_once().await {
            Ok(tools) => tools,
            Err(error) if should_reconnect(&error) => {
                self.reconnect().await?;
                self.list_tools_once()
                    .await
                    .map_err(|retry| map_service_error("list_tools", retry))?
            }
            Err(error) => return Err(map_service_error("list_tools", error)),
        };

        Ok(tools.into_iter().map(map_mcp_tool_schema).collect())
    }

    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<MCPToolCallResult, OgentError> {
        self.ensure_initialized()?;
        let arguments = coerce_tool_arguments(arguments)?;

        let result = match self.call_tool_once(name, arguments.clone()).await {
            Ok(result) => result,
            Err(error) if should_reconnect(&error) => {
                self.reconnect().await?;
                self.call_tool_once(name, arguments)
                    .await
                    .map_err(|retry| map_service_error("call_tool", retry))?
            }
            Err(error) => return Err(map_service_error("call_tool", error)),
        };

        map_call_result(name, result)
    }

    /// Shut the session down. The child process exits with it.
    pub async fn close(&mut self) {
        self.state = MCPConnectionState::Closed;
        self.transport.close();
        if let Some(session) = self.session.take() {
            if let Err(error) = session.cancel().await {
                tracing::debug!(%error, "MCP session did not shut down cleanly");
            }
        }
    }

    fn ensure_initialized(&self) -> Result<(), OgentError> {
        match self.state {
            MCPConnectionState::Initialized => Ok(()),
            MCPConnectionState::Closed => Err(OgentError::Stream("MCP session is closed".into())),
            MCPConnectionState::Disconnected => Err(OgentError::InvalidState(
                "MCP client must be initialized first".into(),
            )),
        }
    }

    async fn reconnect(&mut self) -> Result<(), OgentError> {
        tracing::debug!("MCP session dropped, reconnecting");
        self.session = None;
        self.state = MCPConnectionState::Disconnected;
        self.initialize().await
    }

    async fn connect_with_protocol_fallback(&mut self) -> Result<MCPRunningService, OgentError> {
        let latest = rmcp::model::ClientInfo {
            protocol_version: ProtocolVersion::LATEST,
            ..Default::default()
        };

        match self.transport.connect(latest).await {
            Ok(session) => return Ok(session),
            Err(error) if is_protocol_version_rejection(&error) => {}
            Err(error) => return Err(map_client_initialize_error(error)),
        }

        let legacy = rmcp::model::ClientInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            ..Default::default()
        };
        self.transport
            .connect(legacy)
            .await
            .map_err(map_client_initialize_error)
    }

    async fn list_tools_once(&mut self) -> Result<Vec<rmcp::model::Tool>, ServiceError> {
        let session = self.session.as_mut().ok_or(ServiceError::TransportClosed)?;
        match session.list_all_tools().await {
            Err(ServiceError::UnexpectedResponse) => {
                session.list_tools(None).await.map(|page| page.tools)
            }
            other => other,
        }
    }

    async fn call_tool_once(
        &mut self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<CallToolResult, ServiceError> {
        let session = self.session.as_mut().ok_or(ServiceError::TransportClosed)?;
        session
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments,
                task: None,
            })
            .await
    }
}

fn should_reconnect(error: &ServiceError) -> bool {
    matches!(
        error,
        ServiceError::TransportClosed | ServiceError::TransportSend(_)
    )
}

fn is_protocol_version_rejection(error: &ClientInitializeError) -> bool {
    match error {
        ClientInitializeError::JsonRpcError(error) => {
            let message = error.message.to_ascii_lowercase();
            message.contains("protocol") && message.contains("version")
        }
        _ => false,
    }
}

fn map_mcp_tool_schema(tool: rmcp::model::Tool) -> MCPToolSchema {
    MCPToolSchema {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()),
        input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
        output_schema: tool
            .output_schema
            .map(|schema| serde_json::Value::Object((*schema).clone())),
    }
}

fn coerce_tool_arguments(value: serde_json::Value) -> Result<Option<JsonObject>, OgentError> {
    match crate::tools::arguments::normalize(&value)? {
        serde_json::Value::Object(map) if map.is_empty() => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        other => Err(OgentError::InvalidArgument(format!(
            "MCP tool arguments must be a JSON object; got {other}"
        ))),
    }
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let lines: Vec<String> = content
        .iter()
        .filter_map(|item| {
            if let Some(text) = item.as_text() {
                return Some(text.text.clone());
            }
            match &item.as_resource()?.resource {
                ResourceContents::TextResourceContents { text, .. } => Some(text.clone()),
                _ => None,
            }
        })
        .collect();

    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn map_call_result(name: &str, result: CallToolResult) -> Result<MCPToolCallResult, OgentError> {
    let text_content = extract_text_content(&result.content);

    if result.is_error.unwrap_or(false) {
        let message = text_content
            .or_else(|| result.structured_content.as_ref().map(|v| v.to_string()))
            .unwrap_or_else(|| "MCP tool returned an error result".into());
        return Err(OgentError::tool(name, message));
    }

    let content = result
        .content
        .iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect();
    Ok(MCPToolCallResult {
        structured_content: result.structured_content,
        text_content,
        content,
    })
}

fn map_client_initialize_error(error: ClientInitializeError) -> OgentError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            OgentError::Stream(format!("MCP initialize connection closed: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => OgentError::Stream(format!(
            "MCP initialize transport error ({context}): {error}"
        )),
        ClientInitializeError::JsonRpcError(error) => OgentError::Provider {
            provider: "mcp".into(),
            message: format!(
                "MCP initialize JSON-RPC error {}: {}",
                error.code.0, error.message
            ),
        },
        ClientInitializeError::Cancelled => OgentError::Cancelled,
        other => OgentError::Provider {
            provider: "mcp".into(),
            message: format!("MCP initialize error: {other}"),
        },
    }
}

fn map_service_error(context: &str, error: ServiceError) -> OgentError {
    match error {
        ServiceError::McpError(error) => OgentError::Provider {
            provider: "mcp".into(),
            message: format!("{context}: MCP error {}: {}", error.code.0, error.message),
        },
        ServiceError::TransportSend(error) => {
            OgentError::Stream(format!("{context}: MCP transport send failed: {error}"))
        }
        ServiceError::TransportClosed => {
            OgentError::Stream(format!("{context}: MCP transport closed"))
        }
        ServiceError::Cancelled { reason } => {
            let suffix = reason.map(|r| format!(" ({r})")).unwrap_or_default();
            OgentError::Stream(format!("{context}: MCP request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => OgentError::Timeout(timeout.as_millis() as u64),
        other => OgentError::Provider {
            provider: "mcp".into(),
            message: format!("{context}: MCP service error: {other}"),
        },
    }
}
