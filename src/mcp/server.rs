//! MCP server for Penpot document editing.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: Capability negotiation and version agreement
//! 2. **Operation**: Handling tool calls and other requests
//! 3. **Shutdown**: End of input or a termination signal
//!
//! Requests are handled one at a time in arrival order. A tool call that
//! needs several change lists completes all of them before the next request
//! is read.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::mcp::protocol::{
    parse_message, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId, MCP_PROTOCOL_VERSION,
    SERVER_NAME,
};
use crate::mcp::transport::{LineTransport, StdioTransport};
use crate::remote::DocumentStore;
use crate::tools;

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for initialize request.
    AwaitingInit,
    /// Initialize received, waiting for initialized notification.
    Initialising,
    /// Ready for normal operation.
    Running,
    /// Shutdown in progress.
    ShuttingDown,
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolCapabilities>,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: Some(ToolCapabilities::default()),
        }
    }
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    #[serde(rename = "listChanged", skip_serializing_if = "is_false")]
    pub list_changed: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // skip_serializing_if takes fn(&T) -> bool
const fn is_false(b: &bool) -> bool {
    !*b
}

/// Server information for initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version requested by client.
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    /// Name of the tool to call.
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// The MCP server.
pub struct McpServer<R, W> {
    state: ServerState,
    transport: LineTransport<R, W>,
    /// Negotiated protocol version (set after initialisation).
    protocol_version: Option<String>,
    store: DocumentStore,
}

impl McpServer<tokio::io::BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Creates a server speaking MCP over stdin/stdout.
    #[must_use]
    pub fn stdio(store: DocumentStore) -> Self {
        Self::new(StdioTransport::stdio(), store)
    }
}

impl<R, W> McpServer<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    #[must_use]
    pub const fn new(transport: LineTransport<R, W>, store: DocumentStore) -> Self {
        Self {
            state: ServerState::AwaitingInit,
            transport,
            protocol_version: None,
            store,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Runs the MCP server main loop with graceful shutdown handling.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> std::io::Result<()> {
        self.run_with_shutdown().await
    }

    /// Serves requests until the input closes, ignoring process signals.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn serve(&mut self) -> std::io::Result<()> {
        loop {
            let line_result = self.transport.read_line().await;
            if self.handle_transport_result(line_result).await? {
                return Ok(());
            }
        }
    }

    #[cfg(unix)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(std::io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(std::io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    #[cfg(windows)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Returns `true` if the server should shut down.
    async fn handle_transport_result(
        &mut self,
        line_result: std::io::Result<Option<String>>,
    ) -> std::io::Result<bool> {
        let Some(line) = line_result? else {
            info!("Input closed, shutting down");
            self.state = ServerState::ShuttingDown;
            return Ok(true);
        };

        if line.trim().is_empty() {
            return Ok(false);
        }

        self.handle_line(&line).await?;

        Ok(self.state == ServerState::ShuttingDown)
    }

    async fn handle_line(&mut self, line: &str) -> std::io::Result<()> {
        match parse_message(line) {
            Ok(msg) => self.handle_message(msg).await,
            Err(error) => {
                warn!(code = error.error.code, "Rejected malformed message");
                self.transport.write_error(&error).await
            }
        }
    }

    async fn handle_message(&mut self, msg: IncomingMessage) -> std::io::Result<()> {
        match msg {
            IncomingMessage::Request(req) => self.handle_request(req).await,
            IncomingMessage::Notification(ref notif) => {
                self.handle_notification(notif);
                Ok(())
            }
        }
    }

    async fn handle_request(&mut self, req: JsonRpcRequest) -> std::io::Result<()> {
        debug!(id = %req.id, method = %req.method, "Handling request");

        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(&req),
            "tools/list" => self.handle_tools_list(&req),
            "tools/call" => self.handle_tools_call(&req).await,
            "ping" => Ok(Self::handle_ping(&req)),
            _ => Err(JsonRpcError::method_not_found(req.id.clone(), &req.method)),
        };

        match response {
            Ok(resp) => self.transport.write_response(&resp).await,
            Err(error) => self.transport.write_error(&error).await,
        }
    }

    fn handle_notification(&mut self, notif: &JsonRpcNotification) {
        if notif.method == "notifications/initialized" && self.state == ServerState::Initialising {
            info!(
                protocol_version = self.protocol_version.as_deref().unwrap_or_default(),
                "Client initialised"
            );
            self.state = ServerState::Running;
        } else {
            debug!(method = %notif.method, "Ignoring notification");
        }
    }

    fn handle_initialize(&mut self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        if self.state != ServerState::AwaitingInit {
            return Err(JsonRpcError::new(
                Some(req.id.clone()),
                JsonRpcErrorData::with_message(
                    ErrorCode::InvalidRequest,
                    "Server already initialised",
                ),
            ));
        }

        let params: InitializeParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                JsonRpcError::invalid_params(req.id.clone(), format!("Invalid initialize params: {e}"))
            })?
            .ok_or_else(|| JsonRpcError::invalid_params(req.id.clone(), "Missing initialize params"))?;

        info!(
            client = params.client_info.as_ref().map_or("unknown", |c| c.name.as_str()),
            requested_version = %params.protocol_version,
            "Initialize request"
        );

        let negotiated_version = MCP_PROTOCOL_VERSION.to_string();
        self.protocol_version = Some(negotiated_version.clone());
        self.state = ServerState::Initialising;

        let result = json!({
            "protocolVersion": negotiated_version,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": ServerInfo::default(),
        });

        Ok(JsonRpcResponse::success(req.id.clone(), result))
    }

    fn handle_tools_list(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        Ok(JsonRpcResponse::success(
            req.id.clone(),
            json!({ "tools": tools::definitions() }),
        ))
    }

    async fn handle_tools_call(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, JsonRpcError> {
        self.require_running(&req.id)?;

        let params: ToolCallParams = req
            .params
            .as_ref()
            .map(|p| serde_json::from_value(p.clone()))
            .transpose()
            .map_err(|e| {
                JsonRpcError::invalid_params(req.id.clone(), format!("Invalid tool call params: {e}"))
            })?
            .ok_or_else(|| JsonRpcError::invalid_params(req.id.clone(), "Missing tool call params"))?;

        let result = match tools::call(&self.store, &params.name, &params.arguments).await {
            None => {
                warn!(tool = %params.name, "Unknown tool");
                return Err(JsonRpcError::tool_not_found(req.id.clone(), &params.name));
            }
            Some(Err(e)) => {
                warn!(tool = %params.name, category = e.category().as_str(), error = %e, "Tool failed");
                return Err(JsonRpcError::tool_failed(req.id.clone(), &e));
            }
            Some(Ok(result)) => result,
        };

        info!(tool = %params.name, "Tool succeeded");

        let result_value = serde_json::to_value(&result).map_err(|e| {
            tracing::error!(error = %e, "Failed to serialise tool call result");
            JsonRpcError::internal_error(req.id.clone(), "Internal error: failed to serialise result")
        })?;

        Ok(JsonRpcResponse::success(req.id.clone(), result_value))
    }

    fn handle_ping(req: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::success(req.id.clone(), json!({}))
    }

    fn require_running(&self, id: &RequestId) -> Result<(), JsonRpcError> {
        if self.state != ServerState::Running {
            return Err(JsonRpcError::new(
                Some(id.clone()),
                JsonRpcErrorData::with_message(ErrorCode::InvalidRequest, "Server not initialised"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::remote::MemoryDocumentService;

    fn store() -> DocumentStore {
        DocumentStore::new(Arc::new(MemoryDocumentService::new()))
    }

    async fn exchange(input: &str) -> (ServerState, Vec<Value>) {
        let mut server = McpServer::new(LineTransport::new(input.as_bytes(), Vec::new()), store());
        server.serve().await.unwrap();
        let state = server.state();
        let output = String::from_utf8(server.transport_output()).unwrap();
        let messages = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        (state, messages)
    }

    impl<R: AsyncBufRead + Unpin> McpServer<R, Vec<u8>> {
        fn transport_output(self) -> Vec<u8> {
            self.transport.into_writer()
        }
    }

    const HANDSHAKE: &str = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","clientInfo":{"name":"test"}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
    );

    #[test]
    fn server_initial_state() {
        let server = McpServer::new(LineTransport::new(&b""[..], Vec::new()), store());
        assert_eq!(server.state(), ServerState::AwaitingInit);
    }

    #[tokio::test]
    async fn tools_require_initialisation() {
        let (_, messages) = exchange("{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n").await;
        assert_eq!(messages[0]["error"]["message"], "Server not initialised");
    }

    #[tokio::test]
    async fn handshake_then_list() {
        let input = format!("{HANDSHAKE}{}\n", r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#);
        let (state, messages) = exchange(&input).await;

        assert_eq!(state, ServerState::ShuttingDown);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(messages[0]["result"]["serverInfo"]["name"], SERVER_NAME);
        let tools = messages[1]["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), tools::definitions().len());
        assert!(tools.iter().all(|tool| tool["inputSchema"].is_object()));
    }

    #[tokio::test]
    async fn second_initialize_is_rejected() {
        let input = format!(
            "{HANDSHAKE}{}\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#
        );
        let (_, messages) = exchange(&input).await;
        assert_eq!(messages[1]["error"]["message"], "Server already initialised");
    }

    #[tokio::test]
    async fn unknown_tool_and_method() {
        let input = format!(
            "{HANDSHAKE}{}\n{}\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"explode","arguments":{}}}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#
        );
        let (_, messages) = exchange(&input).await;
        assert_eq!(messages[1]["error"]["code"], -32601);
        assert_eq!(messages[1]["error"]["message"], "Tool not found: explode");
        assert_eq!(messages[2]["error"]["message"], "Method not found: resources/list");
    }

    #[tokio::test]
    async fn tool_failure_is_a_json_rpc_error() {
        let input = format!(
            "{HANDSHAKE}{}\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"get_file","arguments":{"fileId":"missing"}}}"#
        );
        let (_, messages) = exchange(&input).await;
        assert_eq!(messages[1]["id"], 2);
        assert_eq!(messages[1]["error"]["code"], -32603);
        assert_eq!(messages[1]["error"]["data"]["category"], "not_found");
    }

    #[tokio::test]
    async fn malformed_line_gets_parse_error_and_ping_works() {
        let input = "not json\n\n{\"jsonrpc\":\"2.0\",\"id\":\"p\",\"method\":\"ping\"}\n";
        let (_, messages) = exchange(input).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["error"]["code"], -32700);
        assert_eq!(messages[1]["id"], "p");
        assert_eq!(messages[1]["result"], json!({}));
    }
}
