//! MCP server handler and transports.
//!
//! [`OpenApiMcpServer`] answers `tools/list` from the precomputed tool list and forwards
//! `tools/call` to the shared [`OpenApiToolSource`]. The same handler is served over stdio or
//! over streamable HTTP at `/mcp`.

use crate::error::{AdapterError, Result};
use axum::{Json, Router, routing::get};
use openapi_mcp_tools::OpenApiToolSource;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo,
};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt, service::RequestContext};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, info, warn};

/// Path the streamable HTTP transport is mounted on.
pub const MCP_PATH: &str = "/mcp";

#[derive(Debug, Clone)]
pub struct OpenApiMcpServer {
    source: Arc<OpenApiToolSource>,
}

impl OpenApiMcpServer {
    #[must_use]
    pub fn new(source: Arc<OpenApiToolSource>) -> Self {
        Self { source }
    }

    #[must_use]
    pub fn source(&self) -> &OpenApiToolSource {
        &self.source
    }
}

impl ServerHandler for OpenApiMcpServer {
    fn get_info(&self) -> ServerInfo {
        let name = self.source.title().unwrap_or(env!("CARGO_PKG_NAME")).to_string();
        let version = self
            .source
            .version()
            .unwrap_or(env!("CARGO_PKG_VERSION"))
            .to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: name.clone(),
                version,
                title: Some(format!("{name} (OpenAPI)")),
                ..Default::default()
            },
            instructions: Some(format!(
                "Each tool calls one HTTP operation of {name} at {}. \
                 Tool arguments are routed to the path, query string, headers and JSON body.",
                self.source.base_url()
            )),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult {
            tools: self.source.list_tools(),
            ..Default::default()
        }))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = std::result::Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            debug!(tool = %request.name, "tools/call");
            Ok(self.source.call_tool(&request.name, request.arguments).await)
        }
    }
}

/// Axum router exposing the MCP endpoint and a health check.
pub fn router(server: OpenApiMcpServer) -> Router {
    let tool_count = server.source().list_tools().len();
    let mcp_service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    Router::new()
        .route(
            "/health",
            get(move || async move { Json(json!({ "status": "ok", "tools": tool_count })) }),
        )
        .nest_service(MCP_PATH, mcp_service)
}

/// Serve MCP over stdin/stdout until the client disconnects.
///
/// # Errors
///
/// Returns an error if the MCP handshake fails or the service task aborts.
pub async fn serve_stdio(server: OpenApiMcpServer) -> Result<()> {
    info!(tools = server.source().list_tools().len(), "serving MCP over stdio");
    let running = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| AdapterError::Startup(format!("MCP stdio initialization failed: {e}")))?;
    let reason = running
        .waiting()
        .await
        .map_err(|e| AdapterError::Startup(format!("MCP stdio service aborted: {e}")))?;
    info!(reason = ?reason, "stdio session closed");
    Ok(())
}

/// Serve MCP over streamable HTTP on `bind` until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve_http(server: OpenApiMcpServer, bind: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| AdapterError::Startup(format!("failed to bind {bind}: {e}")))?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, path = MCP_PATH, "serving MCP over streamable HTTP");

    axum::serve(listener, router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP transport stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
