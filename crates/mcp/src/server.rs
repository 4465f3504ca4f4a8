//! `ToolHandler` as an `rmcp` server, served over stdio.

use crate::tools::ToolHandler;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ErrorData, Implementation, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler, ServiceExt as _};
use tokio::io::{AsyncRead, AsyncWrite};

const INSTRUCTIONS: &str = "Browse loaded OpenAPI specs (list_apis, search_operations), inspect \
     operations and schemas (get_endpoint_details, get_schema), and generate client code \
     examples (generate_code_example).";

impl ServerHandler for ToolHandler {
    fn get_info(&self) -> ServerInfo {
        let mut server_info = Implementation::from_build_env();
        server_info.name = env!("CARGO_PKG_NAME").to_string();
        server_info.version = env!("CARGO_PKG_VERSION").to_string();

        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info = server_info;
        info.instructions = Some(INSTRUCTIONS.to_string());
        info
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: self.tools(),
            ..Default::default()
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let args = request.arguments.unwrap_or_default();
        self.call(&request.name, &args)
            .await
            .map_err(|e| ErrorData::invalid_params(e.to_string(), None))
    }
}

/// Serve one MCP session over `reader`/`writer` until the peer disconnects.
///
/// # Errors
///
/// Returns an error if the `initialize` handshake fails or the service task panics.
pub async fn serve<R, W>(handler: ToolHandler, reader: R, writer: W) -> anyhow::Result<()>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let service = handler.serve((reader, writer)).await?;
    let reason = service.waiting().await?;
    tracing::info!(?reason, "MCP session ended");
    Ok(())
}

/// [`serve`] on the process's stdin/stdout.
///
/// # Errors
///
/// See [`serve`].
pub async fn serve_stdio(handler: ToolHandler) -> anyhow::Result<()> {
    let (stdin, stdout) = rmcp::transport::stdio();
    serve(handler, stdin, stdout).await
}
