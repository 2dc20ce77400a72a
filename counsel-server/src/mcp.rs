//! MCP shell: serves the catalogue over stdio via `rmcp`.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    ProtocolVersion, ServerCapabilities, ServerInfo, Tool as McpTool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::transport::io::stdio;
use rmcp::{ErrorData, ServerHandler, ServiceExt};
use tracing::debug;

use crate::core::Core;
use crate::handler::RequestHandler;

/// MCP server over the counsel [`Core`].
///
/// Call [`serve_stdio`](McpServer::serve_stdio) to serve via stdin/stdout;
/// this blocks until the client disconnects.
pub struct McpServer {
    handler: Arc<RequestHandler>,
}

impl McpServer {
    /// Wrap a core for serving.
    pub fn new(core: Arc<Core>) -> Self {
        Self {
            handler: Arc::new(RequestHandler::new(core)),
        }
    }

    /// Serve the tools over stdio.
    ///
    /// # Errors
    ///
    /// Returns an error string if transport setup or serving fails.
    pub async fn serve_stdio(self) -> Result<(), String> {
        let service = McpServerHandler {
            handler: self.handler,
        }
        .serve(stdio())
        .await
        .map_err(|e| e.to_string())?;
        service.waiting().await.map_err(|e| e.to_string())?;
        Ok(())
    }
}

struct McpServerHandler {
    handler: Arc<RequestHandler>,
}

impl ServerHandler for McpServerHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "counsel".into(),
                version: counsel_tools::SERVER_VERSION.into(),
                ..Default::default()
            },
            instructions: Some(
                "Start with select_mode to pick the right tool for a task, or call a tool \
                 directly. Workflow tools pause between steps; pass the continuation_id back \
                 on every call after the first."
                    .into(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let core = self.handler.core();
        let schemas = core.env.caches.schema();
        let tools: Vec<McpTool> = core
            .catalogue
            .iter()
            .map(|(name, _)| {
                let schema = core
                    .catalogue
                    .schema(name, &schemas)
                    .unwrap_or_else(|| serde_json::json!({"type": "object"}));
                let schema_obj = schema.as_object().cloned().unwrap_or_default();
                McpTool {
                    name: Cow::Owned(name.clone()),
                    title: None,
                    description: Some(Cow::Borrowed(core.catalogue.description(name))),
                    input_schema: Arc::new(schema_obj),
                    output_schema: None,
                    annotations: None,
                    execution: None,
                    icons: None,
                    meta: None,
                }
            })
            .collect();
        debug!(count = tools.len(), "tool list served");
        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let arguments = match request.arguments {
            Some(map) => serde_json::Value::Object(map),
            None => serde_json::Value::Object(serde_json::Map::new()),
        };
        let text = self.handler.handle_call_tool(&request.name, arguments).await;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use counsel_providers::{ProviderRegistry, ProviderSettings};
    use crate::config::ServerConfig;

    fn core() -> Arc<Core> {
        let mut settings = ProviderSettings::default();
        settings.custom_api_url = Some("http://localhost:11434/v1".into());
        let registry = Arc::new(ProviderRegistry::from_settings(&settings).unwrap());
        Arc::new(Core::new(ServerConfig::default(), registry))
    }

    #[test]
    fn server_info_names_counsel() {
        let handler = McpServerHandler {
            handler: Arc::new(RequestHandler::new(core())),
        };
        let info = handler.get_info();
        assert_eq!(info.server_info.name, "counsel");
    }

    #[test]
    fn catalogue_schemas_convert_to_mcp_objects() {
        let core = core();
        let schemas = core.env.caches.schema();
        for (name, _) in core.catalogue.iter() {
            let schema = core.catalogue.schema(name, &schemas).unwrap();
            assert!(schema.as_object().is_some());
        }
    }
}
