//! Tool registry over externally-hosted tool servers.
//!
//! The [`ToolRegistry`] connects to N tool servers, discovers their
//! catalogs, and exposes one flat namespace for dispatch. Tool names are
//! namespaced implicitly by first-registered-wins; a single server's
//! connection failure never aborts registry initialization.
//!
//! # Submodules
//!
//! - [`types`] — descriptors, call requests/results, output bounds
//! - [`schema`] — parameter schema normalization for the model backend
//! - [`protocol`] — newline-delimited JSON-RPC 2.0 wire types
//! - [`stdio`] — child-process server adapter

pub mod protocol;
pub mod schema;
pub mod stdio;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::agent::error::AgentError;
use protocol::ToolServerError;
use schema::normalize_schema;

pub use stdio::{StdioToolServer, ToolServer, ToolServerSpec};
pub use types::{ToolCallRequest, ToolCallResult, ToolDescriptor, ToolResult};

/// Registry of tools discovered from connected tool servers.
///
/// Owns the flat tool namespace: each tool name maps to exactly one owning
/// server. Duplicate declarations keep the first registration and log the
/// conflict — partial availability beats total failure.
#[derive(Default)]
pub struct ToolRegistry {
    servers: HashMap<String, Arc<dyn ToolServer>>,
    tool_to_server: HashMap<String, String>,
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect every configured stdio server, tolerating failures.
    ///
    /// Servers are attempted in configuration order (which fixes duplicate
    /// tool-name precedence). A server that fails to spawn or handshake is
    /// logged and skipped; the returned count is the number of servers that
    /// connected.
    pub async fn connect_all(&mut self, specs: &[ToolServerSpec]) -> usize {
        let mut connected = 0;
        for spec in specs {
            match StdioToolServer::connect(spec.clone()).await {
                Ok(server) => match self.register(Arc::new(server)).await {
                    Ok(count) => {
                        connected += 1;
                        info!(server = %spec.id, tools = count, "registered tool server");
                    }
                    Err(e) => {
                        warn!(server = %spec.id, error = %e, "tool discovery failed, skipping server");
                    }
                },
                Err(e) => {
                    warn!(server = %spec.id, error = %e, "tool server connection failed, skipping");
                }
            }
        }
        connected
    }

    /// Register a connected server and discover its tools.
    ///
    /// Parameter schemas are normalized before entering the catalog.
    /// Returns the number of tools registered from this server.
    ///
    /// # Errors
    ///
    /// Returns the discovery error if the catalog request fails; the
    /// server is not registered in that case.
    pub async fn register(&mut self, server: Arc<dyn ToolServer>) -> Result<usize, ToolServerError> {
        let server_id = server.id().to_owned();
        let discovered = server.list_tools().await?;

        let mut registered = 0;
        for mut tool in discovered {
            if let Some(owner) = self.tool_to_server.get(&tool.name) {
                warn!(
                    tool = %tool.name,
                    owner = %owner,
                    duplicate = %server_id,
                    "duplicate tool name, keeping first registration"
                );
                continue;
            }
            tool.parameters = normalize_schema(&tool.parameters);
            tool.server_id = server_id.clone();
            self.tool_to_server
                .insert(tool.name.clone(), server_id.clone());
            self.tools.push(tool);
            registered += 1;
        }

        self.servers.insert(server_id, server);
        Ok(registered)
    }

    /// Drop a server and every tool it owns.
    ///
    /// Returns `true` if the server was registered.
    pub fn disconnect(&mut self, server_id: &str) -> bool {
        if self.servers.remove(server_id).is_none() {
            return false;
        }
        self.tools.retain(|t| t.server_id != server_id);
        self.tool_to_server.retain(|_, owner| owner != server_id);
        info!(server = %server_id, "tool server disconnected");
        true
    }

    /// The full normalized catalog, in registration order.
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Names of all registered tools, sorted.
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Check if a tool exists in the registry.
    pub fn contains(&self, name: &str) -> bool {
        self.tool_to_server.contains_key(name)
    }

    /// Number of connected servers.
    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Invoke a tool by name against its owning server.
    ///
    /// An unknown tool name is a normal runtime condition (the model
    /// hallucinating), not a programming error.
    ///
    /// # Errors
    ///
    /// - [`AgentError::ToolUnavailable`] — no server declares this tool.
    /// - [`AgentError::ToolTimeout`] — the server missed its deadline.
    /// - [`AgentError::ToolExecution`] — the call ran and failed.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<String, AgentError> {
        let server_id = self.tool_to_server.get(name).ok_or_else(|| {
            AgentError::ToolUnavailable(format!("unknown tool '{name}'"))
        })?;
        let server = self.servers.get(server_id).ok_or_else(|| {
            AgentError::ToolUnavailable(format!(
                "tool '{name}' belongs to disconnected server '{server_id}'"
            ))
        })?;

        server.call(name, arguments).await.map_err(|e| match e {
            ToolServerError::Timeout { timeout_secs } => AgentError::ToolTimeout(format!(
                "tool '{name}': no response from '{server_id}' after {timeout_secs}s"
            )),
            other => AgentError::ToolExecution(format!("tool '{name}': {other}")),
        })
    }
}
