//! Process lifecycle and JSON-RPC communication for stdio tool servers.
//!
//! Each tool server runs as a child process speaking newline-delimited
//! JSON-RPC 2.0 on stdin/stdout. This module provides:
//!
//! - [`ToolServerSpec`]: the configured description of one server.
//! - [`StdioToolServer`]: spawns the process, performs the handshake,
//!   discovers the catalog, and dispatches calls. The child is killed when
//!   the value is dropped.
//! - [`JsonRpcComm`]: writes requests and reads correlated responses with
//!   a timeout and a per-line output bound.

use std::collections::HashMap;
use std::fmt;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::protocol::{
    JsonRpcRequest, JsonRpcResponse, METHOD_CALL_TOOL, METHOD_HANDSHAKE, METHOD_LIST_TOOLS,
    ServerMessage, ToolServerError,
};
use super::types::ToolDescriptor;

/// Maximum number of bytes accepted per response line (100 KB).
const MAX_LINE_BYTES: usize = 100 * 1024;

/// Deadline for the handshake after spawning.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-request deadline in seconds.
fn default_request_timeout_secs() -> u64 {
    30
}

/// Configuration for one external tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerSpec {
    /// Server id, used for tool ownership and logging.
    pub id: String,
    /// Executable to launch.
    pub command: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the child process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Per-request deadline in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ToolServerSpec {
    /// Create a spec with the given id and command, no args.
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Append a command argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// A per-server adapter the registry dispatches through.
///
/// The stdio JSON-RPC implementation is [`StdioToolServer`]; tests supply
/// in-memory implementations.
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// The server id tools are attributed to.
    fn id(&self) -> &str;

    /// Request the server's tool catalog.
    ///
    /// Schemas are returned as declared; the registry normalizes them.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolServerError>;

    /// Invoke a tool and return its textual output.
    async fn call(
        &self,
        tool: &str,
        arguments: &serde_json::Value,
    ) -> Result<String, ToolServerError>;
}

/// A tool server reached over a child process's stdin/stdout.
pub struct StdioToolServer {
    spec: ToolServerSpec,
    /// Kept alive for the server's lifetime; killed on drop.
    child: std::sync::Mutex<Option<Child>>,
    comm: tokio::sync::Mutex<JsonRpcComm>,
    next_id: AtomicU64,
    server_version: String,
}

impl StdioToolServer {
    /// Spawn the server process and perform the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ToolServerError::SpawnFailed`] if the process cannot be
    /// launched, and protocol/timeout errors if the handshake does not
    /// complete.
    pub async fn connect(spec: ToolServerSpec) -> Result<Self, ToolServerError> {
        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = command.spawn().map_err(|e| ToolServerError::SpawnFailed {
            server_id: spec.id.clone(),
            message: e.to_string(),
        })?;

        let comm = JsonRpcComm::from_child(&mut child, &spec.id).ok_or_else(|| {
            ToolServerError::Protocol {
                message: format!("tool server '{}' has no piped stdio", spec.id),
            }
        })?;

        let mut server = Self {
            spec,
            child: std::sync::Mutex::new(Some(child)),
            comm: tokio::sync::Mutex::new(comm),
            next_id: AtomicU64::new(1),
            server_version: String::new(),
        };

        server.server_version = server.handshake().await?;
        info!(
            server = %server.spec.id,
            version = %server.server_version,
            "tool server connected"
        );

        Ok(server)
    }

    /// The version string the server reported at handshake.
    pub fn version(&self) -> &str {
        &self.server_version
    }

    async fn handshake(&self) -> Result<String, ToolServerError> {
        let params = serde_json::json!({
            "expected_id": self.spec.id,
            "aria_version": env!("CARGO_PKG_VERSION"),
        });
        let deadline = HANDSHAKE_TIMEOUT.min(Duration::from_secs(self.spec.request_timeout_secs));
        let response = self
            .request(METHOD_HANDSHAKE, Some(params), deadline)
            .await?;

        let reported = response
            .result
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if reported != self.spec.id {
            return Err(ToolServerError::Protocol {
                message: format!(
                    "handshake id mismatch: expected '{}', got '{reported}'",
                    self.spec.id
                ),
            });
        }

        Ok(response
            .result
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_owned())
    }

    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        deadline: Duration,
    ) -> Result<JsonRpcResponse, ToolServerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(method, params, id);
        let mut comm = self.comm.lock().await;
        comm.send_request(&request, deadline).await
    }
}

#[async_trait]
impl ToolServer for StdioToolServer {
    fn id(&self) -> &str {
        &self.spec.id
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolServerError> {
        let deadline = Duration::from_secs(self.spec.request_timeout_secs);
        let response = self.request(METHOD_LIST_TOOLS, None, deadline).await?;

        let tools = response
            .result
            .get("tools")
            .and_then(|t| t.as_array())
            .ok_or_else(|| ToolServerError::Protocol {
                message: "tools.list result missing 'tools' array".to_owned(),
            })?;

        let mut catalog = Vec::with_capacity(tools.len());
        for tool in tools {
            let Some(name) = tool.get("name").and_then(|n| n.as_str()) else {
                warn!(server = %self.spec.id, "skipping catalog entry without a name");
                continue;
            };
            catalog.push(ToolDescriptor {
                name: name.to_owned(),
                description: tool
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default()
                    .to_owned(),
                parameters: tool
                    .get("parameters")
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
                server_id: self.spec.id.clone(),
            });
        }
        Ok(catalog)
    }

    async fn call(
        &self,
        tool: &str,
        arguments: &serde_json::Value,
    ) -> Result<String, ToolServerError> {
        let deadline = Duration::from_secs(self.spec.request_timeout_secs);
        let params = serde_json::json!({
            "name": tool,
            "arguments": arguments,
        });
        let response = self.request(METHOD_CALL_TOOL, Some(params), deadline).await?;

        // Servers return {"content": "..."}; tolerate structured results by
        // serializing them back to text.
        match response.result.get("content").and_then(|c| c.as_str()) {
            Some(content) => Ok(content.to_owned()),
            None => Ok(response.result.to_string()),
        }
    }
}

impl Drop for StdioToolServer {
    fn drop(&mut self) {
        let child = self.child.lock().map(|mut guard| guard.take());
        if let Ok(Some(mut child)) = child {
            // Drop cannot await; start_kill sends SIGKILL without waiting
            // and the OS reaps the zombie.
            let _ = child.start_kill();
            debug!(server = %self.spec.id, "killed tool server process on drop");
        }
    }
}

impl fmt::Debug for StdioToolServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdioToolServer")
            .field("id", &self.spec.id)
            .field("command", &self.spec.command)
            .field("version", &self.server_version)
            .finish()
    }
}

// ── JSON-RPC 2.0 communication layer ─────────────────────────────────────────

/// JSON-RPC 2.0 communication layer over a child process's stdin/stdout.
///
/// Provides [`send_request`](JsonRpcComm::send_request) which writes a
/// newline-delimited request and reads the correlated response, with:
///
/// - A configurable deadline ([`ToolServerError::Timeout`] on expiry).
/// - A 100 KB per-line output bound ([`ToolServerError::OutputTruncated`]).
/// - Broken-pipe detection on write ([`ToolServerError::ProcessExited`]).
/// - Notifications received before the response are logged and skipped.
pub struct JsonRpcComm {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    server_id: String,
}

impl fmt::Debug for JsonRpcComm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcComm")
            .field("server_id", &self.server_id)
            .finish()
    }
}

impl JsonRpcComm {
    /// Constructs a [`JsonRpcComm`] by taking stdio from a child process.
    ///
    /// Returns `None` if the child did not have stdin or stdout piped.
    pub fn from_child(child: &mut Child, server_id: &str) -> Option<Self> {
        let stdin = child.stdin.take()?;
        let stdout = child.stdout.take()?;
        Some(Self {
            stdin,
            stdout: BufReader::new(stdout),
            server_id: server_id.to_owned(),
        })
    }

    /// Sends a JSON-RPC 2.0 request and waits for the correlated response.
    ///
    /// # Errors
    ///
    /// - [`ToolServerError::Timeout`] — no response within `deadline`.
    /// - [`ToolServerError::ProcessExited`] — broken pipe or EOF.
    /// - [`ToolServerError::OutputTruncated`] — response line over 100 KB.
    /// - [`ToolServerError::Rpc`] — the server answered with an error.
    /// - [`ToolServerError::Protocol`] — the response id did not match.
    pub async fn send_request(
        &mut self,
        request: &JsonRpcRequest,
        deadline: Duration,
    ) -> Result<JsonRpcResponse, ToolServerError> {
        let line = request.to_line()?;

        debug!(
            server = %self.server_id,
            method = %request.method,
            id = request.id,
            "sending JSON-RPC request"
        );

        self.write_line(&line).await?;

        timeout(deadline, self.read_response(request.id))
            .await
            .map_err(|_| ToolServerError::Timeout {
                timeout_secs: deadline.as_secs(),
            })?
    }

    async fn write_line(&mut self, line: &str) -> Result<(), ToolServerError> {
        let write = async {
            self.stdin.write_all(line.as_bytes()).await?;
            self.stdin.flush().await
        };
        write.await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                ToolServerError::ProcessExited {
                    server_id: self.server_id.clone(),
                }
            } else {
                ToolServerError::Io(e)
            }
        })
    }

    async fn read_response(&mut self, request_id: u64) -> Result<JsonRpcResponse, ToolServerError> {
        loop {
            let mut line = String::new();
            let read = self.stdout.read_line(&mut line).await?;
            if read == 0 {
                return Err(ToolServerError::ProcessExited {
                    server_id: self.server_id.clone(),
                });
            }
            if line.len() > MAX_LINE_BYTES {
                return Err(ToolServerError::OutputTruncated {
                    max_bytes: MAX_LINE_BYTES,
                });
            }
            if line.trim().is_empty() {
                continue;
            }

            match ServerMessage::parse(&line)? {
                ServerMessage::Response(response) => {
                    if response.id != request_id {
                        return Err(ToolServerError::Protocol {
                            message: format!(
                                "response id {} does not match request id {request_id}",
                                response.id
                            ),
                        });
                    }
                    return Ok(response);
                }
                ServerMessage::Error(error) => {
                    if error.id != request_id {
                        return Err(ToolServerError::Protocol {
                            message: format!(
                                "error response id {} does not match request id {request_id}",
                                error.id
                            ),
                        });
                    }
                    return Err(ToolServerError::Rpc {
                        code: error.error.code,
                        message: error.error.message,
                    });
                }
                ServerMessage::Notification(note) => {
                    debug!(
                        server = %self.server_id,
                        method = %note.method,
                        "tool server notification"
                    );
                }
            }
        }
    }
}
