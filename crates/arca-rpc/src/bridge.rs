use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tracing::warn;

use arca_mcp::{jsonrpc_call_frame, MCP_PROTOCOL_VERSION};

use crate::correlation::CorrelationTable;
use crate::subprocess::{spawn_subprocess, SubprocessHandle};
use crate::types::{RpcBridgeConfig, RpcError};

const INITIALIZE_TIMEOUT_MS: u64 = 10_000;

/// Multiplexes JSON-RPC calls over one MCP subprocess.
///
/// A single writer serializes request lines onto the child's stdin while a
/// background reader resolves replies against the correlation table, so any
/// number of tasks can call concurrently and replies may arrive in any order.
pub struct McpBridge {
    next_id: AtomicU64,
    table: Arc<CorrelationTable>,
    writer: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
    subprocess_gone: Arc<AtomicBool>,
    request_timeout_ms: u64,
    pid: Option<u32>,
}

impl McpBridge {
    /// Spawns the configured subprocess, wires up the reader tasks, and
    /// performs the `initialize` handshake. The subprocess is terminated
    /// again if the handshake fails, so a successful return means the bridge
    /// is ready for callers.
    pub async fn start(config: RpcBridgeConfig) -> Result<Self, RpcError> {
        let SubprocessHandle {
            child,
            stdin,
            stdout,
            stderr,
        } = spawn_subprocess(&config)?;
        let pid = child.id();

        let table = Arc::new(CorrelationTable::new());
        let subprocess_gone = Arc::new(AtomicBool::new(false));
        tokio::spawn(read_responses(
            stdout,
            table.clone(),
            subprocess_gone.clone(),
        ));
        tokio::spawn(read_diagnostics(stderr));

        let bridge = Self {
            next_id: AtomicU64::new(1),
            table,
            writer: Mutex::new(Some(stdin)),
            child: Mutex::new(Some(child)),
            subprocess_gone,
            request_timeout_ms: config.request_timeout_ms.max(1),
            pid,
        };

        let params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "arca-bridge",
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        if let Err(error) = bridge
            .call_with_timeout("initialize", params, INITIALIZE_TIMEOUT_MS)
            .await
        {
            bridge.shutdown().await;
            return Err(error);
        }

        Ok(bridge)
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.call_with_timeout(method, params, self.request_timeout_ms)
            .await
    }

    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout_ms: u64,
    ) -> Result<Value, RpcError> {
        if self.subprocess_gone.load(Ordering::SeqCst) {
            return Err(RpcError::Unavailable);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        // Registration precedes the write so a reply that arrives immediately
        // always finds its slot.
        let receiver = self.table.register(id)?;
        if let Err(error) = self.send_frame(&jsonrpc_call_frame(id, method, params)).await {
            self.table.cancel(id);
            return Err(error);
        }

        match tokio::time::timeout(Duration::from_millis(timeout_ms.max(1)), receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(RpcError::Unavailable),
            Err(_) => {
                self.table.cancel(id);
                Err(RpcError::Timeout { id, timeout_ms })
            }
        }
    }

    /// Identifiers with a registered slot that have not been resolved yet.
    pub fn pending_requests(&self) -> usize {
        self.table.pending_count()
    }

    pub fn is_available(&self) -> bool {
        !self.subprocess_gone.load(Ordering::SeqCst)
    }

    pub fn subprocess_pid(&self) -> Option<u32> {
        self.pid
    }

    /// Closes stdin first so a cooperative server exits on EOF, then kills
    /// and reaps the child. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.subprocess_gone.store(true, Ordering::SeqCst);
        let stdin = self.writer.lock().await.take();
        drop(stdin);
        if let Some(mut child) = self.child.lock().await.take() {
            let _ = child.kill().await;
            let _ = child.wait().await;
        }
    }

    async fn send_frame(&self, frame: &Value) -> Result<(), RpcError> {
        let mut encoded = serde_json::to_vec(frame).map_err(|error| {
            RpcError::Send(std::io::Error::new(std::io::ErrorKind::InvalidData, error))
        })?;
        encoded.push(b'\n');

        let mut writer = self.writer.lock().await;
        let Some(stdin) = writer.as_mut() else {
            return Err(RpcError::Unavailable);
        };
        stdin.write_all(&encoded).await.map_err(RpcError::Send)?;
        stdin.flush().await.map_err(RpcError::Send)
    }
}

/// Classifies one reply frame. An `error` object takes precedence over any
/// `result`; an error object without both an integer `code` and a string
/// `message`, or a frame carrying neither member, is a decode failure rather
/// than a remote one.
pub fn interpret_response(frame: &Value) -> Result<Value, RpcError> {
    if let Some(error_object) = frame.get("error") {
        if !error_object.is_null() {
            let code = error_object.get("code").and_then(Value::as_i64);
            let message = error_object.get("message").and_then(Value::as_str);
            return match (code, message) {
                (Some(code), Some(message)) => Err(RpcError::Remote {
                    code,
                    message: message.to_string(),
                }),
                _ => Err(RpcError::Decode(format!(
                    "malformed error object in response: {error_object}"
                ))),
            };
        }
    }
    match frame.get("result") {
        Some(result) => Ok(result.clone()),
        None => Err(RpcError::Decode(
            "response carries neither result nor error".to_string(),
        )),
    }
}

async fn read_responses(
    stdout: ChildStdout,
    table: Arc<CorrelationTable>,
    subprocess_gone: Arc<AtomicBool>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => deliver_response_line(&table, &line),
            Ok(None) => break,
            Err(error) => {
                warn!("failed to read MCP response line: {error}");
                break;
            }
        }
    }

    // EOF sweep: nothing will answer the remaining slots, so fail them all
    // and refuse new registrations through the flag.
    subprocess_gone.store(true, Ordering::SeqCst);
    let drained = table.drain();
    if !drained.is_empty() {
        warn!(
            "MCP subprocess exited with {} request(s) pending",
            drained.len()
        );
    }
    for (_, slot) in drained {
        let _ = slot.send(Err(RpcError::Unavailable));
    }
}

fn deliver_response_line(table: &CorrelationTable, line: &str) {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return;
    }
    let frame: Value = match serde_json::from_str(trimmed) {
        Ok(frame) => frame,
        Err(error) => {
            warn!("skipping undecodable MCP response line: {error}");
            return;
        }
    };
    let Some(id) = frame.get("id").and_then(Value::as_u64) else {
        warn!("dropping MCP frame without a numeric id");
        return;
    };
    if !table.resolve(id, interpret_response(&frame)) {
        warn!("dropping MCP response for unknown request id {id}");
    }
}

async fn read_diagnostics(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        warn!("mcp-server stderr: {line}");
    }
}
