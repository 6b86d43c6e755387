use std::io;

use thiserror::Error;

/// Default per-request bound applied when a caller does not pick its own.
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Error)]
/// Enumerates supported `RpcError` values.
pub enum RpcError {
    #[error("failed to spawn MCP subprocess: {0}")]
    Spawn(io::Error),
    #[error("failed to send request to MCP subprocess: {0}")]
    Send(io::Error),
    #[error("request {id} timed out after {timeout_ms}ms")]
    Timeout { id: u64, timeout_ms: u64 },
    #[error("MCP server error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("undecodable MCP response: {0}")]
    Decode(String),
    #[error("MCP subprocess unavailable")]
    Unavailable,
    #[error("request id {0} is already registered")]
    DuplicateId(u64),
}

#[derive(Debug, Clone)]
/// Public struct `RpcBridgeConfig` used across Arca components.
pub struct RpcBridgeConfig {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub request_timeout_ms: u64,
}

impl RpcBridgeConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            request_timeout_ms: DEFAULT_RPC_TIMEOUT_MS,
        }
    }
}
