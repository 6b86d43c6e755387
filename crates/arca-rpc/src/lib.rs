//! Request/response correlation over an MCP subprocess.
//!
//! `McpBridge` owns the child process and two background readers: one that
//! resolves newline-delimited JSON-RPC replies against the correlation table
//! and one that relays the child's stderr into tracing. Callers issue calls
//! concurrently; each receives exactly one outcome, a timeout, or the
//! unavailable error once the subprocess is gone.
mod bridge;
mod correlation;
mod subprocess;
mod types;

pub use bridge::{interpret_response, McpBridge};
pub use correlation::CorrelationTable;
pub use subprocess::{spawn_subprocess, SubprocessHandle};
pub use types::{RpcBridgeConfig, RpcError, DEFAULT_RPC_TIMEOUT_MS};
