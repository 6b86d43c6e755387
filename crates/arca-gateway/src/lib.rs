//! HTTP and WebSocket front door for the MCP bridge.
//!
//! Exposes the REST endpoints, the multipart upload spool, and the WebSocket
//! request/response adapter, all forwarding to one shared `McpBridge`.
mod http;
mod ws;

pub use http::{
    build_bridge_router, run_bridge_server, BridgeServerState, HEALTH_ENDPOINT,
    MCP_REQUEST_ENDPOINT, TOOLS_CALL_ENDPOINT, TOOLS_LIST_ENDPOINT, UPLOAD_ENDPOINT, WS_ENDPOINT,
};
pub use ws::{
    build_api_error_frame, build_api_response_frame, parse_api_request_frame, ApiRequestFrame,
    WS_HEARTBEAT_INTERVAL_SECONDS,
};
