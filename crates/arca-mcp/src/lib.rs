//! MCP protocol surface for the Arca Storage subprocess.
//!
//! Defines the JSON-RPC frame helpers shared with the bridge side, the static
//! tool catalog, the request dispatcher backed by a `StorageBackend`, and the
//! newline-delimited serve loop the `arca-mcp-server` binary runs over stdio.
mod catalog;
mod dispatcher;
mod protocol;
mod serve;

pub use catalog::{
    storage_tool_catalog, STORAGE_TOOL_NAMES, TOOL_BACKUP_FILE, TOOL_CREATE_DIRECTORY,
    TOOL_DOWNLOAD_FILE, TOOL_LIST_DIRECTORIES, TOOL_SEARCH_FILES, TOOL_UPLOAD_FILE,
};
pub use dispatcher::{McpDispatchError, McpDispatcher};
pub use protocol::{
    jsonrpc_call_frame, jsonrpc_error_frame, jsonrpc_notification_frame, jsonrpc_result_frame,
    parse_request_frame, McpFrameError, McpRequestFrame, MCP_ERROR_INTERNAL,
    MCP_ERROR_INVALID_PARAMS, MCP_ERROR_INVALID_REQUEST, MCP_ERROR_METHOD_NOT_FOUND,
    MCP_JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
pub use serve::{serve_ndjson, McpServeReport};
