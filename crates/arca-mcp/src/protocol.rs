use serde_json::{json, Map, Value};

pub const MCP_JSONRPC_VERSION: &str = "2.0";
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const MCP_ERROR_INVALID_REQUEST: i64 = -32600;
pub const MCP_ERROR_METHOD_NOT_FOUND: i64 = -32601;
pub const MCP_ERROR_INVALID_PARAMS: i64 = -32602;
pub const MCP_ERROR_INTERNAL: i64 = -32603;

#[derive(Debug, Clone)]
/// Public struct `McpRequestFrame` used across Arca components.
///
/// `id` is `None` for notifications (absent or JSON-null identifier); any
/// other identifier is echoed back verbatim, so it stays a raw value.
pub struct McpRequestFrame {
    pub id: Option<Value>,
    pub method: String,
    pub params: Map<String, Value>,
}

impl McpRequestFrame {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

#[derive(Debug, Clone)]
/// Public struct `McpFrameError` used across Arca components.
///
/// `id` carries the request identifier when the malformed frame still had a
/// usable one; without it no error reply can be correlated, so none is sent.
pub struct McpFrameError {
    pub id: Option<Value>,
    pub code: i64,
    pub message: String,
}

impl McpFrameError {
    fn new(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            code,
            message: message.into(),
        }
    }
}

pub fn jsonrpc_call_frame(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": MCP_JSONRPC_VERSION,
        "id": id,
        "method": method,
        "params": params,
    })
}

pub fn jsonrpc_notification_frame(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": MCP_JSONRPC_VERSION,
        "method": method,
        "params": params,
    })
}

pub fn jsonrpc_result_frame(id: &Value, result: Value) -> Value {
    json!({
        "jsonrpc": MCP_JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

pub fn jsonrpc_error_frame(id: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": MCP_JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": code,
            "message": message,
        },
    })
}

/// Validates a decoded request value into a frame. Requests whose identifier
/// is present but unusable (not a string or number) are rejected without an
/// identifier because no reply could be correlated to them.
pub fn parse_request_frame(value: &Value) -> Result<McpRequestFrame, McpFrameError> {
    let Some(object) = value.as_object() else {
        return Err(McpFrameError::new(
            None,
            MCP_ERROR_INVALID_REQUEST,
            "jsonrpc request must be an object",
        ));
    };

    let id = match object.get("id") {
        None | Some(Value::Null) => None,
        Some(id @ (Value::String(_) | Value::Number(_))) => Some(id.clone()),
        Some(_) => {
            return Err(McpFrameError::new(
                None,
                MCP_ERROR_INVALID_REQUEST,
                "jsonrpc id must be a string or number",
            ));
        }
    };

    let jsonrpc = object
        .get("jsonrpc")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if jsonrpc != MCP_JSONRPC_VERSION {
        return Err(McpFrameError::new(
            id,
            MCP_ERROR_INVALID_REQUEST,
            format!("jsonrpc must be '{MCP_JSONRPC_VERSION}'"),
        ));
    }

    let method = match object
        .get("method")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|method| !method.is_empty())
    {
        Some(method) => method.to_string(),
        None => {
            return Err(McpFrameError::new(
                id,
                MCP_ERROR_INVALID_REQUEST,
                "jsonrpc request must include non-empty method",
            ));
        }
    };

    let params = match object.get("params") {
        Some(Value::Object(params)) => params.clone(),
        Some(_) => {
            return Err(McpFrameError::new(
                id,
                MCP_ERROR_INVALID_PARAMS,
                "jsonrpc request params must be an object",
            ));
        }
        None => Map::new(),
    };

    Ok(McpRequestFrame { id, method, params })
}
