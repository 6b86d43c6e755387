use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Request, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tracing::warn;

use arca_rpc::{McpBridge, RpcError};

use crate::ws;

pub const MCP_REQUEST_ENDPOINT: &str = "/api/v1/mcp/request";
pub const TOOLS_LIST_ENDPOINT: &str = "/api/v1/mcp/tools/list";
pub const TOOLS_CALL_ENDPOINT: &str = "/api/v1/mcp/tools/call";
pub const UPLOAD_ENDPOINT: &str = "/api/v1/upload";
pub const HEALTH_ENDPOINT: &str = "/health";
pub const WS_ENDPOINT: &str = "/ws";

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Public struct `BridgeServerState` used across Arca components.
pub struct BridgeServerState {
    pub bridge: McpBridge,
}

pub fn build_bridge_router(state: Arc<BridgeServerState>) -> Router {
    Router::new()
        .route(MCP_REQUEST_ENDPOINT, post(handle_mcp_request))
        .route(TOOLS_LIST_ENDPOINT, get(handle_tools_list))
        .route(TOOLS_CALL_ENDPOINT, post(handle_tools_call))
        .route(UPLOAD_ENDPOINT, post(handle_upload))
        .route(HEALTH_ENDPOINT, get(handle_health))
        .route(WS_ENDPOINT, get(ws::handle_ws_upgrade))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(apply_cors))
        .with_state(state)
}

/// Binds the bridge server and serves it until ctrl-c, then terminates the
/// MCP subprocess behind the shared state.
pub async fn run_bridge_server(
    bind_address: &str,
    state: Arc<BridgeServerState>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("failed to bind bridge server to {bind_address}"))?;
    let local_address = listener
        .local_addr()
        .context("failed to read bridge server local address")?;
    println!("arca-bridge listening on http://{local_address}");

    let router = build_bridge_router(state.clone());
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("bridge server terminated unexpectedly")?;

    state.bridge.shutdown().await;
    Ok(())
}

async fn apply_cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

async fn handle_mcp_request(
    State(state): State<Arc<BridgeServerState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {rejection}"),
            )
        }
    };
    let Some(method) = body
        .get("method")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|method| !method.is_empty())
    else {
        return error_response(StatusCode::BAD_REQUEST, "method must be a non-empty string");
    };
    let params = match body.get("params") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(params)) => params.clone(),
        Some(_) => return error_response(StatusCode::BAD_REQUEST, "params must be a JSON object"),
    };

    bridge_outcome_response(state.bridge.call(method, Value::Object(params)).await)
}

async fn handle_tools_list(State(state): State<Arc<BridgeServerState>>) -> Response {
    bridge_outcome_response(state.bridge.call("tools/list", json!({})).await)
}

async fn handle_tools_call(
    State(state): State<Arc<BridgeServerState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {rejection}"),
            )
        }
    };
    let Some(name) = body
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
    else {
        return error_response(StatusCode::BAD_REQUEST, "name must be a non-empty string");
    };
    let arguments = match body.get("arguments") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(arguments @ Value::Object(_)) => arguments.clone(),
        Some(_) => {
            return error_response(StatusCode::BAD_REQUEST, "arguments must be a JSON object")
        }
    };

    bridge_outcome_response(call_tool(&state.bridge, name, &arguments).await)
}

async fn handle_upload(
    State(state): State<Arc<BridgeServerState>>,
    mut multipart: Multipart,
) -> Response {
    let mut directory_id: Option<String> = None;
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    &format!("invalid multipart request: {error}"),
                )
            }
        };
        let field_name = field.name().map(str::to_string);
        let client_file_name = field.file_name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let bytes = match field.bytes().await {
                    Ok(bytes) => bytes.to_vec(),
                    Err(error) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            &format!("failed to read uploaded file: {error}"),
                        )
                    }
                };
                upload = Some((client_file_name.unwrap_or_default(), bytes));
            }
            Some("directory_id") => {
                directory_id = match field.text().await {
                    Ok(text) => {
                        let trimmed = text.trim();
                        (!trimmed.is_empty()).then(|| trimmed.to_string())
                    }
                    Err(error) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            &format!("failed to read directory_id field: {error}"),
                        )
                    }
                };
            }
            _ => {}
        }
    }

    let Some((client_file_name, bytes)) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "multipart field 'file' is required");
    };

    // Spool the payload to disk under its client-supplied name so the
    // subprocess, which shares this host, can read it by path.
    let spool_dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(error) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("failed to spool upload: {error}"),
            )
        }
    };
    let spool_path = spool_dir.path().join(spool_file_name(&client_file_name));
    if let Err(error) = tokio::fs::write(&spool_path, &bytes).await {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("failed to spool upload: {error}"),
        );
    }

    let mut arguments = json!({ "filePath": spool_path.to_string_lossy() });
    if let Some(directory_id) = &directory_id {
        arguments["directoryId"] = json!(directory_id);
    }
    let outcome = call_tool(&state.bridge, "upload_file", &arguments).await;
    drop(spool_dir);

    match outcome {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "result": result,
                "filename": client_file_name,
                "size": bytes.len(),
            })),
        )
            .into_response(),
        Err(error) => rpc_error_response(&error),
    }
}

async fn handle_health(State(state): State<Arc<BridgeServerState>>) -> Response {
    let body = health_body(state.bridge.pending_requests());
    (StatusCode::OK, Json(body)).into_response()
}

fn health_body(pending_requests: usize) -> Value {
    json!({ "status": "healthy", "pending_requests": pending_requests })
}

/// Tool arguments cross the subprocess boundary as a JSON-encoded string,
/// which is the shape the server decodes.
pub(crate) async fn call_tool(
    bridge: &McpBridge,
    name: &str,
    arguments: &Value,
) -> Result<Value, RpcError> {
    let encoded = serde_json::to_string(arguments).map_err(|error| {
        RpcError::Send(std::io::Error::new(std::io::ErrorKind::InvalidData, error))
    })?;
    bridge
        .call("tools/call", json!({ "name": name, "arguments": encoded }))
        .await
}

pub(crate) fn bridge_outcome_response(outcome: Result<Value, RpcError>) -> Response {
    match outcome {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({ "success": true, "result": result })),
        )
            .into_response(),
        Err(error) => rpc_error_response(&error),
    }
}

fn rpc_error_response(error: &RpcError) -> Response {
    warn!("bridge request failed: {error}");
    let status = match error {
        RpcError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        RpcError::Unavailable | RpcError::Send(_) | RpcError::Spawn(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        RpcError::Remote { .. } | RpcError::Decode(_) | RpcError::DuplicateId(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, &error.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

fn spool_file_name(client_name: &str) -> String {
    let base = Path::new(client_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if base.is_empty() {
        "upload.bin".to_string()
    } else {
        base
    }
}
