use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::http::BridgeServerState;

pub const WS_HEARTBEAT_INTERVAL_SECONDS: u64 = 15;

#[derive(Debug, Clone, PartialEq)]
/// Public struct `ApiRequestFrame` used across Arca components.
pub struct ApiRequestFrame {
    pub method: String,
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawApiRequestFrame {
    method: String,
    #[serde(default)]
    params: Value,
}

pub fn parse_api_request_frame(raw: &str) -> Result<ApiRequestFrame> {
    let frame = serde_json::from_str::<RawApiRequestFrame>(raw)
        .context("failed to parse websocket request JSON")?;
    let method = frame.method.trim();
    if method.is_empty() {
        bail!("websocket request method must be non-empty");
    }
    let params = match frame.params {
        Value::Null => Map::new(),
        Value::Object(params) => params,
        _ => bail!("websocket request params must be a JSON object"),
    };
    Ok(ApiRequestFrame {
        method: method.to_string(),
        params,
    })
}

pub fn build_api_response_frame(result: Value) -> Value {
    json!({ "success": true, "result": result })
}

pub fn build_api_error_frame(message: &str) -> Value {
    json!({ "success": false, "error": message })
}

pub(crate) async fn handle_ws_upgrade(
    State(state): State<Arc<BridgeServerState>>,
    websocket: WebSocketUpgrade,
) -> Response {
    websocket
        .on_upgrade(move |socket| run_ws_connection(state, socket))
        .into_response()
}

/// One request frame in, one response frame out, in arrival order. A frame
/// that fails to parse gets an error frame back and the connection stays
/// open; only transport errors and close frames end the loop.
async fn run_ws_connection(state: Arc<BridgeServerState>, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let mut heartbeat =
        tokio::time::interval(Duration::from_secs(WS_HEARTBEAT_INTERVAL_SECONDS.max(1)));
    heartbeat.tick().await;

    loop {
        tokio::select! {
            inbound = receiver.next() => {
                let Some(inbound) = inbound else {
                    break;
                };
                let message = match inbound {
                    Ok(message) => message,
                    Err(_) => break,
                };

                match message {
                    WsMessage::Text(text) => {
                        let reply = dispatch_api_text_frame(&state, text.as_str()).await;
                        if sender
                            .send(WsMessage::Text(reply.to_string().into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    WsMessage::Binary(bytes) => {
                        let reply = match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => dispatch_api_text_frame(&state, text.as_str()).await,
                            Err(_) => build_api_error_frame(
                                "websocket binary frame must be UTF-8 encoded JSON text",
                            ),
                        };
                        if sender
                            .send(WsMessage::Text(reply.to_string().into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    WsMessage::Ping(payload) => {
                        if sender.send(WsMessage::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    WsMessage::Pong(_) => {}
                    WsMessage::Close(_) => break,
                }
            }
            _ = heartbeat.tick() => {
                if sender.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn dispatch_api_text_frame(state: &BridgeServerState, text: &str) -> Value {
    let frame = match parse_api_request_frame(text) {
        Ok(frame) => frame,
        Err(error) => {
            warn!("rejecting websocket frame: {error:#}");
            return build_api_error_frame(&format!("{error:#}"));
        }
    };
    match state
        .bridge
        .call(&frame.method, Value::Object(frame.params))
        .await
    {
        Ok(result) => build_api_response_frame(result),
        Err(error) => build_api_error_frame(&error.to_string()),
    }
}
