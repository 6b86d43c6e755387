use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as ClientWsMessage;

use arca_gateway::{
    build_bridge_router, BridgeServerState, HEALTH_ENDPOINT, MCP_REQUEST_ENDPOINT,
    TOOLS_CALL_ENDPOINT, TOOLS_LIST_ENDPOINT, UPLOAD_ENDPOINT, WS_ENDPOINT,
};
use arca_rpc::{McpBridge, RpcBridgeConfig};

const SCRIPTED_SERVER: &str = r#"#!/bin/sh
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  [ -z "$id" ] && continue
  method=$(printf '%s\n' "$line" | sed -n 's/.*"method":"\([^"]*\)".*/\1/p')
  case "$method" in
    initialize)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"scripted","version":"0"}}}\n' "$id"
      ;;
    tools/list)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"upload_file"},{"name":"download_file"}]}}\n' "$id"
      ;;
    tools/call)
      name=$(printf '%s\n' "$line" | sed -n 's/.*"name":"\([^"]*\)".*/\1/p')
      if [ "$name" = "boom" ]; then
        printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32602,"message":"unknown tool: boom"}}\n' "$id"
      else
        printf '{"jsonrpc":"2.0","id":%s,"result":{"tool":"%s"}}\n' "$id" "$name"
      fi
      ;;
    *)
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32601,"message":"unknown method: %s"}}\n' "$id" "$method"
      ;;
  esac
done
"#;

const EXIT_AFTER_HANDSHAKE_SERVER: &str = r#"#!/bin/sh
IFS= read -r line
printf '{"jsonrpc":"2.0","id":1,"result":{}}\n'
IFS= read -r line
exit 0
"#;

fn write_script(dir: &Path, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("mcp-server.sh");
    std::fs::write(&path, body).expect("write script");
    let mut permissions = std::fs::metadata(&path).expect("script metadata").permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).expect("set script permissions");
    path.to_string_lossy().into_owned()
}

async fn spawn_gateway(script_body: &str) -> (TempDir, SocketAddr, Arc<BridgeServerState>) {
    let temp = tempdir().expect("tempdir");
    let program = write_script(temp.path(), script_body);
    let bridge = McpBridge::start(RpcBridgeConfig::new(program))
        .await
        .expect("bridge start");
    let state = Arc::new(BridgeServerState { bridge });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral listener");
    let addr = listener.local_addr().expect("listener addr");
    let router = build_bridge_router(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    (temp, addr, state)
}

async fn recv_ws_json(
    socket: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> Value {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let Some(message) = socket.next().await else {
                panic!("websocket closed before response frame");
            };
            let message = message.expect("read websocket frame");
            match message {
                ClientWsMessage::Text(text) => {
                    return serde_json::from_str::<Value>(text.as_str())
                        .expect("websocket text frame should contain json");
                }
                ClientWsMessage::Ping(payload) => {
                    socket
                        .send(ClientWsMessage::Pong(payload))
                        .await
                        .expect("send pong");
                }
                ClientWsMessage::Pong(_) => continue,
                ClientWsMessage::Binary(_) => continue,
                ClientWsMessage::Close(_) => panic!("websocket closed before json frame"),
                ClientWsMessage::Frame(_) => continue,
            }
        }
    })
    .await
    .expect("websocket response before timeout")
}

#[tokio::test]
async fn integration_health_endpoint_reports_healthy_with_cors() {
    let (_temp, addr, state) = spawn_gateway(SCRIPTED_SERVER).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}{HEALTH_ENDPOINT}"))
        .send()
        .await
        .expect("health request");
    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("Access-Control-Allow-Origin")
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
    let body = response.json::<Value>().await.expect("health body");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["pending_requests"], 0);

    let preflight = client
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{addr}{MCP_REQUEST_ENDPOINT}"),
        )
        .send()
        .await
        .expect("preflight request");
    assert_eq!(preflight.status(), 200);
    assert_eq!(
        preflight
            .headers()
            .get("Access-Control-Allow-Methods")
            .and_then(|value| value.to_str().ok()),
        Some("GET, POST, PUT, DELETE, OPTIONS")
    );

    state.bridge.shutdown().await;
}

#[tokio::test]
async fn integration_mcp_request_forwards_to_the_subprocess() {
    let (_temp, addr, state) = spawn_gateway(SCRIPTED_SERVER).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}{MCP_REQUEST_ENDPOINT}"))
        .json(&json!({ "method": "tools/list" }))
        .send()
        .await
        .expect("mcp request");
    assert_eq!(response.status(), 200);
    let body = response.json::<Value>().await.expect("body");
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["tools"].as_array().map(Vec::len), Some(2));

    let rejected = client
        .post(format!("http://{addr}{MCP_REQUEST_ENDPOINT}"))
        .json(&json!({ "method": "nope" }))
        .send()
        .await
        .expect("unknown method request");
    assert_eq!(rejected.status(), 500);
    let body = rejected.json::<Value>().await.expect("error body");
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "MCP server error -32601: unknown method: nope");

    let bad_body = client
        .post(format!("http://{addr}{MCP_REQUEST_ENDPOINT}"))
        .json(&json!({ "params": {} }))
        .send()
        .await
        .expect("bad body request");
    assert_eq!(bad_body.status(), 400);

    state.bridge.shutdown().await;
}

#[tokio::test]
async fn integration_tools_endpoints_roundtrip() {
    let (_temp, addr, state) = spawn_gateway(SCRIPTED_SERVER).await;
    let client = reqwest::Client::new();

    let listed = client
        .get(format!("http://{addr}{TOOLS_LIST_ENDPOINT}"))
        .send()
        .await
        .expect("tools list");
    assert_eq!(listed.status(), 200);
    let body = listed.json::<Value>().await.expect("list body");
    assert_eq!(body["result"]["tools"][0]["name"], "upload_file");

    let called = client
        .post(format!("http://{addr}{TOOLS_CALL_ENDPOINT}"))
        .json(&json!({ "name": "download_file", "arguments": { "fileId": "f-1" } }))
        .send()
        .await
        .expect("tools call");
    assert_eq!(called.status(), 200);
    let body = called.json::<Value>().await.expect("call body");
    assert_eq!(body["result"]["tool"], "download_file");

    let failed = client
        .post(format!("http://{addr}{TOOLS_CALL_ENDPOINT}"))
        .json(&json!({ "name": "boom" }))
        .send()
        .await
        .expect("failing tools call");
    assert_eq!(failed.status(), 500);
    let body = failed.json::<Value>().await.expect("failure body");
    assert_eq!(body["error"], "MCP server error -32602: unknown tool: boom");

    let nameless = client
        .post(format!("http://{addr}{TOOLS_CALL_ENDPOINT}"))
        .json(&json!({ "arguments": {} }))
        .send()
        .await
        .expect("nameless tools call");
    assert_eq!(nameless.status(), 400);

    state.bridge.shutdown().await;
}

#[tokio::test]
async fn integration_upload_spools_the_file_for_the_subprocess() {
    let (_temp, addr, state) = spawn_gateway(SCRIPTED_SERVER).await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new()
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"file body".to_vec()).file_name("report.txt"),
        )
        .text("directory_id", "dir-9");
    let response = client
        .post(format!("http://{addr}{UPLOAD_ENDPOINT}"))
        .multipart(form)
        .send()
        .await
        .expect("upload request");
    assert_eq!(response.status(), 200);
    let body = response.json::<Value>().await.expect("upload body");
    assert_eq!(body["success"], true);
    assert_eq!(body["result"]["tool"], "upload_file");
    assert_eq!(body["filename"], "report.txt");
    assert_eq!(body["size"], 9);

    let empty = client
        .post(format!("http://{addr}{UPLOAD_ENDPOINT}"))
        .multipart(reqwest::multipart::Form::new().text("directory_id", "dir-9"))
        .send()
        .await
        .expect("upload without file");
    assert_eq!(empty.status(), 400);

    state.bridge.shutdown().await;
}

#[tokio::test]
async fn integration_ws_requests_get_success_and_error_frames() {
    let (_temp, addr, state) = spawn_gateway(SCRIPTED_SERVER).await;

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{WS_ENDPOINT}"))
        .await
        .expect("connect websocket");

    socket
        .send(ClientWsMessage::Text(
            json!({ "method": "tools/list" }).to_string().into(),
        ))
        .await
        .expect("send list frame");
    let listed = recv_ws_json(&mut socket).await;
    assert_eq!(listed["success"], true);
    assert_eq!(listed["result"]["tools"].as_array().map(Vec::len), Some(2));

    socket
        .send(ClientWsMessage::Text("not json".into()))
        .await
        .expect("send garbage frame");
    let rejected = recv_ws_json(&mut socket).await;
    assert_eq!(rejected["success"], false);
    assert!(rejected["error"]
        .as_str()
        .expect("error text")
        .contains("failed to parse websocket request JSON"));

    socket
        .send(ClientWsMessage::Text(
            json!({ "method": "nope" }).to_string().into(),
        ))
        .await
        .expect("send unknown method frame");
    let failed = recv_ws_json(&mut socket).await;
    assert_eq!(failed["success"], false);
    assert_eq!(failed["error"], "MCP server error -32601: unknown method: nope");

    socket
        .send(ClientWsMessage::Close(None))
        .await
        .expect("close websocket");

    state.bridge.shutdown().await;
}

#[tokio::test]
async fn integration_subprocess_death_maps_to_service_unavailable() {
    let (_temp, addr, state) = spawn_gateway(EXIT_AFTER_HANDSHAKE_SERVER).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}{MCP_REQUEST_ENDPOINT}"))
        .json(&json!({ "method": "tools/list" }))
        .send()
        .await
        .expect("request against dead subprocess");
    assert_eq!(response.status(), 503);
    let body = response.json::<Value>().await.expect("body");
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "MCP subprocess unavailable");

    state.bridge.shutdown().await;
}
