#![no_main]

use arca_mcp::{
    jsonrpc_error_frame, parse_request_frame, MCP_ERROR_INTERNAL, MCP_ERROR_INVALID_PARAMS,
    MCP_ERROR_INVALID_REQUEST, MCP_ERROR_METHOD_NOT_FOUND,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
        return;
    };

    match parse_request_frame(&value) {
        Ok(frame) => {
            assert!(!frame.method.trim().is_empty());
            assert_eq!(frame.is_notification(), frame.id.is_none());
            if let Some(id) = &frame.id {
                assert!(id.is_string() || id.is_number());
            }
        }
        Err(error) => {
            assert!(matches!(
                error.code,
                MCP_ERROR_INVALID_REQUEST
                    | MCP_ERROR_METHOD_NOT_FOUND
                    | MCP_ERROR_INVALID_PARAMS
                    | MCP_ERROR_INTERNAL
            ));
            assert!(!error.message.is_empty());
            let id = error.id.unwrap_or(serde_json::Value::Null);
            let reply = jsonrpc_error_frame(&id, error.code, &error.message);
            assert_eq!(reply["jsonrpc"], "2.0");
            assert_eq!(reply["error"]["code"], error.code);
        }
    }
});
