#![no_main]

use arca_rpc::{interpret_response, RpcError};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Ok(frame) = serde_json::from_str::<serde_json::Value>(&raw) else {
        return;
    };

    match interpret_response(&frame) {
        Ok(_) | Err(RpcError::Remote { .. }) => {}
        Err(RpcError::Decode(reason)) => assert!(!reason.is_empty()),
        Err(other) => panic!("interpretation produced a transport error: {other}"),
    }
});
