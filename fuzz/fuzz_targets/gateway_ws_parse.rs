#![no_main]

use arca_gateway::{build_api_error_frame, parse_api_request_frame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    match parse_api_request_frame(&raw) {
        Ok(frame) => {
            assert!(!frame.method.trim().is_empty());
        }
        Err(error) => {
            let frame = build_api_error_frame(&format!("{error:#}"));
            assert_eq!(frame["success"], false);
            assert!(frame["error"].as_str().is_some_and(|text| !text.is_empty()));
        }
    }
});
