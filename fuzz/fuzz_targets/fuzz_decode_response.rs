#![no_main]

use libfuzzer_sys::fuzz_target;
use templog_db::protocol::{decode_greeting, decode_response};

fuzz_target!(|data: &[u8]| {
    // Server-controlled payloads must never panic the client
    let _ = decode_greeting(data);
    let _ = decode_response(data);
});
