#![no_main]

use libfuzzer_sys::fuzz_target;
use logferry_log_pipeline::notification::{decode_envelope, decode_key};

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        // 패닉 없이 Ok 또는 Err을 반환해야 한다
        if let Ok(envelope) = decode_envelope(body) {
            for record in &envelope.records {
                let _ = record.object_reference();
                let _ = record.lag_ms();
            }
        }
        let _ = decode_key(body);
    }
});
