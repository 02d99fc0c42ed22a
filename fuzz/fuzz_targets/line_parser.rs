#![no_main]

use libfuzzer_sys::fuzz_target;
use logferry_core::types::ObjectReference;
use logferry_log_pipeline::parser::LineParser;

fuzz_target!(|data: &[u8]| {
    let Ok(parser) = LineParser::new() else {
        return;
    };
    let line = String::from_utf8_lossy(data);

    // 어떤 입력이든 정확히 하나의 엔트리가 나오고 원본 라인이 보존되어야 한다
    let entry = parser.parse(&line);
    assert_eq!(entry.raw_line, line);

    if let Some(origin) = ObjectReference::new("fuzz", "2024-01-01/fuzz/app.log.gz").origin() {
        let entry = entry.with_origin(&origin);
        assert!(entry.date.starts_with("2024-01-01T"));
    }
});
