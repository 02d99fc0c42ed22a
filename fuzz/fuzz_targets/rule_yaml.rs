#![no_main]

use libfuzzer_sys::fuzz_target;
use logferry_log_pipeline::rule::RuleLoader;

fuzz_target!(|data: &[u8]| {
    let Ok(yaml) = std::str::from_utf8(data) else {
        return;
    };
    // 검증을 통과한 정의는 컴파일까지 패닉 없이 끝나야 한다
    if let Ok(definition) = RuleLoader::parse_yaml(yaml, "fuzz-input.yml") {
        let _ = definition.compile();
    }
});
