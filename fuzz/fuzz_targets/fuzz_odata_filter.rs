#![no_main]

use libfuzzer_sys::fuzz_target;
use odata_query::{Evaluator, FunctionTable, parse_filter_string};
use serde_json::json;

fuzz_target!(|data: &[u8]| {
    // Limit input size to avoid OOM on pathological inputs
    if data.len() > 1024 {
        return;
    }
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    // Parse errors are expected; evaluation of anything that parses must not panic
    if let Ok(parsed) = parse_filter_string(s) {
        let functions = FunctionTable::builtin();
        let record = json!({"id": 1, "name": "Widget", "tags": ["a"], "nested": {"at": "2024-01-01T00:00:00Z"}});
        let _matched = Evaluator::new(&functions).matches(parsed.as_expr(), &record);
    }
});
