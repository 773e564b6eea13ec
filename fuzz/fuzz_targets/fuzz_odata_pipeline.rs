#![no_main]

use libfuzzer_sys::fuzz_target;
use odata_query::{decode_query_string, run_pipeline};
use serde_json::json;

fuzz_target!(|data: &[u8]| {
    // Limit input size to avoid OOM on pathological inputs
    if data.len() > 1024 {
        return;
    }
    let Ok(query) = std::str::from_utf8(data) else {
        return;
    };
    let records = vec![
        json!({"id": 1, "name": "b", "price": 10.5, "owner": {"name": "x"}}),
        json!({"id": 2, "name": null, "lines": [{"qty": 1}, {"qty": 3}]}),
        json!({"id": "3", "price": true}),
        json!(4),
    ];
    let options = decode_query_string(query);
    let shaped = run_pipeline(&records, &options);
    assert!(shaped.len() <= records.len());
});
