#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end behavior of the collection pipeline.

use odata_query::{
    Error, ExpandItem, ODataLimits, OnFilterError, Pipeline, QueryConfig, QueryOptions,
    decode_options, decode_query_string, paginate, run_pipeline,
};
use serde_json::{Value, json};
use tracing_test::traced_test;

fn products() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "MacBook Pro", "price": 2499, "category": {"name": "Laptops"}, "tags": ["apple"]}),
        json!({"id": 2, "name": "Mouse", "price": 25, "category": {"name": "Accessories"}}),
        json!({"id": 3, "name": "iPad Pro", "price": 1099, "category": {"name": "Tablets"}}),
        json!({"id": 4, "name": "Cable", "price": 9, "category": null}),
        json!({"id": 5, "name": "Monitor", "price": 25}),
    ]
}

fn ids(records: &[Value]) -> Vec<i64> {
    records.iter().filter_map(|r| r["id"].as_i64()).collect()
}

#[test]
fn filter_price_gt_10() {
    let records = vec![json!({"price": 5}), json!({"price": 20})];
    let options = QueryOptions::new().with_filter("price gt 10");
    assert_eq!(run_pipeline(&records, &options), vec![json!({"price": 20})]);
}

#[test]
fn filter_contains_function() {
    let records = vec![json!({"name": "MacBook Pro"}), json!({"name": "Mouse"})];
    let options = QueryOptions::new().with_filter("contains(name,'Pro')");
    assert_eq!(
        run_pipeline(&records, &options),
        vec![json!({"name": "MacBook Pro"})]
    );
}

#[test]
fn filter_is_idempotent() {
    let options = QueryOptions::new().with_filter("price lt 1000 or contains(name, 'Pro')");
    let once = run_pipeline(&products(), &options);
    let twice = run_pipeline(&once, &options);
    assert_eq!(once, twice);
    assert_eq!(ids(&once), vec![1, 2, 3, 4, 5]);

    let options = QueryOptions::new().with_filter("price ge 25 and not contains(name, 'Pro')");
    let once = run_pipeline(&products(), &options);
    assert_eq!(ids(&once), vec![2, 5]);
    assert_eq!(run_pipeline(&once, &options), once);
}

#[test]
fn paginate_composes_with_itself() {
    let records: Vec<u32> = (0..25).collect();
    let nested = paginate(paginate(records.clone(), Some(0), Some(10)), Some(0), Some(5));
    assert_eq!(nested, paginate(records, Some(0), Some(5)));
}

#[test]
fn ordering_is_stable_for_ties() {
    let options = decode_options([("$orderby", "price desc")]);
    let result = run_pipeline(&products(), &options);
    // 2 and 5 tie on price and keep their input order
    assert_eq!(ids(&result), vec![1, 3, 2, 5, 4]);
}

#[test]
fn ordering_on_nested_path_puts_nulls_first() {
    let options = decode_options([("$orderby", "category/name")]);
    let result = run_pipeline(&products(), &options);
    assert_eq!(ids(&result), vec![4, 5, 2, 1, 3]);
}

#[test]
fn select_keeps_only_named_existing_properties() {
    let records = vec![json!({"id": 1, "name": "x"})];
    let options = QueryOptions::new().with_select(["id"]);
    let result = run_pipeline(&records, &options);
    assert_eq!(result, vec![json!({"id": 1})]);
    assert!(result[0].get("name").is_none());
}

#[test]
fn full_query_string_runs_stages_in_order() {
    let options = decode_query_string(
        "$filter=price%20lt%202000&$orderby=price%20desc,id&$skip=1&$top=2&$select=id,name",
    );
    let result = run_pipeline(&products(), &options);
    // filtered: 2,3,4,5 → ordered: 3,2,5,4 → page: 2,5
    assert_eq!(
        result,
        vec![json!({"id": 2, "name": "Mouse"}), json!({"id": 5, "name": "Monitor"})]
    );
}

#[test]
fn three_term_or_chain_filters_like_a_union() {
    let options = QueryOptions::new().with_filter("id eq 1 or id eq 3 or id eq 5");
    assert_eq!(ids(&run_pipeline(&products(), &options)), vec![1, 3, 5]);

    let options = QueryOptions::new().with_filter("price gt 5 and price lt 2000 and name ne 'Mouse'");
    assert_eq!(ids(&run_pipeline(&products(), &options)), vec![3, 4, 5]);
}

#[test]
#[traced_test]
fn malformed_filter_fails_open_and_logs() {
    let records = products();
    for raw in ["(price gt 10", "price gt", "name eq 'unterminated", "a eq b eq c"] {
        let options = QueryOptions::new().with_filter(raw);
        assert_eq!(run_pipeline(&records, &options), records, "filter {raw:?}");
    }
    assert!(logs_contain("ignoring invalid $filter"));
}

#[test]
fn malformed_filter_propagates_under_strict_policy() {
    let pipeline = Pipeline::new(QueryConfig::strict());
    let options = QueryOptions::new().with_filter("(price gt 10");
    let err = pipeline.run(&products(), &options).unwrap_err();
    assert!(matches!(err, Error::InvalidFilter(_)));
}

#[test]
fn filter_over_limits_is_treated_as_invalid() {
    let config = QueryConfig::default()
        .with_on_filter_error(OnFilterError::Propagate)
        .with_limits(ODataLimits::default().with_max_filter_length(10));
    let pipeline = Pipeline::new(config);
    let options = QueryOptions::new().with_filter("name eq 'MacBook Pro'");
    assert!(pipeline.run(&products(), &options).is_err());
}

#[test]
fn expand_with_nested_options_and_missing_paths() {
    let records = vec![
        json!({"id": 1, "orders": [
            {"no": "a", "total": 10},
            {"no": "b", "total": 30},
            {"no": "c", "total": 20}
        ]}),
        json!({"id": 2}),
    ];
    let options = decode_options([
        ("$select", "id"),
        ("$expand", "orders($filter=total gt 15;$orderby=total desc;$top=1;$select=no),profile"),
    ]);

    let result = run_pipeline(&records, &options);
    assert_eq!(
        result,
        vec![
            json!({"id": 1, "orders": [{"no": "b"}], "profile": null}),
            json!({"id": 2, "orders": null, "profile": null}),
        ]
    );
}

#[test]
fn expand_nested_filter_error_propagates_under_strict_policy() {
    let records = vec![json!({"id": 1, "orders": [{"total": 1}]})];
    let options = QueryOptions::new().with_expand(
        ExpandItem::new("orders").with_options(QueryOptions::new().with_filter("total gt")),
    );

    assert_eq!(run_pipeline(&records, &options), records);

    let strict = Pipeline::new(QueryConfig::strict());
    assert!(strict.run(&records, &options).is_err());
}

#[test]
fn server_page_cap_limits_results() {
    let pipeline = Pipeline::new(
        QueryConfig::default().with_limits(ODataLimits::default().with_max_top(2)),
    );
    let all = pipeline.run(&products(), &QueryOptions::new()).unwrap();
    assert_eq!(ids(&all), vec![1, 2]);

    let small = pipeline
        .run(&products(), &QueryOptions::new().with_top(1))
        .unwrap();
    assert_eq!(ids(&small), vec![1]);
}

#[test]
fn input_collection_is_not_mutated() {
    let records = products();
    let snapshot = records.clone();
    let options = decode_query_string("$orderby=price&$select=id&$expand=extra&$filter=price gt 10");
    let shaped = run_pipeline(&records, &options);
    assert_eq!(ids(&shaped), vec![2, 5, 3, 1]);
    assert_eq!(records, snapshot);
}
