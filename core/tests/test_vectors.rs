//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected parse results or error kinds. Comparing parsed JSON (not raw
//! strings) avoids false negatives from field-ordering differences.

use serde_json::Value;
use todolist_core::{
    HttpMethod, HttpRequest, HttpResponse, Item, Order, StoreClient, StoreError,
};

const BASE_URL: &str = "http://localhost:54321";

fn client(vectors: &Value) -> StoreClient {
    let client = StoreClient::new(BASE_URL, "todos");
    match vectors["api_key"].as_str() {
        Some(key) => client.with_api_key(key),
        None => client,
    }
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn parse_order(s: &str) -> Order {
    match s {
        "asc" => Order::IdAscending,
        "desc" => Order::IdDescending,
        other => panic!("unknown order: {other}"),
    }
}

/// Stable name for each error kind, as used by `expected_error`.
fn error_name(err: &StoreError) -> &'static str {
    match err {
        StoreError::Transport(_) => "transport",
        StoreError::Unauthorized(_) => "unauthorized",
        StoreError::NotFound => "not_found",
        StoreError::NotSingleRow(_) => "not_single_row",
        StoreError::Http { .. } => "http",
        StoreError::Decode(_) => "decode",
        StoreError::Encode(_) => "encode",
        StoreError::MissingId => "missing_id",
        StoreError::Closed => "closed",
    }
}

fn assert_request(name: &str, req: &HttpRequest, expected: &Value) {
    assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
    assert_eq!(req.path, format!("{BASE_URL}{}", expected["path"].as_str().unwrap()), "{name}: path");

    let expected_headers: Vec<(String, String)> = expected["headers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect();
    assert_eq!(req.headers, expected_headers, "{name}: headers");

    match expected.get("body") {
        Some(body) => {
            let req_body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            assert_eq!(&req_body, body, "{name}: body");
        }
        None => assert!(req.body.is_none(), "{name}: unexpected body"),
    }
}

fn simulated_response(case: &Value) -> HttpResponse {
    let sim = &case["simulated_response"];
    HttpResponse::new(sim["status"].as_u64().unwrap() as u16, sim["body"].as_str().unwrap())
}

/// Compare a parse outcome with `expected_result` / `expected_error`.
fn assert_outcome<T>(name: &str, case: &Value, outcome: Result<T, StoreError>)
where
    T: serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    match case.get("expected_error").and_then(Value::as_str) {
        Some(kind) => {
            let err = outcome.expect_err(name);
            assert_eq!(error_name(&err), kind, "{name}: error kind");
        }
        None => {
            let value = outcome.unwrap_or_else(|e| panic!("{name}: {e}"));
            let expected: T = serde_json::from_value(
                case.get("expected_result").cloned().unwrap_or(Value::Null),
            )
            .unwrap();
            assert_eq!(value, expected, "{name}: parsed result");
        }
    }
}

// ---------------------------------------------------------------------------
// List and filter
// ---------------------------------------------------------------------------

#[test]
fn list_test_vectors() {
    let raw = include_str!("../../test-vectors/list.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client(&vectors);
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let order = parse_order(input["order"].as_str().unwrap());

        let (req, outcome) = match input["term"].as_str() {
            Some(term) => {
                let req = c.build_filter(term, order);
                (req, c.parse_filter(simulated_response(case)))
            }
            None => {
                let req = c.build_list(order);
                (req, c.parse_list(simulated_response(case)))
            }
        };
        assert_request(name, &req, &case["expected_request"]);
        assert_outcome::<Vec<Item>>(name, case, outcome);
    }
}

// ---------------------------------------------------------------------------
// Insert
// ---------------------------------------------------------------------------

#[test]
fn insert_test_vectors() {
    let raw = include_str!("../../test-vectors/insert.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client(&vectors);
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input: Item = serde_json::from_value(case["input"].clone()).unwrap();
        assert!(input.id.is_none(), "{name}: insert input must be unsaved");

        let req = c.build_insert(&input).unwrap();
        assert_request(name, &req, &case["expected_request"]);
        assert_outcome::<Item>(name, case, c.parse_insert(simulated_response(case)));
    }
}

// ---------------------------------------------------------------------------
// Update and delete
// ---------------------------------------------------------------------------

#[test]
fn mutate_test_vectors() {
    let raw = include_str!("../../test-vectors/mutate.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client(&vectors);
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let item: Item = serde_json::from_value(case["input"].clone()).unwrap();
        let id = item.id.unwrap();

        let (req, outcome) = match case["op"].as_str().unwrap() {
            "update" => {
                let req = c.build_update(id, &item).unwrap();
                (req, c.parse_update(simulated_response(case)))
            }
            "delete" => {
                let req = c.build_delete(id);
                (req, c.parse_delete(simulated_response(case)))
            }
            other => panic!("{name}: unknown op {other}"),
        };
        assert_request(name, &req, &case["expected_request"]);
        assert_outcome::<()>(name, case, outcome);
    }
}
