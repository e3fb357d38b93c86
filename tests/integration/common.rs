//! Shared helpers for scripted coordinator tests.

use std::sync::Arc;

use serde_json::{json, Value};
use trino_link::{Backoff, ClientConfig, HttpResponse, MockBackend, TrinoQuery, TrinoRequest};

pub const QUERY_ID: &str = "20240101_000000_00001_abcde";

/// URL of the n-th continuation page.
pub fn next_uri(n: u32) -> String {
    format!("http://coordinator:8080/v1/statement/executing/{QUERY_ID}/{n}")
}

/// A successful protocol response with optional continuation and rows.
pub fn page(next: Option<u32>, data: Value) -> HttpResponse {
    HttpResponse::json(json!({
        "id": QUERY_ID,
        "infoUri": format!("http://coordinator:8080/ui/query.html?{QUERY_ID}"),
        "nextUri": next.map(next_uri),
        "stats": {"state": if next.is_some() { "RUNNING" } else { "FINISHED" }},
        "data": data
    }))
}

pub fn config() -> ClientConfig {
    ClientConfig::new("coordinator", 8080, "alice")
        .with_catalog("hive")
        .with_schema("web")
}

pub fn request(config: ClientConfig, backend: Arc<MockBackend>) -> TrinoRequest {
    TrinoRequest::builder(config)
        .http_backend(backend)
        .backoff(Backoff::none())
        .build()
        .unwrap()
}

pub fn query(backend: Arc<MockBackend>, sql: &str) -> TrinoQuery {
    TrinoQuery::new(request(config(), backend), sql)
}
