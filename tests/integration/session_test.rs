//! Session state integration tests.
//!
//! Tests header encoding and coordinator-driven session changes across a query.

use std::collections::HashMap;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use trino_link::session::parse_session_properties;
use trino_link::{
    ClientSession, HttpResponse, MockBackend, TrinoError, TrinoQuery, TrinoRequest,
};

use super::common::{config, page, query, request};

#[test]
fn test_session_properties_round_trip() {
    let mut properties = HashMap::new();
    properties.insert("query_max_run_time".to_string(), "2h".to_string());
    properties.insert("label".to_string(), "a=b, c&d %".to_string());
    properties.insert("empty".to_string(), String::new());

    let headers = ClientSession::new("alice")
        .with_properties(properties.clone())
        .build_headers()
        .unwrap();
    let encoded = headers.get("x-trino-session").unwrap().to_str().unwrap();

    let decoded: HashMap<String, String> = parse_session_properties(encoded)
        .unwrap()
        .into_iter()
        .collect();
    assert_eq!(decoded, properties);
}

#[test]
fn test_extra_credential_header() {
    let headers = ClientSession::new("alice")
        .with_extra_credential(vec![
            ("s3.access".to_string(), "AKIA".to_string()),
            ("s3.secret".to_string(), "a/b+c=d".to_string()),
        ])
        .build_headers()
        .unwrap();

    assert_eq!(
        headers.get("x-trino-extra-credential").unwrap(),
        "s3.access=AKIA, s3.secret=a%2Fb%2Bc%3Dd"
    );
}

#[test]
fn test_invalid_extra_credential_keys() {
    for key in ["bad key", "bad=key", "ключ", "tab\tkey"] {
        let result = ClientSession::new("alice")
            .with_extra_credential(vec![(key.to_string(), "v".to_string())])
            .build_headers();
        assert!(
            matches!(result, Err(TrinoError::Config(_))),
            "key {key:?} should be rejected"
        );
    }
}

#[tokio::test]
async fn test_invalid_credential_rejected_before_network() {
    let backend = Arc::new(MockBackend::new());
    let result = TrinoRequest::builder(
        config().with_extra_credential(vec![("bad key".to_string(), "v".to_string())]),
    )
    .http_backend(backend.clone())
    .build();

    assert!(matches!(result, Err(TrinoError::Config(_))));
    assert_eq!(backend.request_count(), 0);
}

/// Scenario: Clearing an unknown property
/// Given a session without the property `never_set`
/// When a response clears `never_set`
/// Then the query succeeds and the session is unchanged
#[tokio::test]
async fn test_clear_unknown_property_is_noop() {
    let backend = Arc::new(MockBackend::with_responses([
        page(None, json!([])).with_header("X-Trino-Clear-Session", "never_set")
    ]));
    let mut properties = HashMap::new();
    properties.insert("kept".to_string(), "1".to_string());
    let request = request(config().with_session_properties(properties), backend);
    let mut query = TrinoQuery::new(request, "RESET SESSION never_set");

    query.execute(None).await.unwrap();

    let request = query.into_request();
    assert_eq!(request.session().properties().len(), 1);
    assert_eq!(request.session().properties()["kept"], "1");
}

/// Scenario: Session changes carry over to later polls
/// Given a first response that sets a property and starts a transaction
/// When the query polls its continuation URI
/// Then the poll carries the new property and transaction id
#[tokio::test]
async fn test_session_changes_sent_on_next_poll() {
    let backend = Arc::new(MockBackend::with_responses([
        page(Some(1), json!([]))
            .with_header("X-Trino-Set-Session", "join_distribution_type=BROADCAST")
            .with_header("X-Trino-Started-Transaction-Id", "tx-1"),
        page(None, json!([])),
    ]));
    let mut query = query(backend.clone(), "START TRANSACTION");
    query.execute(None).await.unwrap().fetch_all().await.unwrap();

    let requests = backend.requests();
    assert!(requests[0].headers.get("x-trino-session").is_none());
    assert_eq!(
        requests[1].headers.get("x-trino-session").unwrap(),
        "join_distribution_type=BROADCAST"
    );
    assert_eq!(requests[1].headers.get("x-trino-transaction-id").unwrap(), "tx-1");
}

#[tokio::test]
async fn test_session_carried_into_next_query() {
    let backend = Arc::new(MockBackend::with_responses([
        page(None, json!([])).with_header("X-Trino-Set-Session", "optimize_hash_generation=false"),
        page(None, json!([])),
    ]));
    let mut first = query(backend.clone(), "SET SESSION optimize_hash_generation = false");
    first.execute(None).await.unwrap();

    let mut second = TrinoQuery::new(first.into_request().try_clone().unwrap(), "SELECT 1");
    second.execute(None).await.unwrap();

    assert_eq!(
        backend.requests()[1].headers.get("x-trino-session").unwrap(),
        "optimize_hash_generation=false"
    );
}

#[tokio::test]
async fn test_clear_transaction() {
    let backend = Arc::new(MockBackend::with_responses([
        page(None, json!([])).with_header("X-Trino-Clear-Transaction-Id", "true")
    ]));
    let request = request(config(), backend);
    let mut query = TrinoQuery::new(request, "COMMIT");
    query.execute(None).await.unwrap();

    let mut request = query.into_request();
    assert_eq!(request.transaction_id(), None);
    request.set_transaction_id(Some("NONE".to_string()));
    assert_eq!(request.transaction_id(), None);
}

#[tokio::test]
async fn test_failed_response_leaves_session_untouched() {
    let backend = Arc::new(MockBackend::with_responses([HttpResponse::json(json!({
        "id": "q1",
        "infoUri": "http://coordinator:8080/ui",
        "error": {"message": "boom", "errorType": "INTERNAL_ERROR"}
    }))
    .with_header("X-Trino-Set-Session", "leaked=1")]));
    let mut query = query(backend, "SELECT 1");

    assert!(matches!(query.execute(None).await, Err(TrinoError::Query(_))));
    assert!(query.request().session().properties().is_empty());
}
