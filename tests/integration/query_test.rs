//! Query lifecycle integration tests.
//!
//! Tests submission, polling, cancellation and result streaming end to end.

use std::sync::Arc;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use reqwest::header::HeaderMap;
use serde_json::json;
use trino_link::{HttpResponse, Method, MockBackend, QueryState, Row, TrinoError};

use super::common::{next_uri, page, query, QUERY_ID};

/// Scenario: Single-response query
/// Given a coordinator whose first response has no continuation URI
/// When the query is executed and its rows consumed
/// Then the query is already finished
/// And exactly that response's rows are produced with no further requests
#[tokio::test]
async fn test_single_response_query() {
    let backend = Arc::new(MockBackend::with_responses([page(
        None,
        json!([[1, "a"], [2, "b"]]),
    )]));
    let mut query = query(backend.clone(), "SELECT * FROM (VALUES (1, 'a'), (2, 'b'))");

    let result = query.execute(None).await.unwrap();
    assert!(result.query().is_finished());
    let rows = result.fetch_all().await.unwrap();

    assert_eq!(rows, vec![vec![json!(1), json!("a")], vec![json!(2), json!("b")]]);
    assert_eq!(backend.request_count(), 1);
    assert_eq!(query.state(), QueryState::Finished);
}

/// Scenario: Rows across three responses
/// Given responses with rows [1,2], [3] and [] where only the last has no continuation
/// When the result is streamed
/// Then rows 1, 2, 3 arrive in that order
#[tokio::test]
async fn test_rows_across_three_responses() {
    let backend = Arc::new(MockBackend::with_responses([
        page(Some(1), json!([[1], [2]])),
        page(Some(2), json!([[3]])),
        page(None, json!([])),
    ]));
    let mut query = query(backend.clone(), "SELECT n FROM numbers");

    let rows: Vec<Row> = query
        .execute(None)
        .await
        .unwrap()
        .into_stream()
        .map(|row| row.unwrap())
        .collect()
        .await;

    assert_eq!(rows, vec![vec![json!(1)], vec![json!(2)], vec![json!(3)]]);

    // Polls follow the continuation URIs in the order they were received.
    let urls: Vec<String> = backend.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            "http://coordinator:8080/v1/statement".to_string(),
            next_uri(1),
            next_uri(2)
        ]
    );
}

#[tokio::test]
async fn test_every_poll_resends_session_headers() {
    let backend = Arc::new(MockBackend::with_responses([
        page(Some(1), json!([])),
        page(None, json!([])),
    ]));
    let mut query = query(backend.clone(), "SELECT 1");
    query.execute(None).await.unwrap().fetch_all().await.unwrap();

    for request in backend.requests() {
        assert_eq!(request.headers.get("x-trino-user").unwrap(), "alice");
        assert_eq!(request.headers.get("x-trino-catalog").unwrap(), "hive");
        assert_eq!(request.headers.get("x-trino-schema").unwrap(), "web");
        assert_eq!(request.headers.get("x-trino-transaction-id").unwrap(), "NONE");
    }
}

#[tokio::test]
async fn test_additional_headers_only_on_submission() {
    let backend = Arc::new(MockBackend::with_responses([
        page(Some(1), json!([])),
        page(None, json!([])),
    ]));
    let mut query = query(backend.clone(), "SELECT 1");

    let mut extra = HeaderMap::new();
    extra.insert("x-trino-client-tags", "nightly".parse().unwrap());
    query.execute(Some(&extra)).await.unwrap().fetch_all().await.unwrap();

    let requests = backend.requests();
    assert_eq!(requests[0].headers.get("x-trino-client-tags").unwrap(), "nightly");
    assert!(requests[1].headers.get("x-trino-client-tags").is_none());
}

/// Scenario: Cancel twice
/// Given a running query
/// When cancel is called twice
/// Then only one DELETE is sent and both calls succeed
#[tokio::test]
async fn test_cancel_twice_is_idempotent() {
    let backend = Arc::new(MockBackend::with_responses([
        page(Some(1), json!([[1]])),
        HttpResponse::new(204),
    ]));
    let mut query = query(backend.clone(), "SELECT * FROM big_table");
    query.execute(None).await.unwrap();

    query.cancel().await.unwrap();
    query.cancel().await.unwrap();

    assert_eq!(backend.request_count(), 2);
    let delete = &backend.requests()[1];
    assert_eq!(delete.method, Method::Delete);
    assert_eq!(
        delete.url,
        format!("http://coordinator:8080/v1/query/{QUERY_ID}")
    );
}

#[tokio::test]
async fn test_execute_after_cancel_fails() {
    let backend = Arc::new(MockBackend::with_responses([
        page(Some(1), json!([])),
        HttpResponse::new(204),
    ]));
    let mut query = query(backend.clone(), "SELECT 1");
    query.execute(None).await.unwrap();
    query.cancel().await.unwrap();

    match query.execute(None).await {
        Err(TrinoError::Cancelled { query_id }) => assert_eq!(query_id.as_deref(), Some(QUERY_ID)),
        Err(other) => panic!("Expected Cancelled error, got {other:?}"),
        Ok(_) => panic!("Expected Cancelled error"),
    }
    assert_eq!(backend.request_count(), 2);
}

#[tokio::test]
async fn test_columns_are_sticky() {
    let backend = Arc::new(MockBackend::with_responses([
        HttpResponse::json(json!({
            "id": QUERY_ID,
            "infoUri": "http://coordinator:8080/ui",
            "nextUri": next_uri(1),
            "columns": [{"name": "id", "type": "bigint"}, {"name": "name", "type": "varchar"}],
            "data": [[1, "x"]]
        })),
        page(None, json!([[2, "y"]])),
    ]));
    let mut query = query(backend, "SELECT id, name FROM t");
    query.execute(None).await.unwrap().fetch_all().await.unwrap();

    let columns = query.columns().await.unwrap().unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name"]);
}

#[tokio::test]
async fn test_stats_merged_across_responses() {
    let backend = Arc::new(MockBackend::with_responses([
        HttpResponse::json(json!({
            "id": QUERY_ID,
            "infoUri": "http://coordinator:8080/ui",
            "nextUri": next_uri(1),
            "stats": {"state": "QUEUED", "queuedSplits": 4},
            "warnings": [{"message": "deprecated function"}]
        })),
        HttpResponse::json(json!({
            "id": QUERY_ID,
            "infoUri": "http://coordinator:8080/ui",
            "stats": {"state": "FINISHED", "processedRows": 100}
        })),
    ]));
    let mut query = query(backend, "SELECT 1");
    query.execute(None).await.unwrap().fetch_all().await.unwrap();

    let stats = query.stats();
    assert_eq!(stats["queryId"], json!(QUERY_ID));
    assert_eq!(stats["state"], json!("FINISHED"));
    assert_eq!(stats["queuedSplits"], json!(4));
    assert_eq!(stats["processedRows"], json!(100));
    assert_eq!(query.warnings().len(), 1);
    assert_eq!(query.info_uri(), Some("http://coordinator:8080/ui"));
}

/// Scenario: Query error during polling
/// Given a query whose second response carries a user error
/// When the rows are consumed
/// Then the user error is returned with the query id
/// And the result yields nothing further
#[tokio::test]
async fn test_user_error_while_polling() {
    let backend = Arc::new(MockBackend::with_responses([
        page(Some(1), json!([[1]])),
        HttpResponse::json(json!({
            "id": QUERY_ID,
            "infoUri": "http://coordinator:8080/ui",
            "error": {
                "message": "line 1:8: Column 'x' cannot be resolved",
                "errorCode": 47,
                "errorName": "COLUMN_NOT_FOUND",
                "errorType": "USER_ERROR",
                "errorLocation": {"lineNumber": 1, "columnNumber": 8}
            }
        })),
    ]));
    let mut query = query(backend.clone(), "SELECT x FROM t");
    let mut result = query.execute(None).await.unwrap();

    assert_eq!(result.next().await.unwrap(), Some(vec![json!(1)]));
    match result.next().await {
        Err(TrinoError::User(e)) => {
            assert_eq!(e.query_id.as_deref(), Some(QUERY_ID));
            assert_eq!(e.error_name.as_deref(), Some("COLUMN_NOT_FOUND"));
        }
        other => panic!("Expected User error, got {other:?}"),
    }
    assert!(result.next().await.unwrap().is_none());
    assert_eq!(backend.request_count(), 2);
}

#[tokio::test]
async fn test_external_error_on_submission() {
    let backend = Arc::new(MockBackend::with_responses([HttpResponse::json(json!({
        "id": QUERY_ID,
        "infoUri": "http://coordinator:8080/ui",
        "error": {"message": "Hive metastore unreachable", "errorType": "EXTERNAL"}
    }))]));
    let mut query = query(backend.clone(), "SELECT * FROM hive.web.t");

    match query.execute(None).await {
        Err(TrinoError::External(e)) => assert_eq!(e.message, "Hive metastore unreachable"),
        Err(other) => panic!("Expected External error, got {other:?}"),
        Ok(_) => panic!("Expected External error"),
    }
    assert_eq!(backend.request_count(), 1);
}
