//! Retry and redirect integration tests.

use std::sync::Arc;

use serde_json::json;
use trino_link::{
    Backoff, HttpResponse, MockBackend, RedirectHandler, Result, TransportErrorKind, TrinoError,
    TrinoQuery, TrinoRequest,
};

use super::common::{config, page, query, request};

/// Scenario: Retries disabled
/// Given max_attempts = 1
/// When the coordinator answers 503
/// Then the 503 response is returned unmodified after a single attempt
#[tokio::test]
async fn test_single_attempt_returns_503_unmodified() {
    let backend = Arc::new(MockBackend::with_responses([
        HttpResponse::new(503).with_body("overloaded"),
        page(None, json!([])),
    ]));
    let request = request(config().with_max_attempts(1), backend.clone());

    let response = request.post("SELECT 1", None).await.unwrap();

    assert_eq!(response.status, 503);
    assert_eq!(response.body, "overloaded");
    assert_eq!(backend.request_count(), 1);
    assert_eq!(backend.remaining(), 1);
}

/// Scenario: Retries exhausted
/// Given max_attempts = 4
/// When every attempt returns 503
/// Then exactly 4 attempts are made and the typed error is raised
#[tokio::test]
async fn test_retries_exhausted_on_503() {
    let backend = Arc::new(MockBackend::with_responses(
        (0..4).map(|_| HttpResponse::new(503)),
    ));
    let mut query = TrinoQuery::new(
        request(config().with_max_attempts(4), backend.clone()),
        "SELECT 1",
    );

    assert!(matches!(
        query.execute(None).await,
        Err(TrinoError::ServiceUnavailable)
    ));
    assert_eq!(backend.request_count(), 4);
}

#[tokio::test]
async fn test_gateway_timeout_then_success() {
    let backend = Arc::new(MockBackend::with_responses([
        HttpResponse::new(504),
        page(None, json!([[1]])),
    ]));
    let mut query = query(backend.clone(), "SELECT 1");

    let rows = query.execute(None).await.unwrap().fetch_all().await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(backend.request_count(), 2);
}

#[tokio::test]
async fn test_connection_failure_retried_while_polling() {
    let backend = Arc::new(MockBackend::new());
    backend.push_response(page(Some(1), json!([])));
    backend.push_error(TransportErrorKind::Connect, "connection reset");
    backend.push_response(page(None, json!([[9]])));
    let mut query = query(backend.clone(), "SELECT 9");

    let rows = query.execute(None).await.unwrap().fetch_all().await.unwrap();

    assert_eq!(rows, vec![vec![json!(9)]]);
    assert_eq!(backend.request_count(), 3);
}

#[tokio::test]
async fn test_non_retryable_status_not_retried() {
    let backend = Arc::new(MockBackend::with_responses([
        HttpResponse::new(500).with_body("internal"),
        page(None, json!([])),
    ]));
    let mut query = query(backend.clone(), "SELECT 1");

    assert!(matches!(
        query.execute(None).await,
        Err(TrinoError::Http { status: 500, .. })
    ));
    assert_eq!(backend.request_count(), 1);
}

#[tokio::test]
async fn test_redirect_handler_resends_statement() {
    let backend = Arc::new(MockBackend::with_responses([
        HttpResponse::new(307).with_header("Location", "http://gateway/v1/statement"),
        page(None, json!([[1]])),
    ]));
    let handler: Arc<dyn RedirectHandler> = Arc::new(|location: &str| -> Result<String> {
        Ok(location.replace("gateway", "worker-1:8080"))
    });
    let request = TrinoRequest::builder(config())
        .http_backend(backend.clone())
        .redirect_handler(handler)
        .backoff(Backoff::none())
        .build()
        .unwrap();
    let mut query = TrinoQuery::new(request, "SELECT 1");

    query.execute(None).await.unwrap().fetch_all().await.unwrap();

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].url, "http://worker-1:8080/v1/statement");
    assert_eq!(requests[1].body_text(), "SELECT 1");
}
