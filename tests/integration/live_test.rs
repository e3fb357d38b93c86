//! Tests against a running coordinator.
//!
//! Set TRINO_URL (e.g. `trino://admin@localhost:8080/tpch/tiny`) to run them.

use trino_link::{ClientConfig, TrinoQuery, TrinoRequest};

/// Helper to get the coordinator URL from environment.
fn get_test_trino_url() -> Option<String> {
    std::env::var("TRINO_URL").ok()
}

/// Helper to create a request against the live coordinator.
fn get_test_request() -> Option<TrinoRequest> {
    let url = get_test_trino_url()?;
    let config = ClientConfig::from_url(&url).ok()?;
    TrinoRequest::builder(config).build().ok()
}

#[tokio::test]
async fn test_live_select_literal() {
    let Some(request) = get_test_request() else {
        eprintln!("Skipping test: TRINO_URL not set");
        return;
    };

    let mut query = TrinoQuery::new(request, "SELECT 1 AS num, 'hello' AS greeting");
    let rows = query.execute(None).await.unwrap().fetch_all().await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], serde_json::json!(1));
    let columns = query.columns().await.unwrap().unwrap();
    assert_eq!(columns[0].name, "num");
    assert!(query.is_finished());

    query.into_request().close().await.unwrap();
}

#[tokio::test]
async fn test_live_cancel() {
    let Some(request) = get_test_request() else {
        eprintln!("Skipping test: TRINO_URL not set");
        return;
    };

    let mut query = TrinoQuery::new(
        request,
        "SELECT count(*) FROM UNNEST(sequence(1, 10000000)) CROSS JOIN UNNEST(sequence(1, 1000))",
    );
    query.execute(None).await.unwrap();
    query.cancel().await.unwrap();

    assert!(query.is_finished() || query.is_cancelled());
}

#[tokio::test]
async fn test_live_user_error() {
    let Some(request) = get_test_request() else {
        eprintln!("Skipping test: TRINO_URL not set");
        return;
    };

    let mut query = TrinoQuery::new(request, "SELECT no_such_column FROM (VALUES 1) t(x)");
    let result = match query.execute(None).await {
        Ok(result) => result.fetch_all().await,
        Err(e) => Err(e),
    };

    match result {
        Err(trino_link::TrinoError::User(e)) => assert!(e.query_id.is_some()),
        other => panic!("Expected User error, got {other:?}"),
    }
}
