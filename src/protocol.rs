//! Response processing for the statement protocol.
//!
//! Turns one HTTP response into a [`QueryStatus`] or a typed error, and applies the
//! session mutations the coordinator signals through response headers. This is the
//! only place protocol errors are told apart from HTTP status errors; transport
//! failures never reach it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::{
    ERROR_BODY_SNIPPET_LEN, HEADER_CLEAR_SESSION, HEADER_CLEAR_TRANSACTION, HEADER_SET_SESSION,
    HEADER_STARTED_TRANSACTION,
};
use crate::error::{QueryError, Result, TrinoError};
use crate::http::HttpResponse;
use crate::session::{header_values, parse_session_properties, ClientSession};

/// One result row: column values in column order, left undecoded.
pub type Row = Vec<Value>;

/// Column metadata as reported by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_signature: Option<Value>,
}

/// Status of a query as of one response.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStatus {
    pub id: String,
    pub stats: Map<String, Value>,
    pub warnings: Vec<Value>,
    pub info_uri: String,
    /// Continuation URI. `None` means the query has no more results.
    pub next_uri: Option<String>,
    pub rows: Vec<Row>,
    pub columns: Option<Vec<Column>>,
}

/// JSON envelope of a successful response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResults {
    id: String,
    info_uri: String,
    next_uri: Option<String>,
    stats: Option<Map<String, Value>>,
    warnings: Option<Vec<Value>>,
    columns: Option<Vec<Column>>,
    data: Option<Vec<Row>>,
}

/// Maps an unsuccessful response to its typed error.
pub fn response_error(response: &HttpResponse) -> TrinoError {
    match response.status {
        503 => TrinoError::ServiceUnavailable,
        504 => TrinoError::GatewayTimeout,
        status => TrinoError::Http {
            status,
            body: response.body.chars().take(ERROR_BODY_SNIPPET_LEN).collect(),
        },
    }
}

/// Classifies the `error` field of a response by its `errorType`.
fn query_error(error: &Value, query_id: Option<String>) -> TrinoError {
    let mut decoded = serde_json::from_value::<QueryError>(error.clone())
        .unwrap_or_else(|_| QueryError::new(error.to_string(), None));
    decoded.query_id = query_id;

    match decoded.error_type.as_deref() {
        Some("EXTERNAL") => TrinoError::External(decoded),
        Some("USER_ERROR") => TrinoError::User(decoded),
        _ => TrinoError::Query(decoded),
    }
}

/// Applies session and transaction mutation headers to the session.
fn apply_session_headers(session: &mut ClientSession, response: &HttpResponse) -> Result<()> {
    if let Some(value) = response.header(HEADER_CLEAR_SESSION) {
        for name in header_values(value) {
            session.clear_property(&name);
        }
    }

    if let Some(value) = response.header(HEADER_SET_SESSION) {
        for (name, value) in parse_session_properties(value)? {
            session.set_property(name, value);
        }
    }

    if let Some(transaction_id) = response.header(HEADER_STARTED_TRANSACTION) {
        debug!("Started transaction {}", transaction_id);
        session.set_transaction_id(Some(transaction_id.trim().to_string()));
    }

    if response.headers.contains_key(HEADER_CLEAR_TRANSACTION) {
        debug!("Transaction cleared");
        session.set_transaction_id(None);
    }

    Ok(())
}

/// Processes one response into a query status.
///
/// The error checks run before any session header is applied, so a failed response
/// never mutates the session.
pub fn process_response(session: &mut ClientSession, response: &HttpResponse) -> Result<QueryStatus> {
    if !response.is_success() {
        return Err(response_error(response));
    }

    let body: Value = serde_json::from_str(&response.body)
        .map_err(|e| TrinoError::protocol(format!("invalid response body: {e}")))?;
    debug!("HTTP {}: {}", response.status, body);

    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let query_id = body.get("id").and_then(Value::as_str).map(str::to_string);
        return Err(query_error(error, query_id));
    }

    apply_session_headers(session, response)?;

    let results: QueryResults = serde_json::from_value(body)
        .map_err(|e| TrinoError::protocol(format!("unexpected response envelope: {e}")))?;

    Ok(QueryStatus {
        id: results.id,
        stats: results.stats.unwrap_or_default(),
        warnings: results.warnings.unwrap_or_default(),
        info_uri: results.info_uri,
        next_uri: results.next_uri,
        rows: results.data.unwrap_or_default(),
        columns: results.columns,
    })
}
