//! Query lifecycle: submit, poll, finish or cancel.
//!
//! A [`TrinoQuery`] drives one statement through the coordinator. It owns the
//! [`TrinoRequest`] for its lifecycle, so session changes signalled by the coordinator
//! are applied to the session that later polls send.

use std::collections::VecDeque;

use reqwest::header::HeaderMap;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::constants::URL_QUERY_PATH;
use crate::error::{Result, TrinoError};
use crate::protocol::{self, Column, QueryStatus, Row};
use crate::request::TrinoRequest;
use crate::result::TrinoResult;

const SQL_PREVIEW_LEN: usize = 80;

/// Lifecycle state of a query.
///
/// A failed query is not a state: the failure is returned to the caller and the
/// query stays where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    /// Not submitted yet.
    Created,
    /// Submitted, with a continuation URI to poll.
    Running,
    /// The coordinator returned no continuation URI.
    Finished,
    /// Cancelled by the caller.
    Cancelled,
}

impl QueryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, QueryState::Finished | QueryState::Cancelled)
    }
}

/// One statement and its execution state.
pub struct TrinoQuery {
    request: TrinoRequest,
    sql: String,
    state: QueryState,
    query_id: Option<String>,
    stats: Map<String, Value>,
    warnings: Vec<Value>,
    info_uri: Option<String>,
    columns: Option<Vec<Column>>,
    /// Rows received from the coordinator and not yet handed out.
    buffer: VecDeque<Row>,
    response_headers: HeaderMap,
}

impl TrinoQuery {
    pub fn new(request: TrinoRequest, sql: impl Into<String>) -> Self {
        Self {
            request,
            sql: sql.into(),
            state: QueryState::Created,
            query_id: None,
            stats: Map::new(),
            warnings: Vec::new(),
            info_uri: None,
            columns: None,
            buffer: VecDeque::new(),
            response_headers: HeaderMap::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Identifier assigned by the coordinator on the first successful response.
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }

    /// Statistics merged across every response, plus `queryId`.
    pub fn stats(&self) -> &Map<String, Value> {
        &self.stats
    }

    pub fn warnings(&self) -> &[Value] {
        &self.warnings
    }

    pub fn info_uri(&self) -> Option<&str> {
        self.info_uri.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.state == QueryState::Finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == QueryState::Cancelled
    }

    /// Headers of the latest response.
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn request(&self) -> &TrinoRequest {
        &self.request
    }

    /// Gives the request back, with any session changes the coordinator made.
    pub fn into_request(self) -> TrinoRequest {
        self.request
    }

    /// Columns learned so far, without polling.
    pub fn known_columns(&self) -> Option<&[Column]> {
        self.columns.as_deref()
    }

    /// Submits the statement and returns a result over its rows.
    ///
    /// A response without a continuation URI finishes the query immediately.
    pub async fn execute(
        &mut self,
        additional_headers: Option<&HeaderMap>,
    ) -> Result<TrinoResult<'_>> {
        match self.state {
            QueryState::Created => {}
            QueryState::Cancelled => return Err(self.cancelled_error()),
            state => {
                return Err(TrinoError::invalid_state(format!(
                    "query has already been executed (state: {state:?})"
                )))
            }
        }

        debug!("Executing statement: {}", sql_preview(&self.sql));
        let response = self.request.post(&self.sql, additional_headers).await?;
        self.response_headers = response.headers.clone();
        let status = self.request.process(&response)?;

        info!("Query {} submitted", status.id);
        self.query_id = Some(status.id.clone());
        self.stats
            .insert("queryId".to_string(), Value::String(status.id.clone()));
        let rows = self.update_state(status);
        self.buffer_rows(rows);

        Ok(TrinoResult::new(self))
    }

    /// Polls the continuation URI once and returns the rows it delivered.
    pub async fn fetch(&mut self) -> Result<Vec<Row>> {
        if self.is_cancelled() {
            return Err(self.cancelled_error());
        }
        let next_uri = self
            .request
            .next_uri()
            .map(str::to_string)
            .ok_or_else(|| TrinoError::invalid_state("query has no continuation URI to fetch"))?;

        let response = self.request.get(&next_uri).await?;
        self.response_headers = response.headers.clone();
        let status = self.request.process(&response)?;
        Ok(self.update_state(status))
    }

    /// Cancels the query on the coordinator.
    ///
    /// Does nothing before submission, after completion, or when already cancelled.
    /// The query counts as cancelled even if the request to the coordinator fails.
    pub async fn cancel(&mut self) -> Result<()> {
        let Some(query_id) = self.query_id.clone() else {
            debug!("Cancel requested before submission; nothing to cancel");
            return Ok(());
        };
        if self.state.is_terminal() {
            debug!("Query {} is already {:?}", query_id, self.state);
            return Ok(());
        }

        self.state = QueryState::Cancelled;
        let url = self
            .request
            .get_url(&format!("{URL_QUERY_PATH}/{query_id}"));
        let response = self.request.delete(&url).await?;

        if response.status == 204 {
            info!("Query {} cancelled", query_id);
            Ok(())
        } else {
            Err(protocol::response_error(&response))
        }
    }

    /// Column metadata, polling until it is known or the query ends.
    ///
    /// Rows delivered while polling are kept for the result.
    pub async fn columns(&mut self) -> Result<Option<&[Column]>> {
        if self.query_id.is_some() {
            while self.columns.is_none() && !self.state.is_terminal() {
                let rows = self.fetch().await?;
                self.buffer_rows(rows);
            }
        }
        Ok(self.columns.as_deref())
    }

    pub(crate) fn next_buffered(&mut self) -> Option<Row> {
        self.buffer.pop_front()
    }

    pub(crate) fn buffer_rows(&mut self, rows: Vec<Row>) {
        self.buffer.extend(rows);
    }

    fn update_state(&mut self, status: QueryStatus) -> Vec<Row> {
        self.stats.extend(status.stats);
        if !status.warnings.is_empty() {
            self.warnings = status.warnings;
        }
        self.info_uri = Some(status.info_uri);
        // Later responses may omit columns; keep the ones already learned.
        if let Some(columns) = status.columns {
            self.columns = Some(columns);
        }

        if status.next_uri.is_none() {
            debug!("Query {} finished", status.id);
            self.state = QueryState::Finished;
        } else if self.state == QueryState::Created {
            self.state = QueryState::Running;
        }
        status.rows
    }

    fn cancelled_error(&self) -> TrinoError {
        TrinoError::Cancelled {
            query_id: self.query_id.clone(),
        }
    }
}

fn sql_preview(sql: &str) -> String {
    let trimmed = sql.trim();
    if trimmed.chars().count() > SQL_PREVIEW_LEN {
        let preview: String = trimmed.chars().take(SQL_PREVIEW_LEN).collect();
        format!("{preview}...")
    } else {
        trimmed.to_string()
    }
}
