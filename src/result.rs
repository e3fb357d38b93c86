//! Lazy, single-pass access to the rows of a query.

use futures::stream::{self, Stream};
use reqwest::header::HeaderMap;

use crate::error::Result;
use crate::protocol::Row;
use crate::query::TrinoQuery;

/// Rows of an executed query, fetched from the coordinator as they are consumed.
///
/// Rows already delivered are served first; once they run out the query is polled
/// again until it reaches a terminal state. Each instance is consumed once.
pub struct TrinoResult<'a> {
    query: &'a mut TrinoQuery,
    row_number: u64,
    exhausted: bool,
}

impl<'a> TrinoResult<'a> {
    pub(crate) fn new(query: &'a mut TrinoQuery) -> Self {
        Self {
            query,
            row_number: 0,
            exhausted: false,
        }
    }

    /// Returns the next row, or `None` once the query has no more rows.
    ///
    /// After an error the result is exhausted and yields `None`.
    pub async fn next(&mut self) -> Result<Option<Row>> {
        loop {
            if self.exhausted {
                return Ok(None);
            }
            if let Some(row) = self.query.next_buffered() {
                self.row_number += 1;
                return Ok(Some(row));
            }
            if self.query.state().is_terminal() {
                self.exhausted = true;
                return Ok(None);
            }

            match self.query.fetch().await {
                Ok(rows) => self.query.buffer_rows(rows),
                Err(e) => {
                    self.exhausted = true;
                    return Err(e);
                }
            }
        }
    }

    /// Collects every remaining row.
    pub async fn fetch_all(mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Adapts the result into a stream of rows. The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row>> + 'a {
        stream::unfold(self, |mut result| async move {
            match result.next().await {
                Ok(Some(row)) => Some((Ok(row), result)),
                Ok(None) => None,
                Err(e) => Some((Err(e), result)),
            }
        })
    }

    /// Number of rows yielded so far.
    pub fn row_number(&self) -> u64 {
        self.row_number
    }

    /// Headers of the latest coordinator response.
    pub fn response_headers(&self) -> &HeaderMap {
        self.query.response_headers()
    }

    pub fn query(&self) -> &TrinoQuery {
        &*self.query
    }

    /// The underlying query, e.g. to cancel it part way through.
    pub fn query_mut(&mut self) -> &mut TrinoQuery {
        &mut *self.query
    }
}
