//! Mock HTTP backend for testing.
//!
//! Replays scripted responses in order and records every request it receives.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{HttpBackend, HttpRequest, HttpResponse};
use crate::error::{Result, TransportErrorKind, TrinoError};

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<Result<HttpResponse>>,
    requests: Vec<HttpRequest>,
    close_calls: usize,
}

/// A mock HTTP backend that returns predefined outcomes.
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    /// Creates a backend with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that will return the given responses in order.
    pub fn with_responses(responses: impl IntoIterator<Item = HttpResponse>) -> Self {
        let backend = Self::new();
        for response in responses {
            backend.push_response(response);
        }
        backend
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues a response.
    pub fn push_response(&self, response: HttpResponse) {
        self.state().script.push_back(Ok(response));
    }

    /// Queues a transport failure.
    pub fn push_error(&self, kind: TransportErrorKind, message: impl Into<String>) {
        self.state()
            .script
            .push_back(Err(TrinoError::transport(kind, message)));
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    /// Number of scripted outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.state().script.len()
    }

    pub fn close_count(&self) -> usize {
        self.state().close_calls
    }
}

#[async_trait]
impl HttpBackend for MockBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut state = self.state();
        state.requests.push(request);
        state.script.pop_front().unwrap_or_else(|| {
            Err(TrinoError::transport(
                TransportErrorKind::Other,
                "mock backend has no scripted response",
            ))
        })
    }

    async fn close(&self) -> Result<()> {
        self.state().close_calls += 1;
        Ok(())
    }
}
