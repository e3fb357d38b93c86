//! Integration tests for trino-link.

pub mod common;
pub mod live_test;
pub mod query_test;
pub mod retry_test;
pub mod session_test;
