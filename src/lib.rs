//! trino-link - an async client engine for the Trino HTTP statement protocol.
//!
//! A statement is submitted once and its continuation URI polled until the coordinator
//! reports no more results. Along the way the engine applies session changes signalled
//! by the coordinator, retries overloaded or unreachable coordinators, and exposes the
//! rows as a lazy, single-pass result.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod http;
pub mod logging;
pub mod protocol;
pub mod query;
pub mod request;
pub mod result;
pub mod retry;
pub mod session;
pub mod transport;

pub use auth::{Authentication, BasicAuthentication, JwtAuthentication};
pub use config::{ClientConfig, ConfigFile};
pub use error::{QueryError, Result, TransportErrorKind, TrinoError};
pub use http::{
    HttpBackend, HttpOptions, HttpRequest, HttpResponse, Method, MockBackend, ReqwestBackend,
};
pub use protocol::{Column, QueryStatus, Row};
pub use query::{QueryState, TrinoQuery};
pub use request::{TrinoRequest, TrinoRequestBuilder};
pub use result::TrinoResult;
pub use retry::{Backoff, RetryPolicy};
pub use session::ClientSession;
pub use transport::{RedirectHandler, RequestTransport};
