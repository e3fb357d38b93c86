//! Error types for trino-link.
//!
//! Transport failures, HTTP status failures, server-reported query failures and
//! configuration mistakes are kept apart so callers can tell them apart and so the
//! retry policy only ever retries what can succeed on a second attempt.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Kind of a transport-level failure (no HTTP response was obtained).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connection refused, reset or dropped before a response arrived.
    Connect,
    /// Connect or read timeout.
    Timeout,
    /// Request could not be built.
    Request,
    /// Response body could not be read.
    Body,
    /// Anything else reported by the HTTP client.
    Other,
}

/// Kinds retried by default.
pub const DEFAULT_RETRYABLE_KINDS: [TransportErrorKind; 2] =
    [TransportErrorKind::Connect, TransportErrorKind::Timeout];

impl TransportErrorKind {
    /// Classifies a reqwest error.
    ///
    /// A failure while sending (reset, aborted or dropped connection) counts as a
    /// connection failure: no response was received.
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() || error.is_request() {
            Self::Connect
        } else if error.is_body() || error.is_decode() {
            Self::Body
        } else if error.is_builder() {
            Self::Request
        } else {
            Self::Other
        }
    }

    /// Whether the default retry policy retries this kind.
    pub fn is_transient(&self) -> bool {
        DEFAULT_RETRYABLE_KINDS.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Request => "request",
            Self::Body => "body",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of an error inside the submitted statement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLocation {
    pub line_number: u32,
    pub column_number: u32,
}

/// Error reported by the coordinator in the `error` field of a response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryError {
    #[serde(default)]
    pub message: String,
    pub error_name: Option<String>,
    pub error_code: Option<i64>,
    pub error_type: Option<String>,
    pub error_location: Option<ErrorLocation>,
    pub failure_info: Option<serde_json::Value>,
    /// Query the error belongs to, when known.
    #[serde(skip)]
    pub query_id: Option<String>,
}

impl QueryError {
    /// Creates an error with only a message, for failures raised on the client side.
    pub fn new(message: impl Into<String>, query_id: Option<String>) -> Self {
        Self {
            message: message.into(),
            error_name: None,
            error_code: None,
            error_type: None,
            error_location: None,
            failure_info: None,
            query_id,
        }
    }

    /// Java exception type recorded in the failure info, if any.
    pub fn error_exception(&self) -> Option<&str> {
        self.failure_info
            .as_ref()
            .and_then(|info| info.get("type"))
            .and_then(|t| t.as_str())
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (name={}, type={}, query_id={})",
            self.message,
            self.error_name.as_deref().unwrap_or("-"),
            self.error_type.as_deref().unwrap_or("-"),
            self.query_id.as_deref().unwrap_or("-"),
        )?;
        if let Some(location) = &self.error_location {
            write!(
                f,
                " at line {}, column {}",
                location.line_number, location.column_number
            )?;
        }
        Ok(())
    }
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

fn display_id(query_id: &Option<String>) -> &str {
    query_id.as_deref().unwrap_or("-")
}

/// Main error type for trino-link operations.
#[derive(Error, Debug)]
pub enum TrinoError {
    /// No response was obtained (connection refused, timeout, reset, ...).
    #[error("Transport error ({kind}): {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },

    /// HTTP 503 from the coordinator after the retry budget was spent.
    #[error("error 503: service unavailable")]
    ServiceUnavailable,

    /// HTTP 504 from the coordinator after the retry budget was spent.
    #[error("error 504: gateway timeout")]
    GatewayTimeout,

    /// Any other unsuccessful HTTP status.
    #[error("error {status}{}", body_suffix(.body))]
    Http { status: u16, body: String },

    /// Query failed because of an external system (connector, storage, ...).
    #[error("External error: {0}")]
    External(QueryError),

    /// Query failed because of the user (bad SQL, missing table, ...).
    #[error("User error: {0}")]
    User(QueryError),

    /// Any other query failure reported by the coordinator.
    #[error("Query error: {0}")]
    Query(QueryError),

    /// Invalid client configuration, raised before any network activity.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response did not follow the protocol (bad JSON, malformed headers).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The query was cancelled on this client.
    #[error("Query has been cancelled (query_id={})", display_id(.query_id))]
    Cancelled { query_id: Option<String> },

    /// Operation is not valid in the current query or transport state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Redirect could not be followed.
    #[error("Redirect error: {0}")]
    Redirect(String),
}

impl TrinoError {
    /// Creates a transport error.
    pub fn transport(kind: TransportErrorKind, msg: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: msg.into(),
        }
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a protocol error with the given message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Creates an invalid state error with the given message.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Returns the server-reported error, for the three query error variants.
    pub fn query_error(&self) -> Option<&QueryError> {
        match self {
            Self::External(e) | Self::User(e) | Self::Query(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the default retry policy retries this error: connection failures,
    /// timeouts, 503 and 504.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { kind, .. } => kind.is_transient(),
            Self::ServiceUnavailable | Self::GatewayTimeout => true,
            _ => false,
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "Transport Error",
            Self::ServiceUnavailable | Self::GatewayTimeout | Self::Http { .. } => "HTTP Error",
            Self::External(_) => "External Error",
            Self::User(_) => "User Error",
            Self::Query(_) => "Query Error",
            Self::Config(_) => "Configuration Error",
            Self::Protocol(_) => "Protocol Error",
            Self::Cancelled { .. } => "Cancelled",
            Self::InvalidState(_) => "Invalid State",
            Self::Redirect(_) => "Redirect Error",
        }
    }
}

impl From<reqwest::Error> for TrinoError {
    fn from(error: reqwest::Error) -> Self {
        Self::transport(TransportErrorKind::from_reqwest(&error), error.to_string())
    }
}

/// Result type alias using TrinoError.
pub type Result<T> = std::result::Result<T, TrinoError>;
