//! Protocol constants shared by the request, transport and processing layers.

use std::time::Duration;

/// Default coordinator port.
pub const DEFAULT_PORT: u16 = 8080;

/// Port that implies `https` when no scheme is configured.
pub const DEFAULT_TLS_PORT: u16 = 443;

pub const HTTP: &str = "http";
pub const HTTPS: &str = "https";

/// Default number of attempts per HTTP call. An attempt is one request, so 3 means 2 retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sentinel transaction id sent when no transaction is open.
pub const NO_TRANSACTION: &str = "NONE";

pub const URL_STATEMENT_PATH: &str = "/v1/statement";
pub const URL_QUERY_PATH: &str = "/v1/query";

// Header names are kept lowercase so they can be used with `HeaderName::from_static`.
pub const HEADER_CATALOG: &str = "x-trino-catalog";
pub const HEADER_SCHEMA: &str = "x-trino-schema";
pub const HEADER_SOURCE: &str = "x-trino-source";
pub const HEADER_USER: &str = "x-trino-user";
pub const HEADER_SESSION: &str = "x-trino-session";
pub const HEADER_SET_SESSION: &str = "x-trino-set-session";
pub const HEADER_CLEAR_SESSION: &str = "x-trino-clear-session";
pub const HEADER_TRANSACTION: &str = "x-trino-transaction-id";
pub const HEADER_STARTED_TRANSACTION: &str = "x-trino-started-transaction-id";
pub const HEADER_CLEAR_TRANSACTION: &str = "x-trino-clear-transaction-id";
pub const HEADER_EXTRA_CREDENTIAL: &str = "x-trino-extra-credential";

/// Headers owned by the protocol. Callers may not override them with custom headers.
pub const RESERVED_HEADERS: &[&str] = &[
    HEADER_CATALOG,
    HEADER_SCHEMA,
    HEADER_SOURCE,
    HEADER_USER,
    HEADER_SESSION,
    HEADER_TRANSACTION,
    HEADER_EXTRA_CREDENTIAL,
];

/// Upper bound on redirect hops the transport follows for one statement submission.
pub const MAX_REDIRECTS: usize = 10;

/// Maximum number of body characters kept on a generic HTTP error.
pub const ERROR_BODY_SNIPPET_LEN: usize = 1000;
