//! A session paired with its transport.
//!
//! `TrinoRequest` owns the [`ClientSession`] and the [`RequestTransport`] for one query
//! lifecycle, tracks the current continuation URI, and routes every response through
//! the protocol processor so session mutations land on the session that sent them.
//!
//! ```rust,no_run
//! use trino_link::{ClientConfig, TrinoQuery, TrinoRequest};
//!
//! # async fn example() -> trino_link::Result<()> {
//! let config = ClientConfig::new("coordinator", 8080, "alice").with_catalog("hive");
//! let request = TrinoRequest::builder(config).build()?;
//! let mut query = TrinoQuery::new(request, "SELECT 1");
//! let rows = query.execute(None).await?.fetch_all().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use reqwest::header::HeaderMap;
use tracing::debug;

use crate::auth::Authentication;
use crate::config::ClientConfig;
use crate::constants::URL_STATEMENT_PATH;
use crate::error::Result;
use crate::http::{HttpBackend, HttpOptions, HttpResponse};
use crate::protocol::{self, QueryStatus};
use crate::retry::{Backoff, RetryPolicy};
use crate::session::ClientSession;
use crate::transport::{RedirectHandler, RequestTransport};

/// Session state and transport for one query lifecycle.
pub struct TrinoRequest {
    session: ClientSession,
    transport: RequestTransport,
    base_url: String,
    next_uri: Option<String>,
}

impl TrinoRequest {
    /// Create a new builder. The configuration is validated by `build`.
    pub fn builder(config: ClientConfig) -> TrinoRequestBuilder {
        TrinoRequestBuilder::new(config)
    }

    /// Assembles a request from parts.
    pub fn from_parts(
        session: ClientSession,
        transport: RequestTransport,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            session,
            transport,
            base_url: base_url.into(),
            next_uri: None,
        }
    }

    /// Creates a fresh request with a copy of the current session.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self::from_parts(
            self.session.clone(),
            self.transport.try_clone()?,
            self.base_url.clone(),
        ))
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ClientSession {
        &mut self.session
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.session.transaction_id()
    }

    pub fn set_transaction_id(&mut self, transaction_id: Option<String>) {
        self.session.set_transaction_id(transaction_id);
    }

    pub fn max_attempts(&self) -> u32 {
        self.transport.max_attempts()
    }

    pub fn set_max_attempts(&mut self, max_attempts: u32) {
        self.transport.set_max_attempts(max_attempts);
    }

    pub fn transport(&self) -> &RequestTransport {
        &self.transport
    }

    /// Protocol headers for the current session state.
    pub fn http_headers(&self) -> Result<HeaderMap> {
        self.session.build_headers()
    }

    /// Absolute URL for a coordinator path.
    pub fn get_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn statement_url(&self) -> String {
        self.get_url(URL_STATEMENT_PATH)
    }

    /// Continuation URI from the last processed response.
    pub fn next_uri(&self) -> Option<&str> {
        self.next_uri.as_deref()
    }

    /// Submits a statement. `additional_headers` apply to this request only.
    pub async fn post(
        &self,
        sql: &str,
        additional_headers: Option<&HeaderMap>,
    ) -> Result<HttpResponse> {
        let mut headers = self.http_headers()?;
        if let Some(extra) = additional_headers {
            for (name, value) in extra {
                headers.insert(name.clone(), value.clone());
            }
        }
        self.transport
            .post(&self.statement_url(), sql.as_bytes().to_vec(), &headers)
            .await
    }

    /// Polls an absolute continuation URI.
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        let headers = self.http_headers()?;
        self.transport.get(url, &headers).await
    }

    /// Sends a DELETE, e.g. to cancel a query.
    pub async fn delete(&self, url: &str) -> Result<HttpResponse> {
        let headers = self.http_headers()?;
        self.transport.delete(url, &headers).await
    }

    /// Processes a response and records its continuation URI.
    pub fn process(&mut self, response: &HttpResponse) -> Result<QueryStatus> {
        let status = protocol::process_response(&mut self.session, response)?;
        self.next_uri = status.next_uri.clone();
        Ok(status)
    }

    /// Releases the HTTP client if this request created it.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}

/// Builder for [`TrinoRequest`].
pub struct TrinoRequestBuilder {
    config: ClientConfig,
    auth: Option<Arc<dyn Authentication>>,
    redirect_handler: Option<Arc<dyn RedirectHandler>>,
    backend: Option<Arc<dyn HttpBackend>>,
    backoff: Backoff,
}

impl TrinoRequestBuilder {
    fn new(config: ClientConfig) -> Self {
        Self {
            config,
            auth: None,
            redirect_handler: None,
            backend: None,
            backoff: Backoff::default(),
        }
    }

    /// Set the authentication backend.
    pub fn auth(mut self, auth: Arc<dyn Authentication>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Follow statement redirects through `handler` instead of the HTTP client.
    pub fn redirect_handler(mut self, handler: Arc<dyn RedirectHandler>) -> Self {
        self.redirect_handler = Some(handler);
        self
    }

    /// Use a caller-supplied HTTP backend. It is shared, never closed by the request.
    pub fn http_backend(mut self, backend: Arc<dyn HttpBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Override the backoff between retry attempts.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Validates the configuration and builds the request.
    ///
    /// Fails with a configuration error before any network activity.
    pub fn build(self) -> Result<TrinoRequest> {
        self.config.validate(self.auth.is_some())?;

        let session = self.config.to_session();
        // Surface header mistakes (reserved names, bad credential keys) up front.
        session.build_headers()?;

        let options = HttpOptions {
            verify: self.config.verify,
            follow_redirects: self.redirect_handler.is_none(),
            connect_timeout: self.config.connect_timeout(),
            request_timeout: self.config.request_timeout(),
        };
        let retry = RetryPolicy::new(self.config.max_attempts).with_backoff(self.backoff);

        let transport = match self.backend {
            Some(backend) => RequestTransport::with_backend(
                backend,
                options,
                retry,
                self.auth,
                self.redirect_handler,
            )?,
            None => RequestTransport::new(options, retry, self.auth, self.redirect_handler)?,
        };

        let base_url = self.config.base_url();
        debug!("Built request for {} as {}", base_url, session.user);
        Ok(TrinoRequest::from_parts(session, transport, base_url))
    }
}
