//! reqwest-backed HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::debug;

use super::{closed_error, HttpBackend, HttpRequest, HttpResponse, Method};
use crate::constants::DEFAULT_REQUEST_TIMEOUT;
use crate::error::{Result, TransportErrorKind, TrinoError};

/// Options for building an owned reqwest client.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpOptions {
    /// Verify TLS certificates.
    pub verify: bool,
    /// Let reqwest follow redirects itself.
    pub follow_redirects: bool,
    pub connect_timeout: Option<Duration>,
    /// Default timeout for requests that do not set their own.
    pub request_timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            verify: true,
            follow_redirects: true,
            connect_timeout: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// HTTP backend over a reqwest client.
#[derive(Debug)]
pub struct ReqwestBackend {
    client: RwLock<Option<Client>>,
    request_timeout: Duration,
}

impl ReqwestBackend {
    /// Builds a new client from options.
    pub fn new(options: &HttpOptions) -> Result<Self> {
        let mut builder = Client::builder()
            .danger_accept_invalid_certs(!options.verify)
            .redirect(if options.follow_redirects {
                Policy::default()
            } else {
                Policy::none()
            });
        if let Some(connect_timeout) = options.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TrinoError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self::from_client(client, options.request_timeout))
    }

    /// Wraps an existing reqwest client.
    pub fn from_client(client: Client, request_timeout: Duration) -> Self {
        Self {
            client: RwLock::new(Some(client)),
            request_timeout,
        }
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let client = self.client.read().await.clone().ok_or_else(closed_error)?;

        let builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
            Method::Delete => client.delete(&request.url),
        };
        let mut builder = builder
            .headers(request.headers)
            .timeout(request.timeout.unwrap_or(self.request_timeout));
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        debug!("HTTP {} {}", request.method, request.url);
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| {
            TrinoError::transport(
                TransportErrorKind::from_reqwest(&e),
                format!("Failed to read response: {}", e),
            )
        })?;
        debug!("HTTP {} {} -> {}", request.method, request.url, status);

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn close(&self) -> Result<()> {
        // Dropping the last handle to the client releases its connection pool.
        self.client.write().await.take();
        Ok(())
    }
}
