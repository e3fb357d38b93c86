//! Request transport: authentication, retries and redirects on top of an HTTP backend.
//!
//! Every GET/POST/DELETE goes through the same retry policy. When a redirect handler is
//! installed the transport follows redirects itself: statement submission resends the
//! body to the location chosen by the handler, while polls and cancellations follow
//! `Location` directly. Without a handler the backend follows redirects on its own.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, LOCATION};
use tracing::{debug, info};
use url::Url;

use crate::auth::Authentication;
use crate::constants::MAX_REDIRECTS;
use crate::error::{Result, TrinoError};
use crate::http::{
    closed_error, HttpBackend, HttpOptions, HttpRequest, HttpResponse, Method, ReqwestBackend,
};
use crate::retry::RetryPolicy;

/// Resolves a redirect `Location` into the URL the statement is resent to.
pub trait RedirectHandler: Send + Sync {
    fn handle(&self, location: &str) -> Result<String>;
}

impl<F> RedirectHandler for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn handle(&self, location: &str) -> Result<String> {
        self(location)
    }
}

/// HTTP transport for one session.
pub struct RequestTransport {
    backend: Option<Arc<dyn HttpBackend>>,
    owns_backend: bool,
    options: HttpOptions,
    auth: Option<Arc<dyn Authentication>>,
    auth_headers: HeaderMap,
    retry: RetryPolicy,
    redirect_handler: Option<Arc<dyn RedirectHandler>>,
}

/// Resolves a `Location` header against the URL that returned it.
fn resolve_location(current: &str, location: &str) -> Result<String> {
    Url::parse(current)
        .and_then(|base| base.join(location))
        .map(String::from)
        .map_err(|e| TrinoError::Redirect(format!("invalid redirect location {location}: {e}")))
}

impl RequestTransport {
    /// Creates a transport that owns a new reqwest client built from `options`.
    ///
    /// reqwest's own redirect following is disabled when a redirect handler is given.
    pub fn new(
        mut options: HttpOptions,
        retry: RetryPolicy,
        auth: Option<Arc<dyn Authentication>>,
        redirect_handler: Option<Arc<dyn RedirectHandler>>,
    ) -> Result<Self> {
        options.follow_redirects = redirect_handler.is_none();
        let backend: Arc<dyn HttpBackend> = Arc::new(ReqwestBackend::new(&options)?);
        Self::assemble(backend, true, options, retry, auth, redirect_handler)
    }

    /// Creates a transport over a caller-supplied backend. The backend is never closed
    /// by this transport.
    pub fn with_backend(
        backend: Arc<dyn HttpBackend>,
        options: HttpOptions,
        retry: RetryPolicy,
        auth: Option<Arc<dyn Authentication>>,
        redirect_handler: Option<Arc<dyn RedirectHandler>>,
    ) -> Result<Self> {
        Self::assemble(backend, false, options, retry, auth, redirect_handler)
    }

    fn assemble(
        backend: Arc<dyn HttpBackend>,
        owns_backend: bool,
        options: HttpOptions,
        mut retry: RetryPolicy,
        auth: Option<Arc<dyn Authentication>>,
        redirect_handler: Option<Arc<dyn RedirectHandler>>,
    ) -> Result<Self> {
        let mut auth_headers = HeaderMap::new();
        if let Some(auth) = &auth {
            auth.attach(&mut auth_headers)?;
            retry = retry.with_retryable_errors(auth.retryable_errors());
        }

        Ok(Self {
            backend: Some(backend),
            owns_backend,
            options,
            auth,
            auth_headers,
            retry,
            redirect_handler,
        })
    }

    /// Creates an independent transport with the same settings.
    ///
    /// An owned client is rebuilt; a caller-supplied backend is shared, still unowned.
    pub fn try_clone(&self) -> Result<Self> {
        if self.owns_backend {
            Self::new(
                self.options.clone(),
                self.retry.clone(),
                self.auth.clone(),
                self.redirect_handler.clone(),
            )
        } else {
            let backend = self.backend.clone().ok_or_else(closed_error)?;
            Self::with_backend(
                backend,
                self.options.clone(),
                self.retry.clone(),
                self.auth.clone(),
                self.redirect_handler.clone(),
            )
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts()
    }

    pub fn set_max_attempts(&mut self, max_attempts: u32) {
        self.retry.set_max_attempts(max_attempts);
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn request_timeout(&self) -> Duration {
        self.options.request_timeout
    }

    pub fn owns_backend(&self) -> bool {
        self.owns_backend
    }

    pub fn is_closed(&self) -> bool {
        self.backend.is_none()
    }

    /// Submits a statement, following redirects through the handler when one is set.
    pub async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: &HeaderMap,
    ) -> Result<HttpResponse> {
        self.send_following(Method::Post, url, headers, Some(body.as_slice()))
            .await
    }

    /// Polls a continuation URI.
    pub async fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse> {
        self.send_following(Method::Get, url, headers, None).await
    }

    /// Issues a DELETE (query cancellation).
    pub async fn delete(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse> {
        self.send_following(Method::Delete, url, headers, None).await
    }

    /// Sends a request and follows redirects when the backend does not.
    ///
    /// Only statement submission goes through the redirect handler. Polls and
    /// cancellations follow `Location` as given, resolved against the current URL.
    async fn send_following(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse> {
        let mut response = self.send(method, url, headers, body).await?;

        let Some(handler) = &self.redirect_handler else {
            return Ok(response);
        };

        let mut current = url.to_string();
        let mut hops = 0;
        while response.is_redirect() {
            if hops >= MAX_REDIRECTS {
                return Err(TrinoError::Redirect(format!(
                    "exceeded {MAX_REDIRECTS} redirects for {method} {url}"
                )));
            }
            let location = response
                .header(LOCATION.as_str())
                .map(str::to_string)
                .ok_or_else(|| TrinoError::Redirect("Location header is not valid UTF-8".into()))?;
            let target = match method {
                Method::Post => handler.handle(&location)?,
                Method::Get | Method::Delete => resolve_location(&current, &location)?,
            };
            info!("redirect {} from {} to {}", response.status, location, target);

            response = self.send(method, &target, headers, body).await?;
            current = target;
            hops += 1;
        }
        Ok(response)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse> {
        let backend = self.backend.as_ref().ok_or_else(closed_error)?;

        let mut merged = self.auth_headers.clone();
        for (name, value) in headers {
            merged.insert(name.clone(), value.clone());
        }

        let mut request = HttpRequest::new(method, url)
            .with_headers(merged)
            .with_timeout(self.options.request_timeout);
        if let Some(body) = body {
            request = request.with_body(body.to_vec());
        }

        self.retry
            .run(|| {
                let request = request.clone();
                async move { backend.send(request).await }
            })
            .await
    }

    /// Closes the transport. Idempotent.
    ///
    /// The HTTP client is released only if this transport created it; a caller-supplied
    /// backend stays open for its other users. Either way later requests fail.
    pub async fn close(&mut self) -> Result<()> {
        let Some(backend) = self.backend.take() else {
            return Ok(());
        };
        if self.owns_backend {
            debug!("Closing HTTP client");
            backend.close().await?;
        } else {
            debug!("Leaving caller-supplied HTTP client open");
        }
        Ok(())
    }
}
