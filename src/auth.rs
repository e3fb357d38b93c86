//! Authentication backends for the coordinator.
//!
//! An authentication backend is applied once when the transport is built: it installs
//! its credentials into the transport's default headers and may widen the set of
//! transport failures the retry policy treats as transient.

use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::error::{Result, TransportErrorKind, TrinoError};

/// Capability every authentication backend provides to the transport.
pub trait Authentication: Send + Sync + fmt::Debug {
    /// Installs credentials into the headers sent with every request.
    fn attach(&self, headers: &mut HeaderMap) -> Result<()>;

    /// Additional transport failure kinds that should be retried.
    fn retryable_errors(&self) -> Vec<TransportErrorKind> {
        Vec::new()
    }
}

/// HTTP Basic authentication (RFC 7617).
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuthentication {
    username: String,
    password: String,
}

impl BasicAuthentication {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BasicAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthentication")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Authentication for BasicAuthentication {
    fn attach(&self, headers: &mut HeaderMap) -> Result<()> {
        let credentials = format!("{}:{}", self.username, self.password);
        let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
        headers.insert(AUTHORIZATION, sensitive_value(&format!("Basic {encoded}"))?);
        Ok(())
    }
}

/// Bearer token (JWT) authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct JwtAuthentication {
    token: String,
}

impl JwtAuthentication {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for JwtAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtAuthentication")
            .field("token", &"***")
            .finish()
    }
}

impl Authentication for JwtAuthentication {
    fn attach(&self, headers: &mut HeaderMap) -> Result<()> {
        headers.insert(
            AUTHORIZATION,
            sensitive_value(&format!("Bearer {}", self.token))?,
        );
        Ok(())
    }
}

fn sensitive_value(value: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| TrinoError::config("credentials contain characters not allowed in HTTP headers"))?;
    value.set_sensitive(true);
    Ok(value)
}
