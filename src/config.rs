//! Configuration management for trino-link.
//!
//! Handles loading coordinator settings from TOML files, with support for named
//! coordinators, and validates a configuration before anything touches the network.

use crate::constants::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TLS_PORT, HTTP, HTTPS,
};
use crate::error::{Result, TrinoError};
use crate::session::ClientSession;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

/// Environment variable requesting a SOCKS proxy.
pub const SOCKS_PROXY_ENV: &str = "SOCKS_PROXY";

/// Configuration file with named coordinators.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Named coordinator connections.
    #[serde(default)]
    pub coordinators: HashMap<String, ClientConfig>,
}

/// Connection settings for one coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Coordinator host.
    pub host: String,

    /// Coordinator port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// User the queries run as.
    pub user: String,

    pub source: Option<String>,
    pub catalog: Option<String>,
    pub schema: Option<String>,

    /// Initial session properties.
    #[serde(default)]
    pub session_properties: HashMap<String, String>,

    /// Custom headers sent with every request.
    #[serde(default)]
    pub http_headers: HashMap<String, String>,

    /// Transaction to join, if any.
    pub transaction_id: Option<String>,

    /// Extra credentials forwarded to connectors, as `[key, value]` pairs.
    #[serde(default)]
    pub extra_credential: Vec<(String, String)>,

    /// `http` or `https`. Inferred from the port when unset.
    pub http_scheme: Option<String>,

    /// Attempts per HTTP call; 1 disables retries.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    pub connect_timeout_secs: Option<u64>,

    /// Verify TLS certificates.
    #[serde(default = "default_verify")]
    pub verify: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_verify() -> bool {
    true
}

/// Fails when a SOCKS proxy is requested; SOCKS is not supported.
pub fn check_socks_proxy(value: Option<&str>) -> Result<()> {
    match value {
        Some(proxy) if !proxy.trim().is_empty() => Err(TrinoError::config(format!(
            "SOCKS5 proxy support is not implemented ({SOCKS_PROXY_ENV}={proxy})"
        ))),
        _ => Ok(()),
    }
}

impl ClientConfig {
    /// Creates a config with defaults for everything but host, port and user.
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            source: None,
            catalog: None,
            schema: None,
            session_properties: HashMap::new(),
            http_headers: HashMap::new(),
            transaction_id: None,
            extra_credential: Vec::new(),
            http_scheme: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: None,
            verify: true,
        }
    }

    /// Parses `trino://user@host:port/catalog/schema?source=...`.
    ///
    /// `http://` and `https://` URLs are accepted too and pin the scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| TrinoError::config(format!("Invalid URL: {e}")))?;

        let http_scheme = match url.scheme() {
            "trino" => None,
            HTTP => Some(HTTP.to_string()),
            HTTPS => Some(HTTPS.to_string()),
            other => {
                return Err(TrinoError::config(format!(
                    "Invalid scheme '{other}'. Expected 'trino', 'http' or 'https'"
                )))
            }
        };

        let host = url
            .host_str()
            .ok_or_else(|| TrinoError::config("URL has no host"))?
            .to_string();
        let port = url.port().unwrap_or(match http_scheme.as_deref() {
            Some(HTTPS) => DEFAULT_TLS_PORT,
            _ => DEFAULT_PORT,
        });
        if url.username().is_empty() {
            return Err(TrinoError::config("URL has no user"));
        }

        let mut config = Self::new(host, port, url.username());
        config.http_scheme = http_scheme;

        let mut segments = url
            .path_segments()
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty());
        config.catalog = segments.next().map(String::from);
        config.schema = segments.next().map(String::from);

        for (key, value) in url.query_pairs() {
            if key == "source" {
                config.source = Some(value.into_owned());
            }
        }

        Ok(config)
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_http_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.http_scheme = Some(scheme.into());
        self
    }

    pub fn with_session_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.session_properties = properties;
        self
    }

    pub fn with_http_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.http_headers = headers;
        self
    }

    pub fn with_extra_credential(mut self, extra_credential: Vec<(String, String)>) -> Self {
        self.extra_credential = extra_credential;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_request_timeout(mut self, timeout_secs: u64) -> Self {
        self.request_timeout_secs = timeout_secs;
        self
    }

    /// Scheme to use: the configured one, else `https` on the TLS port, else `http`.
    pub fn effective_scheme(&self) -> &str {
        match self.http_scheme.as_deref() {
            Some(scheme) => scheme,
            None if self.port == DEFAULT_TLS_PORT => HTTPS,
            None => HTTP,
        }
    }

    /// Coordinator base URL, e.g. `https://coordinator:443`.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.effective_scheme(), self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    /// Builds the initial session state.
    pub fn to_session(&self) -> ClientSession {
        let mut session = ClientSession::new(self.user.clone())
            .with_properties(self.session_properties.clone())
            .with_headers(self.http_headers.clone())
            .with_transaction_id(self.transaction_id.clone())
            .with_extra_credential(self.extra_credential.clone());
        session.catalog = self.catalog.clone();
        session.schema = self.schema.clone();
        session.source = self.source.clone();
        session
    }

    /// Validates the configuration, including the process environment.
    pub fn validate(&self, has_auth: bool) -> Result<()> {
        self.validate_settings(has_auth)?;
        check_socks_proxy(std::env::var(SOCKS_PROXY_ENV).ok().as_deref())
    }

    /// Validates the configuration values themselves.
    pub fn validate_settings(&self, has_auth: bool) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(TrinoError::config("host is required"));
        }
        if self.user.trim().is_empty() {
            return Err(TrinoError::config("user is required"));
        }
        if self.max_attempts == 0 {
            return Err(TrinoError::config("max_attempts must be at least 1"));
        }
        if let Some(scheme) = self.http_scheme.as_deref() {
            if scheme != HTTP && scheme != HTTPS {
                return Err(TrinoError::config(format!(
                    "Invalid http_scheme '{scheme}'. Expected 'http' or 'https'"
                )));
            }
        }
        if has_auth && self.effective_scheme() == HTTP {
            return Err(TrinoError::config("cannot use authentication with HTTP"));
        }
        Ok(())
    }
}

impl ConfigFile {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trino-link")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields an empty config.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| TrinoError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            TrinoError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Gets a named coordinator, or the default one if name is None.
    pub fn get_coordinator(&self, name: Option<&str>) -> Option<&ClientConfig> {
        let key = name.unwrap_or("default");
        self.coordinators.get(key)
    }
}
