//! Client session state and protocol header encoding.
//!
//! A `ClientSession` is the per-query snapshot of who is asking (user, source), where
//! statements resolve by default (catalog, schema), and the mutable parts the coordinator
//! may change while a query runs (session properties, transaction id).

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::constants::{
    HEADER_CATALOG, HEADER_EXTRA_CREDENTIAL, HEADER_SCHEMA, HEADER_SESSION, HEADER_SOURCE,
    HEADER_TRANSACTION, HEADER_USER, NO_TRANSACTION, RESERVED_HEADERS,
};
use crate::error::{Result, TrinoError};

fn extra_credential_key_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[^\s=]+$").expect("extra credential key regex is valid"))
}

/// Session state sent with every request of a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientSession {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub source: Option<String>,
    pub user: String,
    properties: HashMap<String, String>,
    headers: HashMap<String, String>,
    transaction_id: Option<String>,
    extra_credential: Vec<(String, String)>,
}

impl ClientSession {
    /// Creates a session for the given user with no catalog, schema or properties.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
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

    pub fn with_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.properties = properties;
        self
    }

    /// Sets caller-supplied headers merged into every request.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: Option<String>) -> Self {
        self.set_transaction_id(transaction_id);
        self
    }

    pub fn with_extra_credential(mut self, extra_credential: Vec<(String, String)>) -> Self {
        self.extra_credential = extra_credential;
        self
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn extra_credential(&self) -> &[(String, String)] {
        &self.extra_credential
    }

    /// Current transaction id, `None` when no transaction is open.
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    /// Sets the transaction id. The `NONE` sentinel is normalized to no transaction.
    pub fn set_transaction_id(&mut self, transaction_id: Option<String>) {
        self.transaction_id = transaction_id.filter(|id| id != NO_TRANSACTION);
    }

    /// Inserts or replaces a session property.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        debug!("Setting session property {}={}", name, value);
        self.properties.insert(name, value);
    }

    /// Removes a session property. Removing an unknown property is a no-op.
    pub fn clear_property(&mut self, name: &str) -> Option<String> {
        debug!("Clearing session property {}", name);
        self.properties.remove(name)
    }

    /// Builds the full protocol header set for a request.
    ///
    /// Fails with a configuration error when a custom header overrides a reserved one,
    /// a property name contains `=`, or an extra credential key is invalid.
    pub fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        insert_optional(&mut headers, HEADER_CATALOG, self.catalog.as_deref())?;
        insert_optional(&mut headers, HEADER_SCHEMA, self.schema.as_deref())?;
        insert_optional(&mut headers, HEADER_SOURCE, self.source.as_deref())?;
        insert_optional(&mut headers, HEADER_USER, Some(&self.user))?;

        if !self.properties.is_empty() {
            let session = encode_session_properties(&self.properties)?;
            insert_optional(&mut headers, HEADER_SESSION, Some(&session))?;
        }

        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TrinoError::config(format!("invalid HTTP header name {name}: {e}")))?;
            if RESERVED_HEADERS.contains(&header_name.as_str()) {
                return Err(TrinoError::config(format!(
                    "cannot override reserved HTTP header {name}"
                )));
            }
            headers.insert(header_name, header_value(name, value)?);
        }

        insert_optional(
            &mut headers,
            HEADER_TRANSACTION,
            Some(self.transaction_id().unwrap_or(NO_TRANSACTION)),
        )?;

        if !self.extra_credential.is_empty() {
            let credentials = encode_extra_credential(&self.extra_credential)?;
            insert_optional(&mut headers, HEADER_EXTRA_CREDENTIAL, Some(&credentials))?;
        }

        Ok(headers)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| TrinoError::config(format!("invalid value for HTTP header {name}: {e}")))
}

fn insert_optional(headers: &mut HeaderMap, name: &'static str, value: Option<&str>) -> Result<()> {
    if let Some(value) = value {
        headers.insert(HeaderName::from_static(name), header_value(name, value)?);
    }
    Ok(())
}

/// Encodes session properties as `name=url-encoded-value` pairs joined by `,`.
pub fn encode_session_properties(properties: &HashMap<String, String>) -> Result<String> {
    let mut entries = Vec::with_capacity(properties.len());
    for (name, value) in properties {
        if name.contains('=') {
            return Err(TrinoError::config(format!(
                "session property name must not contain '=': {name}"
            )));
        }
        entries.push(format!("{}={}", name, urlencoding::encode(value)));
    }
    Ok(entries.join(","))
}

/// Checks that an extra credential key is ASCII, non-empty and free of whitespace and `=`.
pub fn verify_extra_credential(key: &str) -> Result<()> {
    if !key.is_ascii() {
        return Err(TrinoError::config(format!(
            "only ASCII characters are allowed in extra credential '{key}'"
        )));
    }
    if !extra_credential_key_regex().is_match(key) {
        return Err(TrinoError::config(format!(
            "whitespace or '=' are disallowed in extra credential '{key}'"
        )));
    }
    Ok(())
}

/// Encodes extra credentials as a comma-separated list of `key=form-encoded-value`.
pub fn encode_extra_credential(credentials: &[(String, String)]) -> Result<String> {
    let mut entries = Vec::with_capacity(credentials.len());
    for (key, value) in credentials {
        verify_extra_credential(key)?;
        let encoded: String = url::form_urlencoded::byte_serialize(value.as_bytes()).collect();
        entries.push(format!("{key}={encoded}"));
    }
    Ok(entries.join(", "))
}

/// Splits a comma-separated header value into trimmed entries.
pub fn header_values(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Parses a `key=url-encoded-value` list as sent in the set-session header.
pub fn parse_session_properties(value: &str) -> Result<Vec<(String, String)>> {
    header_values(value)
        .into_iter()
        .map(|entry| {
            let (key, raw) = entry.split_once('=').ok_or_else(|| {
                TrinoError::protocol(format!("malformed session property entry: {entry}"))
            })?;
            let decoded = urlencoding::decode(raw.trim()).map_err(|e| {
                TrinoError::protocol(format!("session property {key} is not valid UTF-8: {e}"))
            })?;
            Ok((key.trim().to_string(), decoded.into_owned()))
        })
        .collect()
}
