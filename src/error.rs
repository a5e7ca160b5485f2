//! Error types for the Quickbase client
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use crate::types::RateLimitInfo;
use thiserror::Error;

/// The main error type for the Quickbase client
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    /// A 401 the active strategy could not recover from, or a failed token fetch
    #[error("Authentication failed (HTTP {status}): {message}")]
    Authentication {
        status: u16,
        message: String,
        dbid: Option<String>,
    },

    #[error("Authentication error: {message}")]
    Auth { message: String },

    #[error("Ticket expired; construct a new client to authenticate again")]
    TicketExpired,

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited on {} (attempt {}), retry after {}", .info.url, .info.attempt, retry_after_text(.info))]
    RateLimit { info: RateLimitInfo },

    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64, url: String },

    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Any other non-2xx response
    #[error("Quickbase error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        description: Option<String>,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Caller / configuration defects (never retried)
    // ============================================================================
    #[error("{message}")]
    Schema {
        message: String,
        suggestion: Option<String>,
        available: Vec<String>,
    },

    #[error("Read-only mode: {} is blocked", read_only_target(.method, .path, .action))]
    ReadOnly {
        method: String,
        path: Option<String>,
        action: Option<String>,
    },

    // ============================================================================
    // Legacy XML transport
    // ============================================================================
    #[error("XML parsing error: {message}")]
    XmlParse { message: String },

    #[error("Quickbase XML error {code}: {text}")]
    XmlApi {
        code: i64,
        text: String,
        detail: Option<String>,
    },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

fn retry_after_text(info: &RateLimitInfo) -> String {
    match info.retry_after {
        Some(secs) => format!("{secs}s"),
        None => "an unspecified delay".to_string(),
    }
}

fn read_only_target(method: &str, path: &Option<String>, action: &Option<String>) -> String {
    match (path, action) {
        (_, Some(action)) => format!("{method} {action}"),
        (Some(path), None) => format!("{method} {path}"),
        (None, None) => method.to_string(),
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create an authentication failure carrying the HTTP status
    pub fn authentication(status: u16, message: impl Into<String>, dbid: Option<&str>) -> Self {
        Self::Authentication {
            status,
            message: message.into(),
            dbid: dbid.map(String::from),
        }
    }

    /// Create a generic API error
    pub fn api(status: u16, message: impl Into<String>, description: Option<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            description,
        }
    }

    /// Create a read-only error for a JSON API path
    pub fn read_only_path(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::ReadOnly {
            method: method.into(),
            path: Some(path.into()),
            action: None,
        }
    }

    /// Create a read-only error for a legacy XML action
    pub fn read_only_action(action: impl Into<String>) -> Self {
        Self::ReadOnly {
            method: "POST".to_string(),
            path: None,
            action: Some(action.into()),
        }
    }

    /// Create an XML parse error
    pub fn xml_parse(message: impl Into<String>) -> Self {
        Self::XmlParse {
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimit { .. } | Error::Timeout { .. } | Error::Server { .. } => true,
            Error::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    /// HTTP status associated with this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Authentication { status, .. }
            | Error::Server { status, .. }
            | Error::Api { status, .. } => Some(*status),
            Error::RateLimit { .. } => Some(429),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Provider-stated retry delay in seconds (429 only)
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Error::RateLimit { info } => info.retry_after,
            _ => None,
        }
    }
}

/// Result type alias for the Quickbase client
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
