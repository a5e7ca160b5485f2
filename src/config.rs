//! Client configuration
//!
//! `ClientConfig` is the user-facing configuration surface. It can be built
//! in code with [`ClientConfig::builder`] or loaded from a YAML / JSON file.
//! [`ClientConfig::resolve`] validates it once and produces the immutable
//! [`ResolvedConfig`] owned by a client instance.

use crate::auth::AuthKind;
use crate::error::{Error, Result};
use crate::http::{RateLimiterConfig, RetryPolicy};
use crate::schema::{SchemaDocument, SchemaResolver};
use crate::types::{RateLimitCallback, RateLimitInfo};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

/// Default JSON API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.quickbase.com/v1";

/// Provider domain appended to bare realm names
pub const PROVIDER_DOMAIN: &str = "quickbase.com";

// ============================================================================
// User Configuration
// ============================================================================

/// Client configuration as supplied by the user
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Realm name (`acme`) or full hostname (`acme.quickbase.com`)
    pub realm: String,

    /// Authentication descriptor
    pub auth: AuthDef,

    /// Base URL of the JSON API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Proactive client-side throttling
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Optional alias schema
    #[serde(default)]
    pub schema: Option<SchemaDocument>,

    /// Block every request that could modify data
    #[serde(default)]
    pub read_only: bool,

    /// Fetch every page of paginated responses unless a call opts out
    #[serde(default)]
    pub auto_paginate: bool,

    /// Normalize ISO-8601 date strings in responses to RFC 3339 UTC
    #[serde(default)]
    pub convert_dates: bool,

    /// Override the User-Agent header
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Origin of the legacy XML endpoints, defaults to `https://<realm host>`
    #[serde(default)]
    pub xml_base_url: Option<String>,

    /// Invoked on every 429 response
    #[serde(skip)]
    pub on_rate_limit: Option<RateLimitCallback>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("realm", &self.realm)
            .field("auth", &self.auth)
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("retry", &self.retry)
            .field("throttle", &self.throttle)
            .field("has_schema", &self.schema.is_some())
            .field("read_only", &self.read_only)
            .field("auto_paginate", &self.auto_paginate)
            .field("convert_dates", &self.convert_dates)
            .field("has_rate_limit_callback", &self.on_rate_limit.is_some())
            .finish_non_exhaustive()
    }
}

/// Authentication descriptor (variant + credentials)
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum AuthDef {
    /// Static user token
    UserToken {
        /// The user token
        token: String,
    },

    /// Temporary tokens fetched per table/app with browser cookies
    TempToken {
        /// Optional already-issued token
        #[serde(default)]
        token: Option<String>,
        /// Resource the initial token belongs to
        #[serde(default)]
        dbid: Option<String>,
    },

    /// Username / password ticket via the legacy XML endpoint
    Ticket {
        /// Username or email
        username: String,
        /// Password, consumed by the first authentication; wiped on drop
        password: Zeroizing<String>,
        /// Ticket lifetime in hours
        #[serde(default)]
        hours: Option<u32>,
        /// Persist the ticket to this JSON file
        #[serde(default)]
        persist_path: Option<PathBuf>,
    },

    /// SAML assertion exchanged for temporary tokens
    Sso {
        /// Raw SAML assertion (XML); base64url-encoded before exchange
        saml_assertion: String,
    },
}

impl AuthDef {
    /// Credential scheme this descriptor produces
    pub fn kind(&self) -> AuthKind {
        match self {
            AuthDef::UserToken { .. } => AuthKind::UserToken,
            AuthDef::TempToken { .. } => AuthKind::TempToken,
            AuthDef::Ticket { .. } => AuthKind::Ticket,
            AuthDef::Sso { .. } => AuthKind::Sso,
        }
    }
}

impl fmt::Debug for AuthDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthDef::UserToken { .. } => f.write_str("UserToken { token: <redacted> }"),
            AuthDef::TempToken { dbid, token } => f
                .debug_struct("TempToken")
                .field("dbid", dbid)
                .field("has_token", &token.is_some())
                .finish(),
            AuthDef::Ticket {
                username, hours, ..
            } => f
                .debug_struct("Ticket")
                .field("username", username)
                .field("hours", hours)
                .finish_non_exhaustive(),
            AuthDef::Sso { .. } => f.write_str("Sso { saml_assertion: <redacted> }"),
        }
    }
}

/// Retry policy as configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay
    pub max_delay_ms: u64,
    /// Exponential growth factor
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

/// Proactive throttle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThrottleConfig {
    /// Enable the throttle
    pub enabled: bool,
    /// Requests allowed per 10 second window
    pub requests_per_10_seconds: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_10_seconds: 100,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder(realm: impl Into<String>, auth: AuthDef) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig {
                realm: realm.into(),
                auth,
                base_url: default_base_url(),
                timeout_ms: default_timeout_ms(),
                retry: RetryConfig::default(),
                throttle: ThrottleConfig::default(),
                schema: None,
                read_only: false,
                auto_paginate: false,
                convert_dates: false,
                user_agent: None,
                xml_base_url: None,
                on_rate_limit: None,
            },
        }
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a file; `.json` is parsed as JSON, anything else as YAML
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        }
    }

    /// Validate and split into the resolved config and the auth descriptor
    pub fn resolve(self) -> Result<(ResolvedConfig, AuthDef)> {
        let realm = self.realm.trim();
        if realm.is_empty() {
            return Err(Error::missing_field("realm"));
        }
        let realm_hostname = if realm.contains('.') {
            realm.to_string()
        } else {
            format!("{realm}.{PROVIDER_DOMAIN}")
        };

        url::Url::parse(&self.base_url)?;
        let xml_base_url = match self.xml_base_url {
            Some(url) => {
                url::Url::parse(&url)?;
                url.trim_end_matches('/').to_string()
            }
            None => format!("https://{realm_hostname}"),
        };

        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.maxAttempts must be at least 1"));
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(Error::config(
                "retry.maxDelayMs must be at least retry.initialDelayMs",
            ));
        }
        if self.retry.multiplier < 1.0 {
            return Err(Error::config("retry.multiplier must be >= 1.0"));
        }
        if self.timeout_ms == 0 {
            return Err(Error::config("timeoutMs must be greater than 0"));
        }

        let schema = self
            .schema
            .as_ref()
            .map(SchemaResolver::new)
            .transpose()?
            .map(Arc::new);

        let throttle = self.throttle.enabled.then(|| {
            RateLimiterConfig::new(
                self.throttle.requests_per_10_seconds,
                Duration::from_secs(10),
            )
        });

        let resolved = ResolvedConfig {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            realm_hostname,
            xml_base_url,
            timeout: Duration::from_millis(self.timeout_ms),
            retry: RetryPolicy::from(&self.retry),
            schema,
            read_only: self.read_only,
            auto_paginate: self.auto_paginate,
            convert_dates: self.convert_dates,
            throttle,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| format!("quickbase-client/{}", env!("CARGO_PKG_VERSION"))),
            on_rate_limit: self.on_rate_limit,
        };

        Ok((resolved, self.auth))
    }
}

/// Builder for [`ClientConfig`]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the API base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the throttle rate (requests per 10 seconds)
    #[must_use]
    pub fn throttle(mut self, requests_per_10_seconds: u32) -> Self {
        self.config.throttle = ThrottleConfig {
            enabled: true,
            requests_per_10_seconds,
        };
        self
    }

    /// Disable proactive throttling
    #[must_use]
    pub fn no_throttle(mut self) -> Self {
        self.config.throttle.enabled = false;
        self
    }

    /// Attach an alias schema
    #[must_use]
    pub fn schema(mut self, schema: SchemaDocument) -> Self {
        self.config.schema = Some(schema);
        self
    }

    /// Enable read-only mode
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    /// Enable auto-pagination
    #[must_use]
    pub fn auto_paginate(mut self, auto_paginate: bool) -> Self {
        self.config.auto_paginate = auto_paginate;
        self
    }

    /// Enable date normalization
    #[must_use]
    pub fn convert_dates(mut self, convert_dates: bool) -> Self {
        self.config.convert_dates = convert_dates;
        self
    }

    /// Set user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(agent.into());
        self
    }

    /// Override the origin of the legacy XML endpoints
    #[must_use]
    pub fn xml_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.xml_base_url = Some(url.into());
        self
    }

    /// Register a callback for 429 responses
    #[must_use]
    pub fn on_rate_limit<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RateLimitInfo) + Send + Sync + 'static,
    {
        self.config.on_rate_limit = Some(Arc::new(callback));
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

// ============================================================================
// Resolved Configuration
// ============================================================================

/// Immutable configuration owned by a client instance
#[derive(Clone)]
pub struct ResolvedConfig {
    /// API base URL without trailing slash
    pub base_url: String,
    /// Value of the `QB-Realm-Hostname` header
    pub realm_hostname: String,
    /// Origin of the legacy XML endpoints
    pub xml_base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry policy
    pub retry: RetryPolicy,
    /// Alias resolver, when a schema was supplied
    pub schema: Option<Arc<SchemaResolver>>,
    /// Read-only mode
    pub read_only: bool,
    /// Auto-pagination
    pub auto_paginate: bool,
    /// Date normalization
    pub convert_dates: bool,
    /// Throttle settings, `None` when disabled
    pub throttle: Option<RateLimiterConfig>,
    /// User agent header value
    pub user_agent: String,
    /// 429 callback
    pub on_rate_limit: Option<RateLimitCallback>,
}

impl ResolvedConfig {
    /// Origin of the realm host, used by the legacy XML endpoints
    pub fn realm_url(&self) -> &str {
        &self.xml_base_url
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("base_url", &self.base_url)
            .field("realm_hostname", &self.realm_hostname)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("has_schema", &self.schema.is_some())
            .field("read_only", &self.read_only)
            .field("auto_paginate", &self.auto_paginate)
            .field("convert_dates", &self.convert_dates)
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}
