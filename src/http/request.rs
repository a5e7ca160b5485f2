//! Logical request description and per-call context

use crate::error::{Error, Result};
use crate::types::{JsonValue, Method};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use url::Url;

/// One logical API call, before alias resolution
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    /// Logical operation name (e.g. `runQuery`)
    pub operation: String,
    /// HTTP method
    pub method: Method,
    /// Path template relative to the base URL, e.g. `/tables/{tableId}`
    pub path: String,
    /// Values for `{name}` placeholders in the path
    pub path_params: BTreeMap<String, String>,
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// Header overrides, applied last
    pub headers: HashMap<String, String>,
    /// JSON body
    pub body: Option<JsonValue>,
    /// Explicit resource id, takes precedence over every other source
    pub dbid: Option<String>,
    /// Override the client timeout
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    /// Create a request for an operation
    pub fn new(operation: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            method,
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set a path placeholder value
    #[must_use]
    pub fn path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(key.into(), value.into());
        self
    }

    /// Add or replace a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_query(key, value);
        self
    }

    /// Add a header override
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the explicit resource id
    #[must_use]
    pub fn dbid(mut self, dbid: impl Into<String>) -> Self {
        self.dbid = Some(dbid.into());
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace a query parameter in place, appending if absent
    pub fn set_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.query.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.query.push((key, value)),
        }
    }

    /// Look up a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Path with every placeholder substituted (unencoded, for classification)
    pub fn rendered_path(&self) -> Result<String> {
        let mut out = String::with_capacity(self.path.len());
        for (i, segment) in self.segments().enumerate() {
            if i > 0 || self.path.starts_with('/') {
                out.push('/');
            }
            out.push_str(&self.render_segment(segment)?);
        }
        Ok(out)
    }

    /// Absolute URL for this request against `base_url`
    pub fn url(&self, base_url: &str) -> Result<Url> {
        let mut url = Url::parse(base_url)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::config(format!("Base URL cannot be a base: {base_url}")))?;
            segments.pop_if_empty();
            for segment in self.segments() {
                segments.push(&self.render_segment(segment)?);
            }
        }
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    fn render_segment(&self, segment: &str) -> Result<String> {
        match placeholder(segment) {
            Some(name) => self
                .path_params
                .get(name)
                .cloned()
                .ok_or_else(|| Error::missing_field(format!("path parameter '{name}'"))),
            None => Ok(segment.to_string()),
        }
    }
}

/// Name inside a `{name}` path segment
pub(crate) fn placeholder(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}

/// Immutable per-attempt record of a logical call
///
/// A fresh value is derived for every attempt, so nothing downstream
/// mutates retry bookkeeping.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Logical operation name
    pub operation: String,
    /// Current attempt (1-based)
    pub attempt: u32,
    /// Attempt budget
    pub max_attempts: u32,
    /// Resolved resource id
    pub dbid: Option<String>,
    /// When the logical call started
    pub started: Instant,
}

impl RequestContext {
    /// Context for the first attempt
    pub fn first(operation: impl Into<String>, dbid: Option<String>, max_attempts: u32) -> Self {
        Self {
            operation: operation.into(),
            attempt: 1,
            max_attempts,
            dbid,
            started: Instant::now(),
        }
    }

    /// Context for the following attempt
    #[must_use]
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    /// Whether another attempt is allowed after this one
    pub fn has_attempts_left(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Elapsed time since the logical call began
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
