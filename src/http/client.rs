//! Request executor
//!
//! Turns one logical [`ApiRequest`] into one or more HTTP exchanges:
//! resolves the target table, rewrites aliases, applies the read-only gate,
//! then runs the attempt loop (auth, throttle, timeout, classification,
//! backoff). The legacy XML transport shares the same loop.

use super::rate_limit::RateLimiter;
use super::request::{ApiRequest, RequestContext};
use super::xml::{build_envelope, XmlResponse, XML_CONTENT_TYPE};
use crate::auth::{AuthKind, AuthStrategy};
use crate::config::ResolvedConfig;
use crate::dates;
use crate::error::{Error, Result};
use crate::read_only;
use crate::types::{JsonValue, Method, RateLimitInfo};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, warn, Instrument};
use url::Url;

/// Shape of platform table and app ids
static DBID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^b[0-9a-z]{8}$").expect("dbid pattern is valid"));

/// Whether a reference looks like a raw table or app id rather than an alias
pub fn looks_like_dbid(reference: &str) -> bool {
    DBID.is_match(reference)
}

/// Outgoing payload, rendered per attempt because it may embed the credential
enum Payload<'a> {
    Json(Option<&'a JsonValue>),
    Xml { action: &'a str, inner: &'a str },
}

/// Decoded successful response
enum Decoded {
    Json(JsonValue),
    Xml(String),
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Executes logical calls against the platform
pub struct RequestExecutor {
    client: Client,
    config: Arc<ResolvedConfig>,
    auth: Arc<dyn AuthStrategy>,
    throttle: Option<RateLimiter>,
}

impl RequestExecutor {
    /// HTTP client shared by the executor and the auth strategies.
    ///
    /// Carries a cookie store so temporary-token fetches send browser
    /// session cookies.
    pub fn http_client() -> Result<Client> {
        Ok(Client::builder().cookie_store(true).build()?)
    }

    /// Create an executor
    pub fn new(config: Arc<ResolvedConfig>, auth: Arc<dyn AuthStrategy>, client: Client) -> Self {
        let throttle = config.throttle.as_ref().map(RateLimiter::new);
        Self {
            client,
            config,
            auth,
            throttle,
        }
    }

    /// Resolved configuration
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Active authentication strategy
    pub fn auth(&self) -> &Arc<dyn AuthStrategy> {
        &self.auth
    }

    /// Whether a throttle is active
    pub fn has_throttle(&self) -> bool {
        self.throttle.is_some()
    }

    /// Execute one logical JSON API call
    pub async fn execute(&self, request: ApiRequest) -> Result<JsonValue> {
        let (request, dbid) = self.prepare(request)?;
        let span = info_span!(
            "qb_request",
            operation = %request.operation,
            dbid = dbid.as_deref().unwrap_or("-"),
        );

        async move {
            let url = request.url(&self.config.base_url)?;
            let timeout = request.timeout.unwrap_or(self.config.timeout);
            let ctx = RequestContext::first(
                request.operation.clone(),
                dbid,
                self.config.retry.max_attempts,
            );

            let payload = Payload::Json(request.body.as_ref());
            let decoded = self
                .run(request.method, &url, &request, &payload, timeout, ctx.clone())
                .await?;
            let Decoded::Json(mut value) = decoded else {
                return Err(Error::Other("unexpected XML response".to_string()));
            };

            if self.config.convert_dates {
                dates::normalize_dates(&mut value);
            }
            if let (Some(schema), Some(table)) = (&self.config.schema, ctx.dbid.as_deref()) {
                schema.transform_response(table, &mut value);
            }
            Ok(value)
        }
        .instrument(span)
        .await
    }

    /// Execute a legacy XML action and return the raw response document.
    ///
    /// The credential is embedded in the envelope (`<ticket>` or
    /// `<usertoken>`), or sent as a header for temporary tokens.
    pub async fn execute_xml(&self, action: &str, dbid: &str, inner_xml: &str) -> Result<String> {
        if self.config.read_only {
            read_only::check_xml_action(action)?;
        }

        let dbid = match &self.config.schema {
            Some(schema) if schema.knows_table(dbid) => schema.resolve_table_alias(dbid)?,
            _ => dbid.to_string(),
        };

        let span = info_span!("qb_xml_request", action, dbid = %dbid);
        async move {
            let url = Url::parse(&format!("{}/db/{dbid}", self.config.realm_url()))?;
            let request = ApiRequest::new(action, Method::POST, "");
            let ctx = RequestContext::first(action, Some(dbid), self.config.retry.max_attempts);
            let payload = Payload::Xml {
                action,
                inner: inner_xml,
            };

            match self
                .run(Method::POST, &url, &request, &payload, self.config.timeout, ctx)
                .await?
            {
                Decoded::Xml(text) => Ok(text),
                Decoded::Json(_) => Err(Error::xml_parse("unexpected JSON response")),
            }
        }
        .instrument(span)
        .await
    }

    // ========================================================================
    // Preparation
    // ========================================================================

    /// Resolve the target, rewrite aliases and apply the read-only gate.
    /// Nothing here performs I/O.
    fn prepare(&self, mut request: ApiRequest) -> Result<(ApiRequest, Option<String>)> {
        let dbid = self.resolve_dbid(&mut request)?;

        if let (Some(schema), Some(table), Some(body)) =
            (&self.config.schema, dbid.as_deref(), request.body.as_mut())
        {
            schema.transform_request_body(table, body)?;
        }

        if self.config.read_only {
            read_only::check(request.method, &request.rendered_path()?)?;
        }

        Ok((request, dbid))
    }

    /// Rewrite table aliases in place and pick the resource id.
    ///
    /// Precedence: explicit id, query `tableId`/`appId`, path `tableId`/`appId`,
    /// body `from`/`to`.
    fn resolve_dbid(&self, request: &mut ApiRequest) -> Result<Option<String>> {
        if let Some(explicit) = request.dbid.take() {
            request.dbid = Some(self.resolve_table_ref(&explicit)?);
        }
        if let Some(table) = request.query_value("tableId").map(str::to_string) {
            let resolved = self.resolve_table_ref(&table)?;
            request.set_query("tableId", resolved);
        }
        if let Some(table) = request.path_params.get("tableId").cloned() {
            let resolved = self.resolve_table_ref(&table)?;
            request.path_params.insert("tableId".to_string(), resolved);
        }
        if let Some(body) = request.body.as_mut().and_then(JsonValue::as_object_mut) {
            for key in ["from", "to"] {
                if let Some(JsonValue::String(table)) = body.get_mut(key) {
                    *table = self.resolve_table_ref(table)?;
                }
            }
        }

        let from_body = || {
            let body = request.body.as_ref()?;
            ["from", "to"]
                .iter()
                .find_map(|key| body.get(*key).and_then(JsonValue::as_str))
                .map(str::to_string)
        };

        Ok(request
            .dbid
            .clone()
            .or_else(|| {
                request
                    .query_value("tableId")
                    .or_else(|| request.query_value("appId"))
                    .map(str::to_string)
            })
            .or_else(|| {
                request
                    .path_params
                    .get("tableId")
                    .or_else(|| request.path_params.get("appId"))
                    .cloned()
            })
            .or_else(from_body))
    }

    /// Table alias → id. Raw ids pass through; other unknown names fail.
    fn resolve_table_ref(&self, reference: &str) -> Result<String> {
        match &self.config.schema {
            Some(schema) if schema.knows_table(reference) || !looks_like_dbid(reference) => {
                schema.resolve_table_alias(reference)
            }
            _ => Ok(reference.to_string()),
        }
    }

    // ========================================================================
    // Attempt loop
    // ========================================================================

    async fn run(
        &self,
        method: Method,
        url: &Url,
        request: &ApiRequest,
        payload: &Payload<'_>,
        timeout: Duration,
        mut ctx: RequestContext,
    ) -> Result<Decoded> {
        loop {
            // Token fetch failures are not retried here
            let token = self.auth.get_token(ctx.dbid.as_deref()).await?;

            let err = match self
                .attempt(method, url, request, payload, timeout, &token, &ctx)
                .await
            {
                Ok(decoded) => {
                    debug!(
                        attempt = ctx.attempt,
                        elapsed_ms = ctx.elapsed().as_millis() as u64,
                        "Request succeeded"
                    );
                    return Ok(decoded);
                }
                Err(err) => err,
            };

            if matches!(err, Error::Authentication { status: 401, .. }) {
                let recoverable = self.auth.handle_auth_error(ctx.dbid.as_deref()).await;
                if recoverable && ctx.has_attempts_left() {
                    debug!(
                        attempt = ctx.attempt,
                        max_attempts = ctx.max_attempts,
                        "Credential rejected, retrying with a fresh one"
                    );
                    ctx = ctx.next_attempt();
                    continue;
                }
                return Err(err);
            }

            if !err.is_retryable() || !ctx.has_attempts_left() {
                return Err(err);
            }

            let delay = match &err {
                Error::RateLimit { info } => self
                    .config
                    .retry
                    .rate_limit_delay(ctx.attempt, info.retry_after),
                _ => self.config.retry.calculate_backoff(ctx.attempt),
            };
            warn!(
                attempt = ctx.attempt,
                max_attempts = ctx.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            ctx = ctx.next_attempt();
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        method: Method,
        url: &Url,
        request: &ApiRequest,
        payload: &Payload<'_>,
        timeout: Duration,
        token: &str,
        ctx: &RequestContext,
    ) -> Result<Decoded> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("qb-realm-hostname"),
            header_value(&self.config.realm_hostname)?,
        );
        headers.insert(USER_AGENT, header_value(&self.config.user_agent)?);

        let body = match payload {
            Payload::Json(body) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers.insert(AUTHORIZATION, header_value(&self.auth.authorization_header(token))?);
                body.map(serde_json::to_vec).transpose()?
            }
            Payload::Xml { action, inner } => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(XML_CONTENT_TYPE));
                headers.insert(HeaderName::from_static("quickbase-action"), header_value(action)?);
                let credential = match self.auth.kind() {
                    AuthKind::Ticket => Some(("ticket", token)),
                    AuthKind::UserToken => Some(("usertoken", token)),
                    AuthKind::TempToken | AuthKind::Sso => {
                        headers.insert(
                            AUTHORIZATION,
                            header_value(&self.auth.authorization_header(token))?,
                        );
                        None
                    }
                };
                let elements: Vec<(&str, &str)> = credential.into_iter().collect();
                Some(build_envelope(&elements, inner).into_bytes())
            }
        };

        // Caller overrides win
        for (key, value) in &request.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::config(format!("Invalid header name '{key}': {e}")))?;
            headers.insert(name, header_value(value)?);
        }

        if let Some(throttle) = &self.throttle {
            throttle.wait().await;
        }

        let mut builder = self
            .client
            .request(method.into(), url.clone())
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        debug!(method = %method, url = %url, attempt = ctx.attempt, "Sending request");
        let exchange = async {
            let response = builder.send().await?;
            self.classify(response, url, payload, ctx).await
        };

        #[allow(clippy::cast_possible_truncation)]
        let timeout_ms = timeout.as_millis() as u64;
        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                timeout_ms,
                url: url.to_string(),
            }),
        }
    }

    async fn classify(
        &self,
        response: Response,
        url: &Url,
        payload: &Payload<'_>,
        ctx: &RequestContext,
    ) -> Result<Decoded> {
        let status = response.status();

        if status.is_success() {
            return match payload {
                Payload::Json(_) => {
                    let bytes = response.bytes().await?;
                    if bytes.iter().all(u8::is_ascii_whitespace) {
                        Ok(Decoded::Json(JsonValue::Null))
                    } else {
                        Ok(Decoded::Json(serde_json::from_slice(&bytes)?))
                    }
                }
                Payload::Xml { .. } => {
                    let text = response.text().await?;
                    XmlResponse::parse(&text)?.into_result()?;
                    Ok(Decoded::Xml(text))
                }
            };
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let info = RateLimitInfo {
                retry_after: retry_after(response.headers()),
                url: url.to_string(),
                attempt: ctx.attempt,
                ray_id: ray_id(response.headers()),
            };
            warn!(
                retry_after = ?info.retry_after,
                ray_id = ?info.ray_id,
                attempt = ctx.attempt,
                "Rate limited (429)"
            );
            if let Some(callback) = &self.config.on_rate_limit {
                callback(&info);
            }
            return Err(Error::RateLimit { info });
        }

        let body = response.text().await.unwrap_or_default();
        let (message, description) = error_message(&body, status);

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::authentication(
                status.as_u16(),
                message,
                ctx.dbid.as_deref(),
            ));
        }
        if status.is_server_error() {
            return Err(Error::Server {
                status: status.as_u16(),
                message,
            });
        }
        Err(Error::api(status.as_u16(), message, description))
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("config", &self.config)
            .field("auth", &self.auth.kind())
            .field("throttle", &self.throttle.is_some())
            .finish()
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::config(format!("Invalid header value: {e}")))
}

/// `Retry-After` as seconds; accepts delta-seconds or an HTTP date
fn retry_after(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let secs = (at.with_timezone(&chrono::Utc) - chrono::Utc::now()).num_seconds();
    Some(u64::try_from(secs).unwrap_or(0))
}

/// Provider trace id: `qb-api-ray`, falling back to `cf-ray`
fn ray_id(headers: &HeaderMap) -> Option<String> {
    ["qb-api-ray", "cf-ray"]
        .iter()
        .find_map(|name| headers.get(*name)?.to_str().ok().map(str::to_string))
}

/// Message and description from an error body, falling back to the status
fn error_message(body: &str, status: StatusCode) -> (String, Option<String>) {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let fallback = || {
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed.starts_with('{') {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        } else {
            trimmed.to_string()
        }
    };
    let description = parsed.description.filter(|d| !d.is_empty());
    (parsed.message.unwrap_or_else(fallback), description)
}
