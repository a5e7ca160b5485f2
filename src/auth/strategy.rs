//! Token-based authentication strategies
//!
//! Every strategy yields a raw token and formats it into the
//! `Authorization` header value. The executor only sees [`AuthStrategy`].

use super::cache::{KeyedLocks, TokenCache};
use super::types::AuthKind;
use crate::config::ResolvedConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Realm header sent with every request
pub const REALM_HEADER: &str = "QB-Realm-Hostname";

/// Cache slot used by SSO when no resource id is known
const SHARED_SLOT: &str = "*";

/// Capability set shared by all authentication variants
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Which scheme this strategy produces
    fn kind(&self) -> AuthKind;

    /// Valid token for the resource, fetching one if needed
    async fn get_token(&self, dbid: Option<&str>) -> Result<String>;

    /// `Authorization` header value for a token
    fn authorization_header(&self, token: &str) -> String {
        format!("{} {token}", self.kind().scheme())
    }

    /// React to a 401. Returns true when a retry may succeed.
    async fn handle_auth_error(&self, dbid: Option<&str>) -> bool;

    /// Forget any cached credential for the resource
    async fn invalidate(&self, dbid: Option<&str>);
}

// ============================================================================
// User token
// ============================================================================

/// Static user token
pub struct UserTokenAuth {
    token: String,
}

impl UserTokenAuth {
    /// Wrap a user token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AuthStrategy for UserTokenAuth {
    fn kind(&self) -> AuthKind {
        AuthKind::UserToken
    }

    async fn get_token(&self, _dbid: Option<&str>) -> Result<String> {
        Ok(self.token.clone())
    }

    async fn handle_auth_error(&self, _dbid: Option<&str>) -> bool {
        false
    }

    async fn invalidate(&self, _dbid: Option<&str>) {}
}

// ============================================================================
// Temporary token
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemporaryTokenResponse {
    temporary_authorization: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Turn a failed token endpoint response into an authentication error
async fn token_failure(response: reqwest::Response, dbid: Option<&str>) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(ApiErrorBody {
            message: Some(message),
            description,
        }) => match description {
            Some(description) if !description.is_empty() => format!("{message}: {description}"),
            _ => message,
        },
        _ if body.is_empty() => format!("token request failed with status {status}"),
        _ => body,
    };
    Error::authentication(status, message, dbid)
}

/// Temporary tokens fetched per table or app using browser cookies
pub struct TempTokenAuth {
    http: Client,
    base_url: String,
    realm_hostname: String,
    user_agent: String,
    cache: TokenCache,
    in_flight: KeyedLocks,
}

impl TempTokenAuth {
    /// Create the strategy. `http` should carry a cookie store.
    pub fn new(http: Client, config: &ResolvedConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            realm_hostname: config.realm_hostname.clone(),
            user_agent: config.user_agent.clone(),
            cache: TokenCache::new(),
            in_flight: KeyedLocks::new(),
        }
    }

    /// Seed an already-issued token for a resource
    pub async fn seed(&self, dbid: &str, token: impl Into<String>) {
        self.cache.set(dbid, token).await;
    }

    /// Token cache, exposed for inspection
    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    async fn fetch(&self, dbid: &str) -> Result<String> {
        let url = format!("{}/auth/temporary/{dbid}", self.base_url);
        debug!(dbid, "Fetching temporary token");

        let response = self
            .http
            .get(&url)
            .header(REALM_HEADER, &self.realm_hostname)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(token_failure(response, Some(dbid)).await);
        }

        let body: TemporaryTokenResponse = response.json().await?;
        Ok(body.temporary_authorization)
    }
}

#[async_trait]
impl AuthStrategy for TempTokenAuth {
    fn kind(&self) -> AuthKind {
        AuthKind::TempToken
    }

    async fn get_token(&self, dbid: Option<&str>) -> Result<String> {
        let dbid = dbid.ok_or_else(|| {
            Error::auth("temporary token authentication requires a table or app id")
        })?;

        if let Some(token) = self.cache.get(dbid).await {
            return Ok(token);
        }

        let _guard = self.in_flight.lock(dbid).await;

        // Another caller may have fetched while we waited
        if let Some(token) = self.cache.get(dbid).await {
            return Ok(token);
        }

        let token = self.fetch(dbid).await?;
        self.cache.set(dbid, token.clone()).await;
        Ok(token)
    }

    async fn handle_auth_error(&self, dbid: Option<&str>) -> bool {
        if let Some(dbid) = dbid {
            debug!(dbid, "Dropping rejected temporary token");
            self.cache.remove(dbid).await;
        }
        true
    }

    async fn invalidate(&self, dbid: Option<&str>) {
        match dbid {
            Some(dbid) => self.cache.remove(dbid).await,
            None => self.cache.clear().await,
        }
    }
}

// ============================================================================
// SSO
// ============================================================================

const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const TEMP_TOKEN_TYPE: &str = "urn:quickbase:params:oauth:token-type:temp_token";
const SAML2_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:saml2";

/// Encode a SAML assertion for the exchange body.
///
/// Raw XML is base64url-encoded; anything else is assumed to be encoded
/// already.
pub fn encode_assertion(assertion: &str) -> String {
    let trimmed = assertion.trim();
    if trimmed.starts_with('<') {
        URL_SAFE_NO_PAD.encode(trimmed.as_bytes())
    } else {
        trimmed.to_string()
    }
}

/// SAML assertion exchanged for temporary tokens
pub struct SsoAuth {
    http: Client,
    base_url: String,
    realm_hostname: String,
    user_agent: String,
    subject_token: String,
    cache: TokenCache,
    in_flight: KeyedLocks,
}

impl SsoAuth {
    /// Create the strategy from a raw or pre-encoded SAML assertion
    pub fn new(http: Client, config: &ResolvedConfig, saml_assertion: &str) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            realm_hostname: config.realm_hostname.clone(),
            user_agent: config.user_agent.clone(),
            subject_token: encode_assertion(saml_assertion),
            cache: TokenCache::new(),
            in_flight: KeyedLocks::new(),
        }
    }

    async fn exchange(&self, dbid: Option<&str>) -> Result<String> {
        let url = format!("{}/auth/oauth/token", self.base_url);
        debug!(dbid, "Exchanging SAML assertion");

        let body = serde_json::json!({
            "grant_type": TOKEN_EXCHANGE_GRANT,
            "requested_token_type": TEMP_TOKEN_TYPE,
            "subject_token": self.subject_token,
            "subject_token_type": SAML2_TOKEN_TYPE,
        });

        let response = self
            .http
            .post(&url)
            .header(REALM_HEADER, &self.realm_hostname)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(token_failure(response, dbid).await);
        }

        let body: ExchangeResponse = response.json().await?;
        Ok(body.access_token)
    }
}

#[async_trait]
impl AuthStrategy for SsoAuth {
    fn kind(&self) -> AuthKind {
        AuthKind::Sso
    }

    async fn get_token(&self, dbid: Option<&str>) -> Result<String> {
        let key = dbid.unwrap_or(SHARED_SLOT);

        if let Some(token) = self.cache.get(key).await {
            return Ok(token);
        }

        let _guard = self.in_flight.lock(key).await;
        if let Some(token) = self.cache.get(key).await {
            return Ok(token);
        }

        let token = self.exchange(dbid).await?;
        self.cache.set(key, token.clone()).await;
        Ok(token)
    }

    async fn handle_auth_error(&self, dbid: Option<&str>) -> bool {
        self.cache.remove(dbid.unwrap_or(SHARED_SLOT)).await;
        true
    }

    async fn invalidate(&self, dbid: Option<&str>) {
        match dbid {
            Some(dbid) => self.cache.remove(dbid).await,
            None => self.cache.clear().await,
        }
    }
}
