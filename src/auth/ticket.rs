//! Ticket authentication through the legacy XML endpoint
//!
//! The password is consumed by the first successful authentication and
//! zeroized when dropped. Once the ticket expires or is rejected the
//! strategy cannot re-authenticate; a new client must be constructed.

use super::strategy::AuthStrategy;
use super::types::AuthKind;
use crate::config::ResolvedConfig;
use crate::error::{Error, Result};
use crate::http::xml::{build_envelope, XmlResponse, ACTION_HEADER, XML_CONTENT_TYPE};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Default ticket lifetime in hours
pub const DEFAULT_TICKET_HOURS: u32 = 12;

/// Longest lifetime the platform grants (about six months)
pub const MAX_TICKET_HOURS: u32 = 4380;

/// Clamp a requested lifetime to `[1, 4380]` hours
pub fn clamp_hours(hours: Option<u32>) -> u32 {
    hours
        .unwrap_or(DEFAULT_TICKET_HOURS)
        .clamp(1, MAX_TICKET_HOURS)
}

/// Storage key for a realm's ticket
pub fn store_key(realm_hostname: &str) -> String {
    format!("qb-ticket:{realm_hostname}")
}

// ============================================================================
// Password
// ============================================================================

/// Password that is wiped from memory on drop and cannot be cloned
pub struct Password(Zeroizing<String>);

impl Password {
    /// Wrap a password
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }

    fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl From<Zeroizing<String>> for Password {
    fn from(password: Zeroizing<String>) -> Self {
        Self(password)
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Key-value persistence for tickets
pub trait TicketStore: Send + Sync {
    /// Stored value, if any
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store a value
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Persisted ticket record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTicket {
    /// The ticket
    pub ticket: String,
    /// Platform user id
    pub user_id: String,
    /// Expiry in milliseconds since the Unix epoch
    pub expires_at: i64,
}

impl StoredTicket {
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.expires_at).single()
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryTicketStore {
    items: StdMutex<HashMap<String, String>>,
}

impl MemoryTicketStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl TicketStore for MemoryTicketStore {
    fn get_item(&self, key: &str) -> Option<String> {
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.remove(key);
        Ok(())
    }
}

/// JSON file holding a map of key to value
#[derive(Debug)]
pub struct FileTicketStore {
    path: PathBuf,
    lock: StdMutex<()>,
}

impl FileTicketStore {
    /// Store backed by `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: StdMutex::new(()),
        }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(map)?)?;
        Ok(())
    }
}

impl TicketStore for FileTicketStore {
    fn get_item(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.read_map() {
            Ok(mut map) => map.remove(key),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable ticket store");
                None
            }
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map().unwrap_or_default();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map().unwrap_or_default();
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

// ============================================================================
// Strategy
// ============================================================================

enum TicketState {
    Unauthenticated {
        password: Password,
    },
    Authenticated {
        ticket: String,
        user_id: String,
        expires_at: DateTime<Utc>,
    },
    Expired,
}

/// Username/password ticket authentication
pub struct TicketAuth {
    http: Client,
    endpoint: String,
    user_agent: String,
    username: String,
    hours: u32,
    store: Option<Arc<dyn TicketStore>>,
    store_key: String,
    state: Mutex<TicketState>,
}

impl TicketAuth {
    /// Create the strategy, restoring a persisted ticket when one is valid
    pub fn new(
        http: Client,
        config: &ResolvedConfig,
        username: impl Into<String>,
        password: Password,
        hours: Option<u32>,
        store: Option<Arc<dyn TicketStore>>,
    ) -> Self {
        let store_key = store_key(&config.realm_hostname);
        let state = match store.as_deref().and_then(|s| restore(s, &store_key)) {
            Some(state) => state,
            None => TicketState::Unauthenticated { password },
        };

        Self {
            http,
            endpoint: format!("{}/db/main", config.realm_url()),
            user_agent: config.user_agent.clone(),
            username: username.into(),
            hours: clamp_hours(hours),
            store,
            store_key,
            state: Mutex::new(state),
        }
    }

    /// Platform user id, once authenticated
    pub async fn user_id(&self) -> Option<String> {
        match &*self.state.lock().await {
            TicketState::Authenticated { user_id, .. } => Some(user_id.clone()),
            _ => None,
        }
    }

    /// Requested ticket lifetime after clamping
    pub fn hours(&self) -> u32 {
        self.hours
    }

    async fn authenticate(&self, password: &Password) -> Result<(String, String)> {
        let hours = self.hours.to_string();
        let body = build_envelope(
            &[
                ("username", self.username.as_str()),
                ("password", password.expose()),
                ("hours", hours.as_str()),
            ],
            "",
        );

        debug!(username = %self.username, hours = self.hours, "Authenticating for ticket");
        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, XML_CONTENT_TYPE)
            .header(ACTION_HEADER, "API_Authenticate")
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::authentication(status.as_u16(), text, None));
        }

        let parsed = XmlResponse::parse(&text)?.into_result()?;
        let ticket = parsed
            .get("ticket")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::xml_parse("API_Authenticate response has no <ticket>"))?
            .to_string();
        let user_id = parsed.get("userid").unwrap_or_default().to_string();
        Ok((ticket, user_id))
    }

    fn persist(&self, ticket: &str, user_id: &str, expires_at: DateTime<Utc>) {
        let Some(store) = &self.store else {
            return;
        };
        let record = StoredTicket {
            ticket: ticket.to_string(),
            user_id: user_id.to_string(),
            expires_at: expires_at.timestamp_millis(),
        };
        let result = serde_json::to_string(&record)
            .map_err(Error::from)
            .and_then(|value| store.set_item(&self.store_key, &value));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist ticket");
        }
    }

    fn forget(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.remove_item(&self.store_key) {
                warn!(error = %e, "Failed to remove stored ticket");
            }
        }
    }
}

/// Load a stored ticket, dropping it when expired or malformed
fn restore(store: &dyn TicketStore, key: &str) -> Option<TicketState> {
    let raw = store.get_item(key)?;
    let record = serde_json::from_str::<StoredTicket>(&raw).ok();
    match record.as_ref().and_then(|r| r.expires_at().map(|at| (r, at))) {
        Some((record, expires_at)) if expires_at > Utc::now() => {
            debug!(user_id = %record.user_id, "Restored stored ticket");
            Some(TicketState::Authenticated {
                ticket: record.ticket.clone(),
                user_id: record.user_id.clone(),
                expires_at,
            })
        }
        _ => {
            debug!("Discarding expired or invalid stored ticket");
            if let Err(e) = store.remove_item(key) {
                warn!(error = %e, "Failed to remove stored ticket");
            }
            None
        }
    }
}

#[async_trait]
impl AuthStrategy for TicketAuth {
    fn kind(&self) -> AuthKind {
        AuthKind::Ticket
    }

    async fn get_token(&self, _dbid: Option<&str>) -> Result<String> {
        // Held across the first authentication so concurrent callers share it
        let mut state = self.state.lock().await;

        let lapsed = match &*state {
            TicketState::Authenticated {
                ticket, expires_at, ..
            } if *expires_at > Utc::now() => return Ok(ticket.clone()),
            TicketState::Authenticated { .. } => true,
            TicketState::Expired => return Err(Error::TicketExpired),
            TicketState::Unauthenticated { .. } => false,
        };
        if lapsed {
            info!("Ticket expired");
            *state = TicketState::Expired;
            self.forget();
            return Err(Error::TicketExpired);
        }

        let TicketState::Unauthenticated { password } = &*state else {
            return Err(Error::TicketExpired);
        };
        let (ticket, user_id) = self.authenticate(password).await?;
        let expires_at = Utc::now() + Duration::hours(i64::from(self.hours));

        info!(user_id = %user_id, "Ticket obtained");
        self.persist(&ticket, &user_id, expires_at);
        // Replacing the state drops the password
        *state = TicketState::Authenticated {
            ticket: ticket.clone(),
            user_id,
            expires_at,
        };
        Ok(ticket)
    }

    async fn handle_auth_error(&self, _dbid: Option<&str>) -> bool {
        self.invalidate(None).await;
        false
    }

    async fn invalidate(&self, _dbid: Option<&str>) {
        let mut state = self.state.lock().await;
        if matches!(*state, TicketState::Authenticated { .. }) {
            *state = TicketState::Expired;
            self.forget();
        }
    }
}
