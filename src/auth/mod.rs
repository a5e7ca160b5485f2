//! Authentication module
//!
//! Supports: user token, temporary token, ticket (XML), SSO (SAML exchange)
//!
//! Each variant implements [`AuthStrategy`]; the request executor holds an
//! `Arc<dyn AuthStrategy>` built by [`build_strategy`] and never inspects
//! which variant it has.

mod cache;
mod strategy;
mod ticket;
mod types;

pub use cache::{KeyedLocks, TokenCache};
pub use strategy::{encode_assertion, AuthStrategy, SsoAuth, TempTokenAuth, UserTokenAuth, REALM_HEADER};
pub use ticket::{
    clamp_hours, store_key, FileTicketStore, MemoryTicketStore, Password, StoredTicket, TicketAuth,
    TicketStore, DEFAULT_TICKET_HOURS, MAX_TICKET_HOURS,
};
pub use types::{AuthKind, TokenCacheEntry, DEFAULT_TOKEN_TTL_SECS};

use crate::config::{AuthDef, ResolvedConfig};
use crate::error::{Error, Result};
use reqwest::Client;
use std::sync::Arc;

/// Build the strategy for an auth descriptor.
///
/// A ticket store passed here takes precedence over `persistPath`.
pub async fn build_strategy(
    auth: AuthDef,
    config: &ResolvedConfig,
    http: Client,
    ticket_store: Option<Arc<dyn TicketStore>>,
) -> Result<Arc<dyn AuthStrategy>> {
    let strategy: Arc<dyn AuthStrategy> = match auth {
        AuthDef::UserToken { token } => {
            if token.trim().is_empty() {
                return Err(Error::missing_field("auth.token"));
            }
            Arc::new(UserTokenAuth::new(token))
        }

        AuthDef::TempToken { token, dbid } => {
            let auth = TempTokenAuth::new(http, config);
            match (token, dbid) {
                (Some(token), Some(dbid)) => auth.seed(&dbid, token).await,
                (Some(_), None) => {
                    return Err(Error::config(
                        "auth.token for temp-token auth needs the dbid it was issued for",
                    ))
                }
                _ => {}
            }
            Arc::new(auth)
        }

        AuthDef::Ticket {
            username,
            password,
            hours,
            persist_path,
        } => {
            if username.trim().is_empty() {
                return Err(Error::missing_field("auth.username"));
            }
            let store = ticket_store.or_else(|| {
                persist_path.map(|path| Arc::new(FileTicketStore::new(path)) as Arc<dyn TicketStore>)
            });
            Arc::new(TicketAuth::new(
                http,
                config,
                username,
                Password::from(password),
                hours,
                store,
            ))
        }

        AuthDef::Sso { saml_assertion } => {
            if saml_assertion.trim().is_empty() {
                return Err(Error::missing_field("auth.samlAssertion"));
            }
            Arc::new(SsoAuth::new(http, config, &saml_assertion))
        }
    };

    Ok(strategy)
}
