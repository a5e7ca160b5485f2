//! Auth types shared by the strategies

use chrono::{DateTime, Utc};
use std::fmt;

/// Default cache lifetime for temporary tokens, kept under the
/// provider's 5 minute expiry to leave refresh headroom
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 290;

/// Which credential scheme a strategy produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    /// `QB-USER-TOKEN`
    UserToken,
    /// `QB-TEMP-TOKEN`
    TempToken,
    /// `QB-TICKET`
    Ticket,
    /// `QB-TEMP-TOKEN` obtained by SAML exchange
    Sso,
}

impl AuthKind {
    /// Authorization scheme name
    pub fn scheme(self) -> &'static str {
        match self {
            AuthKind::UserToken => "QB-USER-TOKEN",
            AuthKind::TempToken | AuthKind::Sso => "QB-TEMP-TOKEN",
            AuthKind::Ticket => "QB-TICKET",
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthKind::UserToken => "user-token",
            AuthKind::TempToken => "temp-token",
            AuthKind::Ticket => "ticket",
            AuthKind::Sso => "sso",
        };
        f.write_str(name)
    }
}

/// Cached credential with expiration
#[derive(Debug, Clone)]
pub struct TokenCacheEntry {
    /// The token
    pub token: String,
    /// When the token stops being served from the cache
    pub expires_at: DateTime<Utc>,
}

impl TokenCacheEntry {
    /// Create a new entry
    pub fn new(token: String, expires_at: DateTime<Utc>) -> Self {
        Self { token, expires_at }
    }

    /// Create an entry that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        Self {
            token,
            expires_at: Utc::now() + chrono::Duration::seconds(seconds),
        }
    }

    /// Expired at `now` when `expires_at <= now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Check if the entry is expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod type_tests {
    use super::*;

    #[test]
    fn test_entry_not_expired() {
        let entry = TokenCacheEntry::expires_in("test".to_string(), 3600);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expired() {
        let entry = TokenCacheEntry::expires_in("test".to_string(), -100);
        assert!(entry.is_expired());
    }

    #[test]
    fn test_entry_expires_exactly_at_boundary() {
        let now = Utc::now();
        let entry = TokenCacheEntry::new("t".to_string(), now);
        assert!(entry.is_expired_at(now));
    }

    #[test]
    fn test_schemes() {
        assert_eq!(AuthKind::UserToken.scheme(), "QB-USER-TOKEN");
        assert_eq!(AuthKind::Sso.scheme(), "QB-TEMP-TOKEN");
        assert_eq!(AuthKind::Ticket.to_string(), "ticket");
    }
}
