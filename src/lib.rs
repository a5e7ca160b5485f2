//! # Quickbase client
//!
//! Request execution runtime for the Quickbase HTTP API. A logical
//! operation ("run this query", "upsert these records") becomes one or
//! more authenticated, throttled, retried and possibly paginated HTTP
//! exchanges.
//!
//! ## Features
//!
//! - **Auth strategies**: user token, temporary tokens per table, XML
//!   ticket with optional persistence, SAML exchange
//! - **Retries**: exponential backoff with jitter, `Retry-After` on 429
//! - **Pagination**: offset (`skip`) and cursor (`nextPageToken`), merged
//! - **Schema aliases**: readable table and field names in both directions
//! - **Read-only mode**: blocks writes before any network I/O
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quickbase_client::{AuthDef, ClientConfig, QuickbaseClient, Result};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::builder(
//!         "acme",
//!         AuthDef::UserToken { token: "b7738j_...".into() },
//!     )
//!     .build();
//!     let client = QuickbaseClient::new(config).await?;
//!
//!     let rows = client
//!         .run_query(json!({"from": "bck7gp3q2", "select": [3, 6]}))
//!         .all()
//!         .await?;
//!     println!("{}", rows["metadata"]["numRecords"]);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │          QuickbaseClient  (operation table → Call)          │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                       PaginationEngine
//!                               │
//! ┌─────────────────────────────┴───────────────────────────────┐
//! │                      RequestExecutor                        │
//! │  aliases → read-only gate → auth → throttle → HTTP → retry  │
//! └─────────────────────────────────────────────────────────────┘
//!        │                │                 │
//!   SchemaResolver   AuthStrategy      ReadOnlyGuard
//!                    (+TokenCache)
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Client configuration
pub mod config;

/// Authentication strategies and token caches
pub mod auth;

/// Request executor with retry and rate limiting
pub mod http;

/// Pagination detection and accumulation
pub mod pagination;

/// Table and field alias resolution
pub mod schema;

/// Read-only request classification
pub mod read_only;

/// Date string normalization
pub mod dates;

/// Operation table and typed client
pub mod operations;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use auth::{AuthKind, AuthStrategy, FileTicketStore, MemoryTicketStore, TicketStore};
pub use config::{AuthDef, ClientConfig, ClientConfigBuilder, RetryConfig, ThrottleConfig};
pub use operations::{Call, QuickbaseClient};
pub use pagination::PaginationMode;
pub use schema::SchemaDocument;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
