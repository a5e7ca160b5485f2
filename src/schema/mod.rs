//! Schema aliases
//!
//! Optional human-readable names for tables and fields. A schema document
//! is resolved once per client into [`SchemaResolver`], which the request
//! executor consults in both directions:
//!
//! - outbound: table aliases → dbids, field aliases → field ids
//! - inbound: field ids in returned records → aliases
//!
//! Without a schema every lookup is a passthrough.

mod resolver;
mod transform;
mod types;

pub use resolver::{suggest, FieldRef, SchemaResolver, MAX_SUGGESTION_DISTANCE};
pub use types::{SchemaDocument, TableSchema};
