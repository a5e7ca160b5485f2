//! CLI module
//!
//! Command-line interface for the `qb` binary.
//!
//! # Commands
//!
//! - `call` - Run one operation by name and print the JSON response
//! - `xml` - Send a raw legacy XML request
//! - `operations` - List the operation table
//! - `check-read-only` - Classify a request against the read-only rules
//! - `validate` - Resolve the configuration without network access

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
