//! CLI commands and argument parsing

use crate::types::{LogLevel, Method};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Quickbase API client
#[derive(Parser, Debug)]
#[command(name = "qb")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Client configuration file (YAML, or JSON with a `.json` extension)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Realm name or hostname, used without a config file
    #[arg(long, global = true, env = "QB_REALM")]
    pub realm: Option<String>,

    /// User token, used without a config file
    #[arg(long, global = true, env = "QB_USER_TOKEN", hide_env_values = true)]
    pub user_token: Option<String>,

    /// Block every request that could modify data
    #[arg(long, global = true)]
    pub read_only: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, value_enum, default_value = "warn", ignore_case = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one operation and print the response
    Call {
        /// Operation name, e.g. runQuery
        operation: String,

        /// Parameters as a JSON object (path, query, `body`, `dbid`)
        #[arg(short, long)]
        params: Option<String>,

        /// Read the parameters from a JSON file
        #[arg(long, conflicts_with = "params")]
        params_file: Option<PathBuf>,

        /// Fetch every page
        #[arg(long, conflicts_with_all = ["limit", "no_paginate"])]
        all: bool,

        /// Fetch pages until this many records are collected
        #[arg(long, conflicts_with = "no_paginate")]
        limit: Option<usize>,

        /// Single page even when the config enables auto-pagination
        #[arg(long)]
        no_paginate: bool,
    },

    /// Send a legacy XML request and print the raw response
    Xml {
        /// Action, e.g. API_DoQuery
        action: String,

        /// Table or app id the action targets (`main` for realm-level actions)
        dbid: String,

        /// Inner XML appended to the request envelope
        #[arg(long, default_value = "")]
        inner: String,
    },

    /// List the operations `call` accepts
    Operations,

    /// Report whether a request would be blocked on a read-only client
    CheckReadOnly {
        /// HTTP method
        #[arg(value_enum, ignore_case = true)]
        method: Method,

        /// Request path, e.g. /records/query
        path: String,
    },

    /// Validate the configuration without sending requests
    Validate,
}

impl Commands {
    /// Subcommand name as typed on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Call { .. } => "call",
            Commands::Xml { .. } => "xml",
            Commands::Operations => "operations",
            Commands::CheckReadOnly { .. } => "check-read-only",
            Commands::Validate => "validate",
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON on one line
    Json,
    /// Indented JSON
    Pretty,
}
