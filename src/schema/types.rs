//! Schema document types
//!
//! The user-supplied alias document:
//!
//! ```yaml
//! tables:
//!   orders:
//!     id: bck7gp3q2
//!     fields:
//!       total: 7
//!       customer: 8
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Alias document for tables and fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Tables keyed by alias
    #[serde(default)]
    pub tables: BTreeMap<String, TableSchema>,
}

/// One table in the alias document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table dbid
    pub id: String,
    /// Field ids keyed by alias
    #[serde(default)]
    pub fields: BTreeMap<String, u64>,
}

impl SchemaDocument {
    /// Parse a YAML (or JSON, which is valid YAML) document
    pub fn from_yaml_str(yaml: &str) -> crate::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Add a table (builder style, mostly for tests and programmatic setup)
    #[must_use]
    pub fn table<I, S>(mut self, alias: impl Into<String>, id: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        self.tables.insert(
            alias.into(),
            TableSchema {
                id: id.into(),
                fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            },
        );
        self
    }
}
