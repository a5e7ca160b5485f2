//! Bidirectional alias ↔ id resolution

use super::types::SchemaDocument;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Maximum edit distance for a "did you mean" suggestion
pub const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Alias lists longer than this are not enumerated in errors
pub const MAX_LISTED_ALIASES: usize = 10;

/// A field reference: numeric id or alias / numeric string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef<'a> {
    /// Raw field id
    Id(u64),
    /// Alias, or a field id written as a string
    Name(&'a str),
}

impl From<u64> for FieldRef<'_> {
    fn from(id: u64) -> Self {
        FieldRef::Id(id)
    }
}

impl<'a> From<&'a str> for FieldRef<'a> {
    fn from(name: &'a str) -> Self {
        FieldRef::Name(name)
    }
}

#[derive(Debug, Default)]
struct FieldMaps {
    by_alias: HashMap<String, u64>,
    by_id: HashMap<u64, String>,
}

/// Resolved alias maps, built once per client
#[derive(Debug, Default)]
pub struct SchemaResolver {
    table_ids: HashMap<String, String>,
    table_aliases: HashMap<String, String>,
    fields: HashMap<String, FieldMaps>,
}

impl SchemaResolver {
    /// Build the four lookup maps, rejecting ids that appear twice in one scope
    pub fn new(document: &SchemaDocument) -> Result<Self> {
        let mut resolver = Self::default();

        for (alias, table) in &document.tables {
            if let Some(existing) = resolver.table_aliases.get(&table.id) {
                return Err(Error::config(format!(
                    "Schema maps table id '{}' to both '{existing}' and '{alias}'",
                    table.id
                )));
            }
            resolver.table_ids.insert(alias.clone(), table.id.clone());
            resolver
                .table_aliases
                .insert(table.id.clone(), alias.clone());

            let mut maps = FieldMaps::default();
            for (field_alias, field_id) in &table.fields {
                if let Some(existing) = maps.by_id.get(field_id) {
                    return Err(Error::config(format!(
                        "Schema table '{alias}' maps field id {field_id} to both '{existing}' and '{field_alias}'"
                    )));
                }
                maps.by_alias.insert(field_alias.clone(), *field_id);
                maps.by_id.insert(*field_id, field_alias.clone());
            }
            resolver.fields.insert(table.id.clone(), maps);
        }

        Ok(resolver)
    }

    /// Resolve a table alias to its id; known ids pass through unchanged
    pub fn resolve_table_alias(&self, reference: &str) -> Result<String> {
        if let Some(id) = self.table_ids.get(reference) {
            return Ok(id.clone());
        }
        if self.table_aliases.contains_key(reference) {
            return Ok(reference.to_string());
        }

        let aliases = sorted_keys(self.table_ids.keys());
        Err(schema_error(
            format!("Unknown table alias '{reference}'"),
            reference,
            &aliases,
            "tables",
        ))
    }

    /// Resolve a field reference within a table (given as alias or id)
    pub fn resolve_field_alias<'a>(&self, table: &str, field: impl Into<FieldRef<'a>>) -> Result<u64> {
        let name = match field.into() {
            FieldRef::Id(id) => return Ok(id),
            FieldRef::Name(name) => name,
        };

        let table_id = self.table_id_or_raw(table);
        let maps = self.fields.get(table_id);

        if let Some(id) = maps.and_then(|m| m.by_alias.get(name)) {
            return Ok(*id);
        }
        if let Ok(id) = name.trim().parse::<u64>() {
            return Ok(id);
        }

        let aliases = maps
            .map(|m| sorted_keys(m.by_alias.keys()))
            .unwrap_or_default();
        let table_label = self.get_table_alias(table_id).unwrap_or(table_id);
        Err(schema_error(
            format!("Unknown field alias '{name}' in table '{table_label}'"),
            name,
            &aliases,
            "fields",
        ))
    }

    /// Reverse lookup: table id → alias
    pub fn get_table_alias(&self, table_id: &str) -> Option<&str> {
        self.table_aliases.get(table_id).map(String::as_str)
    }

    /// Reverse lookup: field id → alias, table given as alias or id
    pub fn get_field_alias(&self, table: &str, field_id: u64) -> Option<&str> {
        self.fields
            .get(self.table_id_or_raw(table))?
            .by_id
            .get(&field_id)
            .map(String::as_str)
    }

    /// Whether the id or alias names a table in the schema
    pub fn knows_table(&self, reference: &str) -> bool {
        self.table_ids.contains_key(reference) || self.table_aliases.contains_key(reference)
    }

    /// Table aliases in sorted order
    pub fn table_alias_list(&self) -> Vec<String> {
        sorted_keys(self.table_ids.keys())
    }

    fn table_id_or_raw<'s>(&'s self, table: &'s str) -> &'s str {
        self.table_ids.get(table).map_or(table, String::as_str)
    }
}

fn sorted_keys<'a>(keys: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut keys: Vec<String> = keys.cloned().collect();
    keys.sort();
    keys
}

fn schema_error(mut message: String, reference: &str, candidates: &[String], noun: &str) -> Error {
    let suggestion = suggest(reference, candidates);
    if let Some(s) = &suggestion {
        message.push_str(&format!(". Did you mean '{s}'?"));
    }

    let available = if candidates.len() <= MAX_LISTED_ALIASES {
        candidates.to_vec()
    } else {
        Vec::new()
    };
    if !available.is_empty() {
        if suggestion.is_none() {
            message.push('.');
        }
        message.push_str(&format!(" Available {noun}: {}", available.join(", ")));
    }

    Error::Schema {
        message,
        suggestion,
        available,
    }
}

/// Closest candidate within [`MAX_SUGGESTION_DISTANCE`]; ties go to the first
pub fn suggest(reference: &str, candidates: &[String]) -> Option<String> {
    let needle = reference.to_lowercase();
    candidates
        .iter()
        .map(|c| (strsim::levenshtein(&needle, &c.to_lowercase()), c))
        .filter(|(d, _)| *d <= MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c.clone())
}
