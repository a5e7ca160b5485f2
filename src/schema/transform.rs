//! Alias rewriting of request and response bodies
//!
//! Outbound, field aliases become ids scoped to the resolved table.
//! Inbound, record keys that are field ids become aliases where the schema
//! has one. Table references (`from` / `to`) are handled by the executor,
//! which also uses them to pick the table scope.

use super::resolver::SchemaResolver;
use crate::error::Result;
use crate::types::{JsonObject, JsonValue};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

/// `{ref.OP.` at the start of a where-clause condition; `ref` may be quoted
static WHERE_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\s*(?:'([^'{}]+)'|([^'.{}]+?))\s*\.\s*([A-Za-z]{2,4})\s*\.")
        .expect("where-clause pattern is valid")
});

impl SchemaResolver {
    /// Rewrite field aliases in an outgoing body to ids
    pub fn transform_request_body(&self, table: &str, body: &mut JsonValue) -> Result<()> {
        let Some(obj) = body.as_object_mut() else {
            return Ok(());
        };

        for key in ["select", "fieldsToReturn"] {
            if let Some(JsonValue::Array(items)) = obj.get_mut(key) {
                for item in items.iter_mut() {
                    *item = json!(self.resolve_field_value(table, item)?);
                }
            }
        }

        for key in ["sortBy", "groupBy"] {
            if let Some(JsonValue::Array(items)) = obj.get_mut(key) {
                for item in items.iter_mut() {
                    if let Some(field) = item.get_mut("fieldId") {
                        *field = json!(self.resolve_field_value(table, field)?);
                    }
                }
            }
        }

        if let Some(field) = obj.get_mut("mergeFieldId") {
            *field = json!(self.resolve_field_value(table, field)?);
        }

        if let Some(JsonValue::String(clause)) = obj.get_mut("where") {
            *clause = self.transform_where(table, clause)?;
        }

        if let Some(JsonValue::Array(records)) = obj.get_mut("data") {
            for record in records.iter_mut() {
                if let JsonValue::Object(fields) = record {
                    *fields = self.record_keys_to_ids(table, std::mem::take(fields))?;
                }
            }
        }

        Ok(())
    }

    /// Rewrite field ids in a response to aliases where known
    pub fn transform_response(&self, table: &str, body: &mut JsonValue) {
        let Some(obj) = body.as_object_mut() else {
            return;
        };

        if let Some(JsonValue::Array(records)) = obj.get_mut("data") {
            for record in records.iter_mut() {
                if let JsonValue::Object(fields) = record {
                    *fields = self.record_keys_to_aliases(table, std::mem::take(fields));
                }
            }
        }

        if let Some(JsonValue::Array(fields)) = obj.get_mut("fields") {
            for field in fields.iter_mut() {
                let alias = field
                    .get("id")
                    .and_then(JsonValue::as_u64)
                    .and_then(|id| self.get_field_alias(table, id))
                    .map(str::to_string);
                if let (Some(alias), Some(field)) = (alias, field.as_object_mut()) {
                    field.insert("alias".to_string(), JsonValue::String(alias));
                }
            }
        }
    }

    /// Replace aliases in `{alias.OP.value}` conditions with field ids
    pub fn transform_where(&self, table: &str, clause: &str) -> Result<String> {
        let mut out = String::with_capacity(clause.len());
        let mut last = 0;

        for caps in WHERE_FIELD.captures_iter(clause) {
            let (Some(whole), Some(op)) = (caps.get(0), caps.get(3)) else {
                continue;
            };
            let Some(reference) = caps.get(1).or_else(|| caps.get(2)) else {
                continue;
            };
            let id = self.resolve_field_alias(table, reference.as_str().trim())?;

            out.push_str(&clause[last..whole.start()]);
            out.push_str(&format!("{{{id}.{}.", op.as_str()));
            last = whole.end();
        }

        out.push_str(&clause[last..]);
        Ok(out)
    }

    fn resolve_field_value(&self, table: &str, value: &JsonValue) -> Result<u64> {
        match value {
            JsonValue::Number(n) => match n.as_u64() {
                Some(id) => Ok(id),
                None => self.resolve_field_alias(table, n.to_string().as_str()),
            },
            JsonValue::String(s) => self.resolve_field_alias(table, s.as_str()),
            other => self.resolve_field_alias(table, other.to_string().as_str()),
        }
    }

    fn record_keys_to_ids(&self, table: &str, record: JsonObject) -> Result<JsonObject> {
        record
            .into_iter()
            .map(|(key, value)| -> Result<(String, JsonValue)> {
                let id = self.resolve_field_alias(table, key.as_str())?;
                Ok((id.to_string(), value))
            })
            .collect()
    }

    fn record_keys_to_aliases(&self, table: &str, record: JsonObject) -> JsonObject {
        record
            .into_iter()
            .map(|(key, value)| {
                let alias = key
                    .parse::<u64>()
                    .ok()
                    .and_then(|id| self.get_field_alias(table, id))
                    .map(str::to_string);
                (alias.unwrap_or(key), value)
            })
            .collect()
    }
}
