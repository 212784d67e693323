//! Loosely typed records returned by the upstream list endpoints.
//!
//! The six record kinds share no schema, so a [Record] is a thin wrapper
//! around a JSON object with accessors that treat Odoo's "empty" values
//! (`false`, `null` and empty strings) as absent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::format::format_relation;

/// A single item from one of the upstream list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

/// A relational (many-to-one) field.
///
/// Odoo serialises these as `[id, display_name]`, the upstream sometimes
/// flattens them to a plain string, and an empty relation is `false`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Relation<'a> {
    /// The `[id, display_name]` form.
    Pair {
        /// The related record's database ID, if it is a number.
        id: Option<i64>,
        /// The related record's display name.
        name: &'a str,
    },
    /// A display name without an ID.
    Name(&'a str),
    /// The field is missing or empty.
    Absent,
}

impl<'a> Relation<'a> {
    /// The display name of the relation, if there is one.
    pub fn name(self) -> Option<&'a str> {
        match self {
            Relation::Pair { name, .. } | Relation::Name(name) if !name.is_empty() => Some(name),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl Record {
    /// Get the value of `field`, treating `null` and `false` as missing.
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self.0.get(field) {
            None | Some(Value::Null) | Some(Value::Bool(false)) => None,
            Some(value) => Some(value),
        }
    }

    /// Get `field` as a non-empty string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
    }

    /// The first of `fields` that holds a non-empty string.
    pub fn first_text(&self, fields: &[&str]) -> Option<&str> {
        fields.iter().find_map(|field| self.text(field))
    }

    /// Get `field` as a number.
    ///
    /// Numeric strings are parsed, anything else counts as zero.
    pub fn number(&self, field: &str) -> f64 {
        match self.get(field) {
            Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
            Some(Value::String(text)) => text.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Get a scalar `field` (string or number) as display text.
    pub fn display(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::String(text) if !text.is_empty() => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }

    /// Interpret `field` as a relational field.
    pub fn relation(&self, field: &str) -> Relation<'_> {
        match self.get(field) {
            Some(Value::Array(pair)) if !pair.is_empty() => Relation::Pair {
                id: pair.first().and_then(Value::as_i64),
                name: pair.get(1).and_then(Value::as_str).unwrap_or_default(),
            },
            Some(Value::String(name)) if !name.is_empty() => Relation::Name(name),
            _ => Relation::Absent,
        }
    }

    /// The name used when matching search text against this record.
    ///
    /// Tries `name`, then `partner_name`, then the display of the
    /// `partner_id` or `partner` relation, and falls back to an empty string.
    pub fn search_name(&self) -> String {
        if let Some(name) = self.first_text(&["name", "partner_name"]) {
            return name.to_owned();
        }

        ["partner_id", "partner"]
            .iter()
            .map(|field| self.relation(field))
            .find(|relation| *relation != Relation::Absent)
            .map(format_relation)
            .unwrap_or_default()
    }
}
