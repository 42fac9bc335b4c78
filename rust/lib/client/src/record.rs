//! ERP records.
//!
//! A record is whatever JSON object the ERP returned from `search_read`.
//! The cache never validates its schema. The only normalization offered
//! is for relational fields, which Odoo returns in several shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized many2one field.
///
/// Odoo encodes the same field as `false` when unset, `[id, "label"]`
/// from `search_read`, and a bare `id` in write payloads or custom
/// endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Many2one {
    Unset,
    Id(i64),
    Pair { id: i64, label: String },
}

impl Many2one {
    /// Normalize a raw field value. Unknown shapes map to `Unset`.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => n.as_i64().map(Many2one::Id).unwrap_or(Many2one::Unset),
            Some(Value::Array(items)) => {
                let Some(id) = items.first().and_then(Value::as_i64) else {
                    return Many2one::Unset;
                };
                match items.get(1).and_then(Value::as_str) {
                    Some(label) => Many2one::Pair {
                        id,
                        label: label.to_string(),
                    },
                    None => Many2one::Id(id),
                }
            }
            _ => Many2one::Unset,
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Many2one::Unset => None,
            Many2one::Id(id) | Many2one::Pair { id, .. } => Some(*id),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Many2one::Pair { label, .. } => Some(label),
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Many2one::Unset)
    }

    /// Write-payload form: the bare id, or `false` when unset.
    pub fn to_write_value(&self) -> Value {
        match self.id() {
            Some(id) => Value::from(id),
            None => Value::Bool(false),
        }
    }
}

/// One ERP record, kept as the raw JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Record id, if the ERP sent one.
    pub fn id(&self) -> Option<i64> {
        self.0.get("id").and_then(Value::as_i64)
    }

    pub fn raw(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// String field. Odoo's `false` for empty char fields reads as `None`.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn f64_field(&self, field: &str) -> Option<f64> {
        self.0.get(field).and_then(Value::as_f64)
    }

    pub fn bool_field(&self, field: &str) -> Option<bool> {
        self.0.get(field).and_then(Value::as_bool)
    }

    pub fn many2one(&self, field: &str) -> Many2one {
        Many2one::from_value(self.0.get(field))
    }

    /// Ids of a many2many/one2many field. Non-integer entries are skipped.
    pub fn many2many(&self, field: &str) -> Vec<i64> {
        match self.0.get(field) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_i64).collect(),
            _ => Vec::new(),
        }
    }

    /// Human label: `display_name`, then `name`, then `#id`.
    pub fn label(&self) -> String {
        self.str_field("display_name")
            .or_else(|| self.str_field("name"))
            .map(str::to_string)
            .unwrap_or_else(|| match self.id() {
                Some(id) => format!("#{id}"),
                None => "-".to_string(),
            })
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
