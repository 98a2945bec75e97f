//! Serializable snapshots of checker state.

use serde::Serialize;
use serde_json::Value;

use formcheck_types::{StatusLevel, TypedMessage};

/// One field in one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldReport {
    pub name: String,
    pub value: Value,
    pub valid: bool,
    pub status: StatusLevel,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<TypedMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub valid: bool,
    pub status: StatusLevel,
    pub fields: Vec<FieldReport>,
}

/// A checker and, recursively, its children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckerReport {
    pub id: String,
    pub valid: bool,
    pub status: StatusLevel,
    pub rows: Vec<RowReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CheckerReport>,
}

impl CheckerReport {
    /// Every field of this checker and its descendants, with the id of the
    /// checker and row it belongs to.
    pub fn flatten(&self) -> Vec<(&str, Option<&str>, &FieldReport)> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<(&'a str, Option<&'a str>, &'a FieldReport)>) {
        for row in &self.rows {
            for field in &row.fields {
                out.push((self.id.as_str(), row.id.as_deref(), field));
            }
        }
        for child in &self.children {
            child.collect(out);
        }
    }

    /// Depth-first lookup of a checker report by id.
    pub fn find(&self, id: &str) -> Option<&CheckerReport> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}
