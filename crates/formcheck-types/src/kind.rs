//! Field kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a field participates in a form.
///
/// Only `Info` changes consolidation: an informational field with nothing
/// to report shows no status at all rather than `Valid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Display-only; never expected to carry a value.
    Info,
    #[default]
    Optional,
    Mandatory,
    /// Work-in-progress fields the application fills itself.
    Work,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Info => "info",
            FieldKind::Optional => "optional",
            FieldKind::Mandatory => "mandatory",
            FieldKind::Work => "work",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
