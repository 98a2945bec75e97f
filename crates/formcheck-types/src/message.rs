//! Typed diagnostics produced by field checks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::status::UnknownLevel;

/// Message severity.
///
/// Anything at or above [`Severity::BLOCKING`] makes its field invalid.
/// Below that, `Warning` marks the field uncomplete and `Info` is purely
/// informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Lowest severity that blocks validity.
    pub const BLOCKING: Severity = Severity::Error;

    pub fn is_blocking(self) -> bool {
        self >= Self::BLOCKING
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            _ => Err(UnknownLevel::new("severity", s)),
        }
    }
}

/// A single diagnostic: a severity and a human-readable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedMessage {
    pub level: Severity,
    pub text: String,
}

impl TypedMessage {
    pub fn new(level: Severity, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(Severity::Info, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(Severity::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Severity::Error, text)
    }

    pub fn is_blocking(&self) -> bool {
        self.level.is_blocking()
    }
}

impl fmt::Display for TypedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.text)
    }
}

/// What a check function returns.
///
/// Checks may report nothing, a single message, or a list. The engine only
/// ever works with the normalized form from [`CheckReport::into_messages`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckReport {
    #[default]
    Clear,
    One(TypedMessage),
    Many(Vec<TypedMessage>),
}

impl CheckReport {
    /// Normalize: `Clear` becomes `None`, a single message a one-element list.
    pub fn into_messages(self) -> Option<Vec<TypedMessage>> {
        match self {
            CheckReport::Clear => None,
            CheckReport::One(msg) => Some(vec![msg]),
            CheckReport::Many(msgs) => Some(msgs),
        }
    }
}

impl From<TypedMessage> for CheckReport {
    fn from(msg: TypedMessage) -> Self {
        CheckReport::One(msg)
    }
}

impl From<Vec<TypedMessage>> for CheckReport {
    fn from(msgs: Vec<TypedMessage>) -> Self {
        CheckReport::Many(msgs)
    }
}

impl From<Option<TypedMessage>> for CheckReport {
    fn from(msg: Option<TypedMessage>) -> Self {
        msg.map_or(CheckReport::Clear, CheckReport::One)
    }
}
