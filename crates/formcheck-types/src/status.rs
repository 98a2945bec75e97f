//! Status levels and the `worst` reduction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Raised when a status or severity name/index is not a recognized member.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} level: {value}")]
pub struct UnknownLevel {
    /// Which enumeration was being parsed ("status" or "severity").
    pub kind: &'static str,
    /// The offending input, as written.
    pub value: String,
}

impl UnknownLevel {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Display status of a field, row, panel or checker tree.
///
/// The order is fixed and is the only thing ever compared: a level is
/// "worse" than another iff its index is higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    /// Nothing to show (informational fields, empty panels).
    #[default]
    None,
    /// Checked and accepted.
    Valid,
    /// Accepted, but something is missing or worth a warning.
    Uncomplete,
    /// At least one blocking message.
    Invalid,
}

impl StatusLevel {
    /// All members, in order.
    pub const ALL: [StatusLevel; 4] = [
        StatusLevel::None,
        StatusLevel::Valid,
        StatusLevel::Uncomplete,
        StatusLevel::Invalid,
    ];

    /// Position in the fixed order.
    pub fn index(self) -> usize {
        match self {
            StatusLevel::None => 0,
            StatusLevel::Valid => 1,
            StatusLevel::Uncomplete => 2,
            StatusLevel::Invalid => 3,
        }
    }

    /// Inverse of [`StatusLevel::index`].
    pub fn from_index(index: usize) -> Result<Self, UnknownLevel> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or_else(|| UnknownLevel::new("status", index.to_string()))
    }

    /// The member with the highest index, or `None` for an empty input.
    ///
    /// Input order does not matter.
    pub fn worst<I>(levels: I) -> StatusLevel
    where
        I: IntoIterator<Item = StatusLevel>,
    {
        levels
            .into_iter()
            .max_by_key(|level| level.index())
            .unwrap_or(StatusLevel::None)
    }

    /// Lowercase name, as used in configuration and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            StatusLevel::None => "none",
            StatusLevel::Valid => "valid",
            StatusLevel::Uncomplete => "uncomplete",
            StatusLevel::Invalid => "invalid",
        }
    }
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(StatusLevel::None),
            "valid" => Ok(StatusLevel::Valid),
            "uncomplete" => Ok(StatusLevel::Uncomplete),
            "invalid" => Ok(StatusLevel::Invalid),
            _ => Err(UnknownLevel::new("status", s)),
        }
    }
}

/// The `(valid, status)` pair produced by every consolidation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub valid: bool,
    pub status: StatusLevel,
}

impl Verdict {
    pub const fn new(valid: bool, status: StatusLevel) -> Self {
        Self { valid, status }
    }

    /// What an empty aggregate reports: nothing blocks, nothing to show.
    pub const fn empty() -> Self {
        Self::new(true, StatusLevel::None)
    }

    /// Fold a set of verdicts: AND of validity, worst of statuses.
    ///
    /// `seed` takes part in the status reduction only; use
    /// `StatusLevel::None` to leave it neutral.
    pub fn fold<I>(seed: StatusLevel, verdicts: I) -> Verdict
    where
        I: IntoIterator<Item = Verdict>,
    {
        let mut valid = true;
        let mut status = seed;
        for v in verdicts {
            valid &= v.valid;
            status = StatusLevel::worst([status, v.status]);
        }
        Verdict { valid, status }
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Self::empty()
    }
}
