//! formcheck-types: pure data types shared by the formcheck engine.
//!
//! Nothing in here knows about checkers, cells or async. These are the
//! values that flow between a field's check function and the aggregation
//! core:
//!
//! - **StatusLevel**: the ordered display status (`None < Valid < Uncomplete < Invalid`)
//! - **Severity**: the ordered message severity (`Info < Warning < Error`)
//! - **TypedMessage**: a diagnostic produced by a check
//! - **CheckReport**: what a check function hands back (nothing, one, many)
//! - **FieldKind**: how a field participates in consolidation
//! - **Verdict**: the `(valid, status)` pair every consolidation produces

mod kind;
mod message;
mod status;

pub use kind::FieldKind;
pub use message::{CheckReport, Severity, TypedMessage};
pub use status::{StatusLevel, UnknownLevel, Verdict};
