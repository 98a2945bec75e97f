//! formcheck-core: client-side form validation aggregation.
//!
//! This crate takes per-field check results and turns them into validity
//! at every level of a form:
//!
//! - **Fields** ([`FieldSpec`]): a name, a kind and an async check function
//! - **Runtimes** ([`FieldRuntime`], [`RowDataset`]): per-field and per-row
//!   observable state, consolidated to a [`Verdict`]
//! - **Checkers** ([`Checker`]): one per panel, arranged in a tree whose
//!   validity flows upward to the root
//! - **Messages** ([`MessageStack`], [`MessageSink`]): the diagnostics
//!   currently shown, replaced per emitter
//! - **Rules** ([`rules`]): stock checks usable from code or TOML
//! - **Definitions** ([`definition`]): whole forms described in TOML
//!
//! # Quick start
//!
//! ```ignore
//! use formcheck_core::{definition::FormDefinition, CheckOptions};
//!
//! let form = FormDefinition::from_toml_str(toml)?.build()?;
//! form.bind(&values)?;
//! if !form.check_all().await {
//!     for entry in form.messages() {
//!         eprintln!("{}: {}", entry.emitter, entry.message);
//!     }
//! }
//! ```

pub mod checker;
pub mod config;
pub mod definition;
pub mod error;
pub mod field;
pub mod hierarchy;
pub mod message;
pub mod observable;
pub mod panel;
pub mod report;
pub mod rules;
pub mod runtime;
pub mod status;

pub use checker::{Checker, CheckerBuilder, RowKey};
pub use config::{CheckErrorPolicy, CheckerConfig, StaleCheckPolicy};
pub use definition::{Form, FormDefinition};
pub use error::{FormError, FormResult};
pub use field::{CheckContext, CheckFailure, CheckOptions, FieldCheck, FieldSpec, FnCheck};
pub use message::{MessageSink, MessageStack, StackEntry};
pub use observable::{Observable, SubscriptionId};
pub use panel::{PanelSpec, RowIdentifier};
pub use report::{CheckerReport, FieldReport, RowReport};
pub use rules::{Rule, RuleSet};
pub use runtime::{FieldRuntime, RowDataset, VerdictCells};

pub use formcheck_types::{
    CheckReport, FieldKind, Severity, StatusLevel, TypedMessage, UnknownLevel, Verdict,
};
