//! Field declarations and the check-function boundary.
//!
//! A [`FieldSpec`] names a field, says how it participates in
//! consolidation ([`FieldKind`]) and optionally carries a [`FieldCheck`].
//! This is the only place user code runs. A check that returns `Err` or
//! panics is caught here and turned into a [`CheckFailure`].

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;

use formcheck_types::{CheckReport, FieldKind, TypedMessage};

/// Positional marker: a name segment ending with it denotes repeated rows.
pub const ROW_MARKER: &str = "[]";

/// Whether a field name addresses a repeated-row path (`contacts[].email`).
pub fn is_arrayed_name(name: &str) -> bool {
    name.split('.').any(|segment| segment.ends_with(ROW_MARKER))
}

/// What a check function gets to see besides the value itself.
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    /// Id of the checker running the check.
    pub checker: String,
    /// Row id, `None` for single-row panels.
    pub row: Option<String>,
    /// Full field name.
    pub field: String,
    /// Values bound in the same row when the check started, by field name.
    pub values: BTreeMap<String, Value>,
}

impl CheckContext {
    /// Look up a sibling value by full name, falling back to its leaf name.
    pub fn value_of(&self, field: &str) -> Option<&Value> {
        self.values.get(field).or_else(|| {
            self.values
                .iter()
                .find(|(name, _)| leaf_of(name) == field)
                .map(|(_, v)| v)
        })
    }
}

/// Per-call options.
///
/// `display: false` suppresses visual side effects (message pushes,
/// indicator updates) but never validity computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOptions {
    pub display: bool,
    pub field_to_skip: Option<String>,
    pub suppress_messages: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            display: true,
            field_to_skip: None,
            suppress_messages: false,
        }
    }
}

impl CheckOptions {
    /// Validate without touching anything the user sees.
    pub fn hidden() -> Self {
        Self {
            display: false,
            ..Self::default()
        }
    }

    pub fn skipping(mut self, field: impl Into<String>) -> Self {
        self.field_to_skip = Some(field.into());
        self
    }

    pub fn without_messages(mut self) -> Self {
        self.suppress_messages = true;
        self
    }

    /// Whether the message sink should be updated for this call.
    pub fn pushes_messages(&self) -> bool {
        self.display && !self.suppress_messages
    }
}

/// An asynchronous check attached to a field.
#[async_trait]
pub trait FieldCheck: Send + Sync {
    /// Inspect `value` and report diagnostics.
    ///
    /// Returning `Err` is allowed; the engine logs it and applies the
    /// configured [`crate::config::CheckErrorPolicy`].
    async fn check(
        &self,
        value: Value,
        ctx: CheckContext,
        opts: CheckOptions,
    ) -> anyhow::Result<CheckReport>;
}

/// Adapter turning an async closure into a [`FieldCheck`].
pub struct FnCheck<F>(F);

impl<F> FnCheck<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> FieldCheck for FnCheck<F>
where
    F: Fn(Value, CheckContext, CheckOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<CheckReport>> + Send + 'static,
{
    async fn check(
        &self,
        value: Value,
        ctx: CheckContext,
        opts: CheckOptions,
    ) -> anyhow::Result<CheckReport> {
        (self.0)(value, ctx, opts).await
    }
}

/// A check that did not produce a report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckFailure {
    #[error("check returned an error: {0}")]
    Errored(String),
    #[error("check panicked: {0}")]
    Panicked(String),
}

/// Declaration of one field.
#[derive(Clone)]
pub struct FieldSpec {
    name: String,
    kind: FieldKind,
    check: Option<Arc<dyn FieldCheck>>,
    arrayed: bool,
}

impl FieldSpec {
    /// Declare a field without a check.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        let arrayed = is_arrayed_name(&name);
        Self {
            name,
            kind,
            check: None,
            arrayed,
        }
    }

    /// Attach a check.
    pub fn with_check(self, check: impl FieldCheck + 'static) -> Self {
        self.with_check_arc(Arc::new(check))
    }

    /// Attach a shared check.
    pub fn with_check_arc(mut self, check: Arc<dyn FieldCheck>) -> Self {
        self.check = Some(check);
        self
    }

    /// Attach an async closure as the check.
    pub fn with_check_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Value, CheckContext, CheckOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<CheckReport>> + Send + 'static,
    {
        self.with_check(FnCheck::new(f))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_arrayed(&self) -> bool {
        self.arrayed
    }

    /// Last name segment without the row marker: `contacts[].email` → `email`.
    pub fn leaf(&self) -> &str {
        leaf_of(&self.name)
    }

    /// True iff a check was supplied. A field without one is always accepted.
    pub fn has_check(&self) -> bool {
        self.check.is_some()
    }

    /// Run the check, surfacing failures.
    ///
    /// Resolves to `Ok(None)` immediately when no check is configured.
    pub async fn try_check(
        &self,
        value: Value,
        ctx: CheckContext,
        opts: CheckOptions,
    ) -> Result<Option<Vec<TypedMessage>>, CheckFailure> {
        let Some(check) = self.check.as_ref() else {
            return Ok(None);
        };

        // A hand-written impl may panic before handing back its future.
        let fut = std::panic::catch_unwind(AssertUnwindSafe(|| check.check(value, ctx, opts)))
            .map_err(|payload| CheckFailure::Panicked(panic_message(payload.as_ref())))?;

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(report)) => Ok(report.into_messages()),
            Ok(Err(e)) => Err(CheckFailure::Errored(format!("{e:#}"))),
            Err(payload) => Err(CheckFailure::Panicked(panic_message(payload.as_ref()))),
        }
    }

    /// Run the check, treating any failure as "no message produced".
    pub async fn check(
        &self,
        value: Value,
        ctx: CheckContext,
        opts: CheckOptions,
    ) -> Option<Vec<TypedMessage>> {
        match self.try_check(value, ctx, opts).await {
            Ok(messages) => messages,
            Err(failure) => {
                tracing::warn!(field = %self.name, error = %failure, "Field check failed, accepting value");
                None
            }
        }
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("arrayed", &self.arrayed)
            .field("has_check", &self.has_check())
            .finish()
    }
}

fn leaf_of(name: &str) -> &str {
    let last = name.rsplit('.').next().unwrap_or(name);
    last.strip_suffix(ROW_MARKER).unwrap_or(last)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcheck_types::Severity;

    fn ctx() -> CheckContext {
        CheckContext {
            checker: "test".into(),
            field: "f".into(),
            ..CheckContext::default()
        }
    }

    #[test]
    fn arrayed_names() {
        assert!(is_arrayed_name("contacts[].email"));
        assert!(is_arrayed_name("rows[]"));
        assert!(!is_arrayed_name("username"));
        assert!(!is_arrayed_name("a.b"));

        let spec = FieldSpec::new("contacts[].email", FieldKind::Mandatory);
        assert!(spec.is_arrayed());
        assert_eq!(spec.leaf(), "email");
        assert_eq!(FieldSpec::new("rows[]", FieldKind::Optional).leaf(), "rows");
    }

    #[tokio::test]
    async fn no_check_resolves_to_none() {
        let spec = FieldSpec::new("name", FieldKind::Optional);
        assert!(!spec.has_check());
        assert_eq!(spec.try_check(Value::Null, ctx(), CheckOptions::default()).await, Ok(None));
    }

    #[tokio::test]
    async fn single_message_is_normalized() {
        let spec = FieldSpec::new("name", FieldKind::Optional).with_check_fn(|_, _, _| async {
            Ok(CheckReport::from(TypedMessage::warning("short")))
        });
        let out = spec.check(Value::Null, ctx(), CheckOptions::default()).await;
        assert_eq!(out, Some(vec![TypedMessage::new(Severity::Warning, "short")]));
    }

    #[tokio::test]
    async fn errors_and_panics_are_caught() {
        let failing = FieldSpec::new("a", FieldKind::Optional)
            .with_check_fn(|_, _, _| async { Err(anyhow::anyhow!("backend down")) });
        let res = failing.try_check(Value::Null, ctx(), CheckOptions::default()).await;
        assert!(matches!(res, Err(CheckFailure::Errored(ref m)) if m.contains("backend down")));
        assert_eq!(failing.check(Value::Null, ctx(), CheckOptions::default()).await, None);

        let panicking = FieldSpec::new("b", FieldKind::Optional).with_check_fn(|_, _, _| async {
            if true {
                panic!("boom");
            }
            Ok(CheckReport::Clear)
        });
        let res = panicking.try_check(Value::Null, ctx(), CheckOptions::default()).await;
        assert_eq!(res, Err(CheckFailure::Panicked("boom".into())));
    }

    #[test]
    fn context_lookup_by_leaf() {
        let mut c = ctx();
        c.values.insert("contacts[].email".into(), Value::from("a@b.c"));
        assert_eq!(c.value_of("email"), Some(&Value::from("a@b.c")));
        assert_eq!(c.value_of("contacts[].email"), Some(&Value::from("a@b.c")));
        assert_eq!(c.value_of("phone"), None);
    }

    #[test]
    fn options_gate_message_pushes() {
        assert!(CheckOptions::default().pushes_messages());
        assert!(!CheckOptions::hidden().pushes_messages());
        assert!(!CheckOptions::default().without_messages().pushes_messages());
    }
}
