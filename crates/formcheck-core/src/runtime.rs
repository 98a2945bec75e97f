//! Per-field and per-row mutable validation state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use formcheck_types::{FieldKind, Severity, StatusLevel, TypedMessage, Verdict};

use crate::field::FieldSpec;
use crate::observable::{Observable, SubscriptionId, lock};

/// Turn a check result into a field verdict.
///
/// An empty or missing result is valid; its status is `None` for
/// informational fields and `Valid` otherwise. Any blocking message makes
/// the field invalid. Warnings make it uncomplete.
pub fn consolidate(results: Option<&[TypedMessage]>, kind: FieldKind) -> Verdict {
    let messages = match results {
        Some(m) if !m.is_empty() => m,
        _ => {
            let status = if kind == FieldKind::Info {
                StatusLevel::None
            } else {
                StatusLevel::Valid
            };
            return Verdict::new(true, status);
        }
    };

    let mut valid = true;
    let mut levels = vec![StatusLevel::Valid];
    for msg in messages {
        if msg.is_blocking() {
            valid = false;
            levels.push(StatusLevel::Invalid);
        } else if msg.level == Severity::Warning {
            levels.push(StatusLevel::Uncomplete);
        }
    }
    Verdict::new(valid, StatusLevel::worst(levels))
}

/// A `valid` cell and a `status` cell published together.
///
/// Both values are stored before either cell notifies, so no listener can
/// observe one half of a verdict.
#[derive(Debug)]
pub struct VerdictCells {
    valid: Observable<bool>,
    status: Observable<StatusLevel>,
}

impl VerdictCells {
    pub fn new(initial: Verdict) -> Self {
        Self {
            valid: Observable::new(initial.valid),
            status: Observable::new(initial.status),
        }
    }

    pub fn get(&self) -> Verdict {
        Verdict::new(self.valid.get(), self.status.get())
    }

    pub fn valid(&self) -> bool {
        self.valid.get()
    }

    pub fn status(&self) -> StatusLevel {
        self.status.get()
    }

    /// Store both halves, then notify whichever changed.
    pub fn publish(&self, verdict: Verdict) -> bool {
        let valid_changed = self.valid.store(verdict.valid);
        let status_changed = self.status.store(verdict.status);
        if valid_changed {
            self.valid.notify();
        }
        if status_changed {
            self.status.notify();
        }
        valid_changed || status_changed
    }

    pub fn on_valid<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.valid.subscribe(listener)
    }

    pub fn on_status<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&StatusLevel) + Send + Sync + 'static,
    {
        self.status.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.valid.unsubscribe(id) || self.status.unsubscribe(id)
    }
}

impl Default for VerdictCells {
    fn default() -> Self {
        Self::new(Verdict::empty())
    }
}

/// Validation state of one field in one row.
#[derive(Debug)]
pub struct FieldRuntime {
    spec: FieldSpec,
    value: Observable<Value>,
    last_result: Observable<Option<Vec<TypedMessage>>>,
    verdict: VerdictCells,
    indicator: Observable<StatusLevel>,
    generation: AtomicU64,
}

impl FieldRuntime {
    /// A never-checked field: no value, no result, nothing shown yet.
    pub fn new(spec: FieldSpec) -> Self {
        Self {
            spec,
            value: Observable::new(Value::Null),
            last_result: Observable::new(None),
            verdict: VerdictCells::new(Verdict::new(true, StatusLevel::None)),
            indicator: Observable::new(StatusLevel::None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn value(&self) -> Value {
        self.value.get()
    }

    pub fn set_value(&self, value: Value) -> bool {
        self.value.set(value)
    }

    /// Store the value a check is about to run on and return its generation.
    pub fn begin_check(&self, value: Value) -> u64 {
        self.value.set(value);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Generation of the most recently started check.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Record a finished check: its messages and their consolidation.
    pub fn record(&self, results: Option<Vec<TypedMessage>>) -> Verdict {
        let verdict = consolidate(results.as_deref(), self.spec.kind());
        self.last_result.set(results);
        self.verdict.publish(verdict);
        verdict
    }

    pub fn last_result(&self) -> Option<Vec<TypedMessage>> {
        self.last_result.get()
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict.get()
    }

    pub fn valid(&self) -> bool {
        self.verdict.valid()
    }

    pub fn status(&self) -> StatusLevel {
        self.verdict.status()
    }

    pub fn cells(&self) -> &VerdictCells {
        &self.verdict
    }

    pub fn value_cell(&self) -> &Observable<Value> {
        &self.value
    }

    /// Status displayed next to the field.
    pub fn indicator(&self) -> &Observable<StatusLevel> {
        &self.indicator
    }
}

/// The field runtimes of one row.
///
/// `id` is `None` for the single row of a non array-ed panel.
#[derive(Debug)]
pub struct RowDataset {
    id: Option<String>,
    fields: Mutex<BTreeMap<String, Arc<FieldRuntime>>>,
    verdict: VerdictCells,
}

impl RowDataset {
    pub fn new(id: Option<String>) -> Self {
        Self {
            id,
            fields: Mutex::new(BTreeMap::new()),
            verdict: VerdictCells::default(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Get the runtime for a field, creating it on first use.
    pub fn runtime(&self, spec: &FieldSpec) -> Arc<FieldRuntime> {
        lock(&self.fields)
            .entry(spec.name().to_string())
            .or_insert_with(|| Arc::new(FieldRuntime::new(spec.clone())))
            .clone()
    }

    pub fn get(&self, field: &str) -> Option<Arc<FieldRuntime>> {
        lock(&self.fields).get(field).cloned()
    }

    pub fn runtimes(&self) -> Vec<Arc<FieldRuntime>> {
        lock(&self.fields).values().cloned().collect()
    }

    /// Bound values by field name.
    pub fn values(&self) -> BTreeMap<String, Value> {
        lock(&self.fields)
            .iter()
            .map(|(name, rt)| (name.clone(), rt.value()))
            .collect()
    }

    /// Re-derive the row verdict: AND of validity, worst of `Valid` and
    /// every field status.
    pub fn consolidate(&self) -> Verdict {
        let verdict = Verdict::fold(
            StatusLevel::Valid,
            self.runtimes().iter().map(|rt| rt.verdict()),
        );
        self.verdict.publish(verdict);
        verdict
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict.get()
    }

    pub fn cells(&self) -> &VerdictCells {
        &self.verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn any_kind() -> impl Strategy<Value = FieldKind> {
        prop_oneof![
            Just(FieldKind::Info),
            Just(FieldKind::Optional),
            Just(FieldKind::Mandatory),
            Just(FieldKind::Work),
        ]
    }

    fn any_message() -> impl Strategy<Value = TypedMessage> {
        (0usize..3, "[a-z]{0,8}").prop_map(|(lvl, text)| {
            let level = [Severity::Info, Severity::Warning, Severity::Error][lvl];
            TypedMessage::new(level, text)
        })
    }

    #[rstest]
    #[case(FieldKind::Info, StatusLevel::None)]
    #[case(FieldKind::Optional, StatusLevel::Valid)]
    #[case(FieldKind::Mandatory, StatusLevel::Valid)]
    #[case(FieldKind::Work, StatusLevel::Valid)]
    fn empty_results(#[case] kind: FieldKind, #[case] status: StatusLevel) {
        assert_eq!(consolidate(None, kind), Verdict::new(true, status));
        assert_eq!(consolidate(Some(&[]), kind), Verdict::new(true, status));
        // deterministic
        assert_eq!(consolidate(None, kind), consolidate(None, kind));
    }

    #[test]
    fn warning_is_uncomplete_but_valid() {
        let v = consolidate(Some(&[TypedMessage::warning("hmm")]), FieldKind::Mandatory);
        assert_eq!(v, Verdict::new(true, StatusLevel::Uncomplete));
    }

    #[test]
    fn info_message_keeps_valid() {
        let v = consolidate(Some(&[TypedMessage::info("fyi")]), FieldKind::Info);
        assert_eq!(v, Verdict::new(true, StatusLevel::Valid));
    }

    #[test]
    fn error_wins_over_warning() {
        let msgs = [TypedMessage::warning("a"), TypedMessage::error("b")];
        assert_eq!(
            consolidate(Some(&msgs), FieldKind::Optional),
            Verdict::new(false, StatusLevel::Invalid)
        );
    }

    #[test]
    fn publish_is_atomic_for_listeners() {
        let cells = Arc::new(VerdictCells::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let c = cells.clone();
        let s = seen.clone();
        cells.on_valid(move |valid| {
            lock(&s).push((*valid, c.status()));
        });

        cells.publish(Verdict::new(false, StatusLevel::Invalid));
        assert_eq!(*lock(&seen), vec![(false, StatusLevel::Invalid)]);
    }

    #[test]
    fn row_consolidation_folds_fields() {
        let row = RowDataset::new(Some("r1".into()));
        let a = row.runtime(&FieldSpec::new("a", FieldKind::Optional));
        let b = row.runtime(&FieldSpec::new("b", FieldKind::Optional));

        a.record(None);
        b.record(Some(vec![TypedMessage::warning("w")]));
        assert_eq!(row.consolidate(), Verdict::new(true, StatusLevel::Uncomplete));

        b.record(Some(vec![TypedMessage::error("e")]));
        assert_eq!(row.consolidate(), Verdict::new(false, StatusLevel::Invalid));
        assert_eq!(row.id(), Some("r1"));
    }

    #[test]
    fn runtime_is_created_once() {
        let row = RowDataset::new(None);
        let spec = FieldSpec::new("a", FieldKind::Optional);
        let first = row.runtime(&spec);
        first.set_value(Value::from(3));
        let second = row.runtime(&spec);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(row.values().get("a"), Some(&Value::from(3)));
    }

    proptest! {
        #[test]
        fn blocking_message_always_invalidates(
            kind in any_kind(),
            mut msgs in proptest::collection::vec(any_message(), 0..8),
            at in 0usize..8,
        ) {
            let pos = at.min(msgs.len());
            msgs.insert(pos, TypedMessage::error("blocking"));
            let v = consolidate(Some(&msgs), kind);
            prop_assert!(!v.valid);
            prop_assert_eq!(v.status, StatusLevel::Invalid);
        }
    }
}
