//! The Checker: validation state of one panel and its place in a tree.
//!
//! A checker owns the rows of its panel (one row for plain panels, one per
//! row id for array-ed ones), runs field checks, and folds everything into
//! a single verdict:
//!
//! ```text
//!   field check ──▶ FieldRuntime ──▶ RowDataset ──▶ Checker ──▶ parent ──▶ … root
//!        │                                            │
//!        └──────────── MessageSink (own or inherited) ┘
//! ```
//!
//! Checks for different fields may be in flight at the same time; each
//! `check_field` call is independent and keyed by `(row, field)`.
//!
//! # Example
//!
//! ```ignore
//! let panel = PanelSpec::new()
//!     .field(FieldSpec::new("username", FieldKind::Mandatory).with_check(rules::required()))?;
//! let root = Checker::builder("account", panel).messages(MessageSink::new()).build()?;
//!
//! let ok = root.check_field(None, "username", json!("alice"), &CheckOptions::default()).await?;
//! assert!(ok && root.validity());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use futures::future::{BoxFuture, FutureExt, join_all};
use serde_json::Value;

use formcheck_types::{StatusLevel, TypedMessage, Verdict};

use crate::config::{CheckErrorPolicy, CheckerConfig, StaleCheckPolicy};
use crate::error::{FormError, FormResult};
use crate::field::{CheckContext, CheckFailure, CheckOptions, FieldSpec};
use crate::hierarchy;
use crate::message::MessageSink;
use crate::observable::{SubscriptionId, lock};
use crate::panel::PanelSpec;
use crate::report::{CheckerReport, FieldReport, RowReport};
use crate::runtime::{FieldRuntime, RowDataset, VerdictCells};

/// Key of a row: `None` for the single row of a plain panel.
pub type RowKey = Option<String>;

/// Separates checker id, row id and field name in emitter ids. Not
/// allowed in checker or row ids.
pub const EMITTER_SEPARATOR: char = '/';

/// Builder for [`Checker`].
pub struct CheckerBuilder {
    id: String,
    panel: PanelSpec,
    parent: Option<Arc<Checker>>,
    messages: Option<MessageSink>,
    config: Option<CheckerConfig>,
}

impl CheckerBuilder {
    /// Register the new checker under `parent`.
    pub fn parent(mut self, parent: &Arc<Checker>) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Give the checker its own message sink instead of inheriting one.
    pub fn messages(mut self, sink: MessageSink) -> Self {
        self.messages = Some(sink);
        self
    }

    /// Use this configuration instead of the parent's.
    pub fn config(mut self, config: CheckerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> FormResult<Arc<Checker>> {
        if self.id.trim().is_empty() {
            return Err(FormError::config("checker id must not be empty"));
        }
        if self.id.contains(EMITTER_SEPARATOR) {
            return Err(FormError::config(format!(
                "checker id '{}' must not contain '{EMITTER_SEPARATOR}'",
                self.id
            )));
        }
        self.panel.validate()?;

        let config = match (self.config, &self.parent) {
            (Some(cfg), _) => Arc::new(cfg),
            (None, Some(parent)) => parent.config.clone(),
            (None, None) => Arc::new(CheckerConfig::default()),
        };

        let checker = Arc::new(Checker {
            id: self.id,
            panel: self.panel,
            config,
            parent: OnceLock::new(),
            detached: AtomicBool::new(false),
            children: Mutex::new(Vec::new()),
            rows: Mutex::new(BTreeMap::new()),
            injected: Mutex::new(BTreeMap::new()),
            messages: self.messages,
            verdict: VerdictCells::default(),
        });

        if let Some(parent) = &self.parent {
            hierarchy::register(parent, &checker)?;
        }
        checker.refresh();

        tracing::debug!(
            checker = %checker.id,
            parent = ?self.parent.as_ref().map(|p| p.id.clone()),
            fields = checker.panel.len(),
            arrayed = checker.panel.is_arrayed(),
            "Checker created"
        );
        Ok(checker)
    }
}

/// Validation state of one panel.
pub struct Checker {
    id: String,
    panel: PanelSpec,
    config: Arc<CheckerConfig>,
    pub(crate) parent: OnceLock<Arc<Checker>>,
    pub(crate) detached: AtomicBool,
    pub(crate) children: Mutex<Vec<Weak<Checker>>>,
    rows: Mutex<BTreeMap<RowKey, Arc<RowDataset>>>,
    /// `form_validity` contributions, by emitter.
    injected: Mutex<BTreeMap<String, bool>>,
    messages: Option<MessageSink>,
    verdict: VerdictCells,
}

impl Checker {
    pub fn builder(id: impl Into<String>, panel: PanelSpec) -> CheckerBuilder {
        CheckerBuilder {
            id: id.into(),
            panel,
            parent: None,
            messages: None,
            config: None,
        }
    }

    /// A root checker with default configuration and no message sink.
    pub fn new(id: impl Into<String>, panel: PanelSpec) -> FormResult<Arc<Self>> {
        Self::builder(id, panel).build()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn panel(&self) -> &PanelSpec {
        &self.panel
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// The parent, unless there is none or this checker was unregistered.
    pub fn parent(&self) -> Option<Arc<Checker>> {
        if self.detached.load(Ordering::SeqCst) {
            return None;
        }
        self.parent.get().cloned()
    }

    /// Live registered children, in registration order.
    pub fn children(&self) -> Vec<Arc<Checker>> {
        lock(&self.children)
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// The message sink diagnostics go to: our own, or the nearest
    /// ancestor's.
    pub fn messages(&self) -> Option<MessageSink> {
        let mut found = None;
        hierarchy::apply_upward(self, |c| {
            if found.is_none() {
                found = c.messages.clone();
            }
        });
        found
    }

    /// Emitter id under which a field's messages are pushed.
    pub fn emitter_id(&self, row: Option<&str>, field: &str) -> String {
        format!("{}/{}/{}", self.id, row.unwrap_or("-"), field)
    }

    fn emitter_prefix(&self) -> String {
        format!("{}/", self.id)
    }

    // ================================================================
    // Rows and fields
    // ================================================================

    fn field_spec(&self, field: &str) -> FormResult<&FieldSpec> {
        self.panel.get(field).ok_or_else(|| FormError::UnknownField {
            checker: self.id.clone(),
            field: field.to_string(),
        })
    }

    fn row_key(&self, row: Option<&str>) -> FormResult<RowKey> {
        match (self.panel.is_arrayed(), row) {
            (true, Some(id)) if id.is_empty() || id.contains(EMITTER_SEPARATOR) => {
                Err(FormError::config(format!(
                    "checker '{}': invalid row id '{id}'",
                    self.id
                )))
            }
            (true, Some(id)) => Ok(Some(id.to_string())),
            (true, None) => Err(FormError::RowIdRequired {
                checker: self.id.clone(),
            }),
            (false, Some(id)) => {
                tracing::debug!(checker = %self.id, row = id, "Ignoring row id on a single-row panel");
                Ok(None)
            }
            (false, None) => Ok(None),
        }
    }

    fn row(&self, key: &RowKey) -> Arc<RowDataset> {
        lock(&self.rows)
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RowDataset::new(key.clone())))
            .clone()
    }

    fn rows(&self) -> Vec<Arc<RowDataset>> {
        lock(&self.rows).values().cloned().collect()
    }

    fn holds_row(&self, key: &RowKey, row: &Arc<RowDataset>) -> bool {
        lock(&self.rows)
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, row))
    }

    /// Derive a row id from a row context with the panel's row identifier.
    pub fn row_id_for(&self, row_context: &Value) -> FormResult<String> {
        let ident = self.panel.row_identifier().ok_or_else(|| {
            FormError::config(format!("checker '{}' has no row identifier", self.id))
        })?;
        ident(row_context).ok_or_else(|| FormError::RowUnidentified {
            checker: self.id.clone(),
            context: row_context.to_string(),
        })
    }

    /// Existing row keys, in order.
    pub fn row_ids(&self) -> Vec<RowKey> {
        lock(&self.rows).keys().cloned().collect()
    }

    /// Bind a value to a field without checking it.
    pub fn set_value(&self, row: Option<&str>, field: &str, value: Value) -> FormResult<()> {
        let spec = self.field_spec(field)?;
        let key = self.row_key(row)?;
        self.row(&key).runtime(spec).set_value(value);
        Ok(())
    }

    /// Values bound in a row, by field name.
    pub fn row_values(&self, row: Option<&str>) -> FormResult<BTreeMap<String, Value>> {
        let key = self.row_key(row)?;
        Ok(lock(&self.rows)
            .get(&key)
            .map(|r| r.values())
            .unwrap_or_default())
    }

    /// Runtime of a field, if it was ever bound or checked.
    pub fn field_runtime(&self, row: Option<&str>, field: &str) -> FormResult<Option<Arc<FieldRuntime>>> {
        self.field_spec(field)?;
        let key = self.row_key(row)?;
        Ok(lock(&self.rows).get(&key).and_then(|r| r.get(field)))
    }

    /// Snapshot of one field.
    pub fn field_state(&self, row: Option<&str>, field: &str) -> FormResult<Option<FieldReport>> {
        Ok(self.field_runtime(row, field)?.map(|rt| field_report(&rt)))
    }

    /// Drop a row of an array-ed panel and its messages.
    ///
    /// The single row of a plain panel is never removed.
    pub fn remove_row(&self, row: &str) -> bool {
        if !self.panel.is_arrayed() {
            tracing::debug!(checker = %self.id, row, "Single-row panel has no removable rows");
            return false;
        }
        let key = match self.row_key(Some(row)) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let removed = lock(&self.rows).remove(&key).is_some();
        if removed {
            if let Some(sink) = self.messages() {
                let prefix = format!("{}/{}/", self.id, key.as_deref().unwrap_or("-"));
                sink.remove_prefixed(&prefix);
            }
            tracing::debug!(checker = %self.id, row, "Row removed");
            self.refresh();
        }
        removed
    }

    /// Force the indicator shown next to a field.
    ///
    /// Only honored when the configuration allows it; otherwise logged and
    /// ignored. Never touches validity.
    pub fn override_indicator(
        &self,
        row: Option<&str>,
        field: &str,
        status: StatusLevel,
    ) -> FormResult<bool> {
        if !self.config.status_overridable {
            tracing::warn!(checker = %self.id, field, "Indicator override not allowed by configuration");
            return Ok(false);
        }
        let spec = self.field_spec(field)?;
        let key = self.row_key(row)?;
        self.row(&key).runtime(spec).indicator().set(status);
        Ok(true)
    }

    // ================================================================
    // Checking
    // ================================================================

    /// Check one field with a new value.
    ///
    /// Resolves with the field's new validity. A failing check function
    /// never makes this fail; only addressing an unknown field or omitting
    /// the row id of an array-ed panel does.
    pub async fn check_field(
        &self,
        row: Option<&str>,
        field: &str,
        value: Value,
        opts: &CheckOptions,
    ) -> FormResult<bool> {
        let spec = self.field_spec(field)?.clone();
        let key = self.row_key(row)?;
        let dataset = self.row(&key);
        let runtime = dataset.runtime(&spec);

        // Previous messages stay on the stack until replaced below.
        let generation = runtime.begin_check(value.clone());
        let ctx = CheckContext {
            checker: self.id.clone(),
            row: key.clone(),
            field: field.to_string(),
            values: dataset.values(),
        };

        tracing::debug!(checker = %self.id, row = ?key, field, generation, "Checking field");

        let results = match spec.try_check(value, ctx, opts.clone()).await {
            Ok(results) => results,
            Err(failure) => self.on_check_failure(field, &failure),
        };

        if self.config.stale_checks == StaleCheckPolicy::LatestStarted
            && runtime.generation() != generation
        {
            tracing::debug!(checker = %self.id, field, generation, "Dropping superseded check result");
            return Ok(runtime.valid());
        }

        let verdict = runtime.record(results.clone());
        if !self.holds_row(&key, &dataset) {
            tracing::debug!(checker = %self.id, row = ?key, field, "Row removed while checking");
            return Ok(verdict.valid);
        }

        if opts.display && self.config.display_status {
            runtime.indicator().set(verdict.status);
        }
        if opts.pushes_messages() {
            if let Some(sink) = self.messages() {
                let emitter = self.emitter_id(key.as_deref(), field);
                sink.push_for(&emitter, results.as_deref().unwrap_or(&[]));
            }
        }

        dataset.consolidate();
        self.refresh();

        tracing::debug!(
            checker = %self.id,
            field,
            valid = verdict.valid,
            status = %verdict.status,
            "Field checked"
        );
        Ok(verdict.valid)
    }

    fn on_check_failure(&self, field: &str, failure: &CheckFailure) -> Option<Vec<TypedMessage>> {
        match self.config.check_errors {
            CheckErrorPolicy::FailOpen => {
                tracing::warn!(checker = %self.id, field, error = %failure, "Check failed, accepting value");
                None
            }
            CheckErrorPolicy::FailClosed => {
                tracing::warn!(checker = %self.id, field, error = %failure, "Check failed, rejecting value");
                Some(vec![TypedMessage::error(format!("check failed: {failure}"))])
            }
        }
    }

    /// Check every field of every row, then every child, and resolve with
    /// the consolidated validity.
    ///
    /// All checks are awaited even if some fail. The single row of a plain
    /// panel is created if needed so unbound fields are checked too.
    pub fn check_all<'a>(&'a self, opts: &'a CheckOptions) -> BoxFuture<'a, bool> {
        async move {
            if !self.panel.is_arrayed() && !self.panel.is_empty() {
                self.row(&None);
            }

            let mut jobs = Vec::new();
            for row in self.rows() {
                for spec in self.panel.iter() {
                    if opts.field_to_skip.as_deref() == Some(spec.name()) {
                        continue;
                    }
                    let value = row.get(spec.name()).map(|rt| rt.value()).unwrap_or(Value::Null);
                    jobs.push((row.id().map(str::to_string), spec.name().to_string(), value));
                }
            }

            tracing::debug!(checker = %self.id, checks = jobs.len(), "Checking all fields");

            join_all(jobs.into_iter().map(|(row, field, value)| async move {
                match self.check_field(row.as_deref(), &field, value, opts).await {
                    Ok(valid) => valid,
                    Err(e) => {
                        tracing::warn!(checker = %self.id, field = %field, error = %e, "Field check skipped");
                        false
                    }
                }
            }))
            .await;

            let children = self.children();
            join_all(children.iter().map(|child| child.check_all(opts))).await;

            self.refresh();
            self.validity()
        }
        .boxed()
    }

    // ================================================================
    // Consolidation
    // ================================================================

    /// Re-derive this checker's verdict from its rows, injected
    /// contributions and live children.
    pub fn consolidate(&self) -> Verdict {
        let rows = self.rows();
        let injected: Vec<bool> = lock(&self.injected).values().copied().collect();
        let children = self.children();

        let verdict = Verdict::fold(
            StatusLevel::None,
            rows.iter()
                .map(|r| r.verdict())
                .chain(injected.into_iter().map(|ok| {
                    Verdict::new(ok, if ok { StatusLevel::Valid } else { StatusLevel::Invalid })
                }))
                .chain(children.iter().map(|c| c.verdict())),
        );
        self.verdict.publish(verdict);
        verdict
    }

    /// Consolidate, then push the result up to the root.
    pub fn refresh(&self) {
        self.consolidate();
        hierarchy::propagate_up(self);
    }

    /// Contribute a validity directly, bypassing field checks.
    pub fn form_validity(&self, emitter: &str, ok: bool) {
        lock(&self.injected).insert(emitter.to_string(), ok);
        tracing::debug!(checker = %self.id, emitter, ok, "Form validity injected");
        self.refresh();
    }

    /// Withdraw a `form_validity` contribution.
    pub fn clear_form_validity(&self, emitter: &str) -> bool {
        let removed = lock(&self.injected).remove(emitter).is_some();
        if removed {
            self.refresh();
        }
        removed
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict.get()
    }

    pub fn validity(&self) -> bool {
        self.verdict.valid()
    }

    pub fn status(&self) -> StatusLevel {
        self.verdict.status()
    }

    pub fn on_validity_change<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.verdict.on_valid(listener)
    }

    pub fn on_status_change<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&StatusLevel) + Send + Sync + 'static,
    {
        self.verdict.on_status(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.verdict.unsubscribe(id)
    }

    // ================================================================
    // Messages and lifecycle
    // ================================================================

    /// Clear the own message sink of this checker and of every ancestor.
    pub fn clear_messages_upward(&self) {
        hierarchy::apply_upward(self, |c| {
            if let Some(sink) = &c.messages {
                sink.clear();
            }
        });
    }

    /// Tear down: destroy children, drop rows and messages, unregister
    /// from the parent and let it re-consolidate.
    pub fn destroy(&self) {
        for child in self.children() {
            child.destroy();
        }
        lock(&self.rows).clear();
        lock(&self.injected).clear();

        if let Some(sink) = self.messages() {
            sink.remove_prefixed(&self.emitter_prefix());
        }

        if let Some(parent) = self.parent() {
            hierarchy::unregister(&parent, self);
            parent.refresh();
        }
        self.verdict.publish(Verdict::empty());
        tracing::debug!(checker = %self.id, "Checker destroyed");
    }

    /// Snapshot of this checker and its descendants.
    pub fn report(&self) -> CheckerReport {
        let rows = self
            .rows()
            .iter()
            .map(|row| {
                let verdict = row.verdict();
                let fields = self
                    .panel
                    .iter()
                    .filter_map(|spec| row.get(spec.name()))
                    .map(|rt| field_report(&rt))
                    .collect();
                RowReport {
                    id: row.id().map(str::to_string),
                    valid: verdict.valid,
                    status: verdict.status,
                    fields,
                }
            })
            .collect();

        let verdict = self.verdict();
        CheckerReport {
            id: self.id.clone(),
            valid: verdict.valid,
            status: verdict.status,
            rows,
            children: self.children().iter().map(|c| c.report()).collect(),
        }
    }
}

fn field_report(rt: &FieldRuntime) -> FieldReport {
    let verdict = rt.verdict();
    FieldReport {
        name: rt.name().to_string(),
        value: rt.value(),
        valid: verdict.valid,
        status: verdict.status,
        messages: rt.last_result().unwrap_or_default(),
    }
}

/// A checker dropped without [`Checker::destroy`] still leaves its parent:
/// its emitters are removed and the parent re-consolidates without it.
impl Drop for Checker {
    fn drop(&mut self) {
        let Some(parent) = self.parent() else {
            return;
        };
        if let Some(sink) = self.messages() {
            sink.remove_prefixed(&self.emitter_prefix());
        }
        parent.refresh();
        tracing::debug!(checker = %self.id, parent = %parent.id(), "Checker dropped while registered");
    }
}

impl fmt::Debug for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checker")
            .field("id", &self.id)
            .field("parent", &self.parent().map(|p| p.id.clone()))
            .field("children", &self.children().len())
            .field("rows", &self.row_ids())
            .field("verdict", &self.verdict())
            .finish()
    }
}
