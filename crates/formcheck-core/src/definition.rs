//! Declarative form definitions.
//!
//! A form is described in TOML and turned into a checker tree:
//!
//! ```toml
//! id = "signup"
//!
//! [config]
//! check-errors = "fail-open"
//!
//! [[panels]]
//! id = "account"
//!
//! [[panels.fields]]
//! name = "username"
//! kind = "mandatory"
//! rules = [{ rule = "required" }, { rule = "min-length", value = 3 }]
//!
//! [[panels]]
//! id = "contacts"
//! parent = "account"
//! row-id = "id"
//!
//! [[panels.fields]]
//! name = "contacts[].email"
//! rules = [{ rule = "pattern", regex = "^[^@]+@[^@]+$" }]
//! ```
//!
//! Every panel hangs below a synthetic root checker named after the form,
//! which owns the message sink. Values are bound from JSON shaped like the
//! panels: an object of field values for plain panels, an array of row
//! objects keyed by leaf name for array-ed ones.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use formcheck_types::FieldKind;

use crate::checker::Checker;
use crate::config::CheckerConfig;
use crate::error::{FormError, FormResult};
use crate::field::{CheckOptions, FieldSpec};
use crate::message::{MessageSink, StackEntry};
use crate::panel::PanelSpec;
use crate::report::CheckerReport;
use crate::rules::{Rule, RuleSet};

const DEFAULT_FORM_ID: &str = "form";

/// Root of a form definition document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FormDefinition {
    /// Id of the synthetic root checker.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub config: CheckerConfig,
    #[serde(default)]
    pub panels: Vec<PanelDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PanelDef {
    pub id: String,
    /// Id of a panel declared earlier. Defaults to the form root.
    #[serde(default)]
    pub parent: Option<String>,
    /// Key of the row object holding the row id. Required for array-ed
    /// panels.
    #[serde(default)]
    pub row_id: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl FormDefinition {
    pub fn from_toml_str(s: &str) -> FormResult<Self> {
        toml::from_str(s).map_err(|e| FormError::Definition(e.to_string()))
    }

    pub fn form_id(&self) -> &str {
        self.id.as_deref().unwrap_or(DEFAULT_FORM_ID)
    }

    /// Build the checker tree.
    ///
    /// Panels are created in declaration order, so a parent must be
    /// declared before its children.
    pub fn build(&self) -> FormResult<Form> {
        let sink = MessageSink::new();
        let root = Checker::builder(self.form_id(), PanelSpec::new())
            .messages(sink.clone())
            .config(self.config.clone())
            .build()?;

        let mut panels: Vec<(String, Arc<Checker>)> = Vec::with_capacity(self.panels.len());
        for def in &self.panels {
            if def.id == self.form_id() || panels.iter().any(|(id, _)| *id == def.id) {
                return Err(FormError::Definition(format!("duplicate panel id '{}'", def.id)));
            }

            let parent = match &def.parent {
                None => root.clone(),
                Some(pid) if pid == self.form_id() => root.clone(),
                Some(pid) => panels
                    .iter()
                    .find(|(id, _)| id == pid)
                    .map(|(_, c)| c.clone())
                    .ok_or_else(|| {
                        FormError::Definition(format!(
                            "parent '{pid}' of panel '{}' must be declared before it",
                            def.id
                        ))
                    })?,
            };

            let checker = Checker::builder(def.id.clone(), def.panel_spec()?)
                .parent(&parent)
                .build()?;
            panels.push((def.id.clone(), checker));
        }

        tracing::debug!(form = %root.id(), panels = panels.len(), "Form built");
        Ok(Form { root, panels, sink })
    }
}

impl PanelDef {
    fn panel_spec(&self) -> FormResult<PanelSpec> {
        let mut panel = PanelSpec::new();
        for field in &self.fields {
            let mut spec = FieldSpec::new(field.name.clone(), field.kind);
            if !field.rules.is_empty() {
                spec = spec.with_check(RuleSet::new(field.rules.iter().cloned())?);
            }
            panel.add(spec)?;
        }
        if let Some(key) = &self.row_id {
            panel = panel.with_row_key(key.clone());
        }
        Ok(panel)
    }
}

/// A built checker tree.
///
/// Holds every panel checker: parents only reference their children
/// weakly, so the form is what keeps them alive.
pub struct Form {
    root: Arc<Checker>,
    panels: Vec<(String, Arc<Checker>)>,
    sink: MessageSink,
}

impl Form {
    pub fn root(&self) -> &Arc<Checker> {
        &self.root
    }

    pub fn panel(&self, id: &str) -> Option<&Arc<Checker>> {
        self.panels.iter().find(|(pid, _)| pid == id).map(|(_, c)| c)
    }

    /// Panels in declaration order.
    pub fn panels(&self) -> impl Iterator<Item = &Arc<Checker>> {
        self.panels.iter().map(|(_, c)| c)
    }

    pub fn sink(&self) -> &MessageSink {
        &self.sink
    }

    pub fn messages(&self) -> Vec<StackEntry> {
        self.sink.entries()
    }

    /// Bind a values document without checking anything.
    ///
    /// Unknown panels and fields are logged and skipped. A document whose
    /// shape does not match a panel (object vs. array of rows) is an error.
    pub fn bind(&self, values: &Value) -> FormResult<()> {
        let Value::Object(by_panel) = values else {
            return Err(FormError::Definition(
                "values document must be an object keyed by panel id".into(),
            ));
        };

        for (panel_id, panel_values) in by_panel {
            let Some(checker) = self.panel(panel_id) else {
                tracing::warn!(panel = %panel_id, "Ignoring values for unknown panel");
                continue;
            };
            match (checker.panel().is_arrayed(), panel_values) {
                (false, Value::Object(fields)) => {
                    for (name, value) in fields {
                        bind_field(checker, None, name, value.clone())?;
                    }
                }
                (true, Value::Array(rows)) => {
                    for row in rows {
                        bind_row(checker, row)?;
                    }
                }
                (arrayed, _) => {
                    let expected = if arrayed { "an array of rows" } else { "an object" };
                    return Err(FormError::Definition(format!(
                        "values for panel '{panel_id}' must be {expected}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Run every check of the form.
    pub async fn check_all(&self) -> bool {
        self.check_all_with(&CheckOptions::default()).await
    }

    pub async fn check_all_with(&self, opts: &CheckOptions) -> bool {
        self.root.check_all(opts).await
    }

    pub fn validity(&self) -> bool {
        self.root.validity()
    }

    pub fn report(&self) -> CheckerReport {
        self.root.report()
    }
}

fn bind_field(checker: &Checker, row: Option<&str>, name: &str, value: Value) -> FormResult<()> {
    if !checker.panel().contains(name) {
        tracing::warn!(checker = %checker.id(), field = name, "Ignoring value for unknown field");
        return Ok(());
    }
    checker.set_value(row, name, value)
}

fn bind_row(checker: &Checker, row: &Value) -> FormResult<()> {
    let id = checker.row_id_for(row)?;
    let Value::Object(values) = row else {
        return Err(FormError::Definition(format!(
            "row of panel '{}' must be an object",
            checker.id()
        )));
    };
    for spec in checker.panel().iter() {
        if let Some(value) = values.get(spec.leaf()) {
            checker.set_value(Some(&id), spec.name(), value.clone())?;
        }
    }
    Ok(())
}
