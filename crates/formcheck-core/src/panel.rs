//! Panel declarations: an ordered set of fields.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{FormError, FormResult};
use crate::field::FieldSpec;

/// Derives a row id from a row context (the row's data, as JSON).
pub type RowIdentifier = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Ordered mapping from field name to [`FieldSpec`].
///
/// Iteration follows declaration order; [`PanelSpec::names`] is sorted.
#[derive(Clone, Default)]
pub struct PanelSpec {
    fields: Vec<FieldSpec>,
    index: HashMap<String, usize>,
    row_identifier: Option<RowIdentifier>,
}

impl PanelSpec {
    /// Create an empty panel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, builder style.
    pub fn field(mut self, spec: FieldSpec) -> FormResult<Self> {
        self.add(spec)?;
        Ok(self)
    }

    /// Add a field.
    ///
    /// Fails on an empty or duplicate name, or when the field's array-ed
    /// flag disagrees with the fields already declared.
    pub fn add(&mut self, spec: FieldSpec) -> FormResult<()> {
        if spec.name().trim().is_empty() {
            return Err(FormError::config("field name must not be empty"));
        }
        if self.index.contains_key(spec.name()) {
            return Err(FormError::config(format!(
                "duplicate field name '{}'",
                spec.name()
            )));
        }
        if let Some(first) = self.fields.first() {
            if first.is_arrayed() != spec.is_arrayed() {
                return Err(FormError::config(format!(
                    "field '{}' mixes array-ed and single-row fields (first field: '{}')",
                    spec.name(),
                    first.name()
                )));
            }
        }
        self.index.insert(spec.name().to_string(), self.fields.len());
        self.fields.push(spec);
        Ok(())
    }

    /// Set the row identifier used by array-ed panels.
    pub fn with_row_identifier<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        self.row_identifier = Some(Arc::new(f));
        self
    }

    /// Row identifier reading a string or number property of the row object.
    pub fn with_row_key(self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.with_row_identifier(move |row| match row.get(&key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }

    /// Field names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.fields.iter().map(|f| f.name()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when the panel's fields address repeated rows.
    pub fn is_arrayed(&self) -> bool {
        self.fields.first().is_some_and(|f| f.is_arrayed())
    }

    pub fn row_identifier(&self) -> Option<&RowIdentifier> {
        self.row_identifier.as_ref()
    }

    /// Check the panel as a whole: a row identifier is required iff the
    /// panel is array-ed.
    pub fn validate(&self) -> FormResult<()> {
        match (self.is_arrayed(), self.row_identifier.is_some()) {
            (true, false) => Err(FormError::config(
                "array-ed panel requires a row identifier",
            )),
            (false, true) => Err(FormError::config(
                "row identifier given for a panel without array-ed fields",
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for PanelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelSpec")
            .field("fields", &self.fields)
            .field("row_identifier", &self.row_identifier.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcheck_types::FieldKind;
    use serde_json::json;

    #[test]
    fn declaration_order_and_sorted_names() {
        let panel = PanelSpec::new()
            .field(FieldSpec::new("zip", FieldKind::Optional))
            .and_then(|p| p.field(FieldSpec::new("city", FieldKind::Mandatory)))
            .unwrap();

        let order: Vec<_> = panel.iter().map(|f| f.name()).collect();
        assert_eq!(order, vec!["zip", "city"]);
        assert_eq!(panel.names(), vec!["city", "zip"]);
        assert!(panel.contains("zip"));
        assert!(panel.validate().is_ok());
    }

    #[test]
    fn duplicate_and_empty_names_rejected() {
        let mut panel = PanelSpec::new();
        panel.add(FieldSpec::new("a", FieldKind::Optional)).unwrap();
        assert!(matches!(
            panel.add(FieldSpec::new("a", FieldKind::Mandatory)),
            Err(FormError::Config(_))
        ));
        assert!(panel.add(FieldSpec::new("  ", FieldKind::Optional)).is_err());
    }

    #[test]
    fn mixed_arrayed_fields_rejected() {
        let mut panel = PanelSpec::new();
        panel.add(FieldSpec::new("rows[].a", FieldKind::Optional)).unwrap();
        assert!(panel.add(FieldSpec::new("b", FieldKind::Optional)).is_err());
    }

    #[test]
    fn row_identifier_required_iff_arrayed() {
        let arrayed = PanelSpec::new()
            .field(FieldSpec::new("rows[].a", FieldKind::Optional))
            .unwrap();
        assert!(arrayed.validate().is_err());
        assert!(arrayed.with_row_key("id").validate().is_ok());

        let plain = PanelSpec::new()
            .field(FieldSpec::new("a", FieldKind::Optional))
            .unwrap()
            .with_row_key("id");
        assert!(plain.validate().is_err());
    }

    #[test]
    fn row_key_reads_strings_and_numbers() {
        let panel = PanelSpec::new().with_row_key("id");
        let ident = panel.row_identifier().unwrap();
        assert_eq!(ident(&json!({"id": "r1"})), Some("r1".to_string()));
        assert_eq!(ident(&json!({"id": 7})), Some("7".to_string()));
        assert_eq!(ident(&json!({"name": "x"})), None);
    }
}
