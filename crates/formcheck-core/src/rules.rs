//! Stock checks.
//!
//! A [`RuleSet`] is a [`FieldCheck`] made of declarative [`Rule`]s. Every
//! rule contributes at most one message; the set reports them all.
//! Apart from `required` and `recommended`, rules skip empty values, so an
//! optional field left blank is accepted.
//!
//! Rules deserialize from the form definition format:
//!
//! ```toml
//! rules = [
//!     { rule = "required" },
//!     { rule = "min-length", value = 3 },
//!     { rule = "pattern", regex = "^[a-z]+$", message = "lowercase only" },
//! ]
//! ```

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use formcheck_types::{CheckReport, TypedMessage};

use crate::error::{FormError, FormResult};
use crate::field::{CheckContext, CheckOptions, FieldCheck};

/// One declarative rule. `message` overrides the default text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum Rule {
    /// Error when empty.
    Required {
        #[serde(default)]
        message: Option<String>,
    },
    /// Warning when empty: the field becomes uncomplete, not invalid.
    Recommended {
        #[serde(default)]
        message: Option<String>,
    },
    MinLength {
        value: usize,
        #[serde(default)]
        message: Option<String>,
    },
    MaxLength {
        value: usize,
        #[serde(default)]
        message: Option<String>,
    },
    Pattern {
        regex: String,
        #[serde(default)]
        message: Option<String>,
    },
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        message: Option<String>,
    },
    OneOf {
        values: Vec<Value>,
        #[serde(default)]
        message: Option<String>,
    },
    /// Must equal another field of the same row.
    SameAs {
        field: String,
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: Rule,
    regex: Option<Regex>,
}

/// A list of rules, checked in order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile a rule list. Fails on an invalid pattern.
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> FormResult<Self> {
        let mut set = Self::default();
        for rule in rules {
            set.push(rule)?;
        }
        Ok(set)
    }

    /// Append a rule.
    pub fn push(&mut self, rule: Rule) -> FormResult<()> {
        let regex = match &rule {
            Rule::Pattern { regex, .. } => Some(
                Regex::new(regex)
                    .map_err(|e| FormError::config(format!("invalid pattern '{regex}': {e}")))?,
            ),
            _ => None,
        };
        self.rules.push(CompiledRule { rule, regex });
        Ok(())
    }

    /// Append a rule, builder style.
    pub fn and(mut self, rule: Rule) -> FormResult<Self> {
        self.push(rule)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule against a value.
    pub fn evaluate(&self, value: &Value, ctx: &CheckContext) -> Vec<TypedMessage> {
        self.rules
            .iter()
            .filter_map(|compiled| evaluate_rule(compiled, value, ctx))
            .collect()
    }
}

#[async_trait]
impl FieldCheck for RuleSet {
    async fn check(
        &self,
        value: Value,
        ctx: CheckContext,
        _opts: CheckOptions,
    ) -> anyhow::Result<CheckReport> {
        let messages = self.evaluate(&value, &ctx);
        Ok(if messages.is_empty() {
            CheckReport::Clear
        } else {
            CheckReport::Many(messages)
        })
    }
}

/// `required` alone.
pub fn required() -> RuleSet {
    single(Rule::Required { message: None })
}

/// `recommended` alone.
pub fn recommended() -> RuleSet {
    single(Rule::Recommended { message: None })
}

pub fn min_length(value: usize) -> RuleSet {
    single(Rule::MinLength { value, message: None })
}

pub fn max_length(value: usize) -> RuleSet {
    single(Rule::MaxLength { value, message: None })
}

pub fn pattern(regex: &str) -> FormResult<RuleSet> {
    RuleSet::new([Rule::Pattern {
        regex: regex.to_string(),
        message: None,
    }])
}

pub fn range(min: Option<f64>, max: Option<f64>) -> RuleSet {
    single(Rule::Range { min, max, message: None })
}

pub fn same_as(field: impl Into<String>) -> RuleSet {
    single(Rule::SameAs {
        field: field.into(),
        message: None,
    })
}

fn single(rule: Rule) -> RuleSet {
    RuleSet {
        rules: vec![CompiledRule { rule, regex: None }],
    }
}

/// Null, blank strings, empty arrays and empty objects.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        _ => None,
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn evaluate_rule(compiled: &CompiledRule, value: &Value, ctx: &CheckContext) -> Option<TypedMessage> {
    let text = |custom: &Option<String>, default: String| custom.clone().unwrap_or(default);
    let empty = is_empty_value(value);

    match &compiled.rule {
        Rule::Required { message } => {
            empty.then(|| TypedMessage::error(text(message, "is required".into())))
        }
        Rule::Recommended { message } => {
            empty.then(|| TypedMessage::warning(text(message, "is recommended".into())))
        }
        _ if empty => None,
        Rule::MinLength { value: min, message } => {
            let len = length_of(value)?;
            (len < *min).then(|| {
                TypedMessage::error(text(message, format!("must be at least {min} characters")))
            })
        }
        Rule::MaxLength { value: max, message } => {
            let len = length_of(value)?;
            (len > *max).then(|| {
                TypedMessage::error(text(message, format!("must be at most {max} characters")))
            })
        }
        Rule::Pattern { message, .. } => {
            let regex = compiled.regex.as_ref()?;
            let matched = value.as_str().is_some_and(|s| regex.is_match(s));
            (!matched).then(|| TypedMessage::error(text(message, "has an invalid format".into())))
        }
        Rule::Range { min, max, message } => {
            let Some(n) = number_of(value) else {
                return Some(TypedMessage::error(text(message, "must be a number".into())));
            };
            let below = min.is_some_and(|m| n < m);
            let above = max.is_some_and(|m| n > m);
            (below || above).then(|| {
                let default = match (min, max) {
                    (Some(lo), Some(hi)) => format!("must be between {lo} and {hi}"),
                    (Some(lo), None) => format!("must be at least {lo}"),
                    (None, Some(hi)) => format!("must be at most {hi}"),
                    (None, None) => "is out of range".to_string(),
                };
                TypedMessage::error(text(message, default))
            })
        }
        Rule::OneOf { values, message } => (!values.contains(value)).then(|| {
            let choices: Vec<String> = values.iter().map(Value::to_string).collect();
            TypedMessage::error(text(message, format!("must be one of {}", choices.join(", "))))
        }),
        Rule::SameAs { field, message } => {
            let other = ctx.value_of(field).unwrap_or(&Value::Null);
            (other != value).then(|| TypedMessage::error(text(message, format!("must match {field}"))))
        }
    }
}
