//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use formcheck_core::{
    CheckReport, Checker, FieldKind, FieldSpec, MessageSink, PanelSpec, TypedMessage,
};
use serde_json::Value;

/// Mandatory field that rejects empty strings and null.
pub fn reject_if_empty(name: &str) -> FieldSpec {
    let label = name.to_string();
    FieldSpec::new(name, FieldKind::Mandatory).with_check_fn(move |value, _, _| {
        let label = label.clone();
        async move {
            let empty = value.as_str().is_none_or(|s| s.is_empty());
            Ok(if empty {
                CheckReport::from(TypedMessage::error(format!("{label} is required")))
            } else {
                CheckReport::Clear
            })
        }
    })
}

/// Field whose check always returns an error.
pub fn erroring(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::Mandatory)
        .with_check_fn(|_, _, _| async { Err(anyhow::anyhow!("backend unreachable")) })
}

/// Field whose check panics while being polled.
pub fn panicking(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::Mandatory).with_check_fn(|_, _, _| async {
        if true {
            panic!("check blew up");
        }
        Ok(CheckReport::Clear)
    })
}

/// Field whose check reads `{"delay_ms": u64, "ok": bool}` and sleeps
/// before answering.
pub fn delayed(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::Mandatory).with_check_fn(|value: Value, _, _| async move {
        let delay = value.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
        let ok = value.get("ok").and_then(Value::as_bool).unwrap_or(true);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(if ok {
            CheckReport::Clear
        } else {
            CheckReport::from(TypedMessage::error("rejected"))
        })
    })
}

pub fn panel(fields: impl IntoIterator<Item = FieldSpec>) -> PanelSpec {
    let mut panel = PanelSpec::new();
    for spec in fields {
        panel.add(spec).expect("valid field");
    }
    panel
}

/// Root with its own sink and two plain children, each with one
/// reject-if-empty field named after the child.
pub fn two_child_tree() -> (MessageSink, Arc<Checker>, Arc<Checker>, Arc<Checker>) {
    let sink = MessageSink::new();
    let root = Checker::builder("root", PanelSpec::new())
        .messages(sink.clone())
        .build()
        .expect("root");
    let c1 = Checker::builder("c1", panel([reject_if_empty("name")]))
        .parent(&root)
        .build()
        .expect("c1");
    let c2 = Checker::builder("c2", panel([reject_if_empty("city")]))
        .parent(&root)
        .build()
        .expect("c2");
    (sink, root, c1, c2)
}
