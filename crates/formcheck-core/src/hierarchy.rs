//! Parent/child links between checkers.
//!
//! A checker has at most one parent for its whole lifetime. Parents hold
//! their children weakly: registering does not keep a child alive, the
//! caller that created it does. Validity flows upward only, each parent
//! re-deriving its verdict from its direct children.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::checker::Checker;
use crate::error::{FormError, FormResult};
use crate::observable::lock;

/// Register `child` under `parent`.
///
/// Registering again under the same parent is a no-op. Fails when the
/// child already belongs to another parent, or when the link would make
/// a checker its own ancestor.
pub fn register(parent: &Arc<Checker>, child: &Arc<Checker>) -> FormResult<()> {
    let invalid = || FormError::InvalidHierarchy {
        parent: parent.id().to_string(),
        child: child.id().to_string(),
    };

    if Arc::ptr_eq(parent, child) {
        return Err(invalid());
    }

    let mut ancestor = parent.parent();
    while let Some(a) = ancestor {
        if Arc::ptr_eq(&a, child) {
            return Err(invalid());
        }
        ancestor = a.parent();
    }

    match child.parent.get() {
        Some(existing) if !Arc::ptr_eq(existing, parent) => {
            tracing::warn!(
                child = %child.id(),
                parent = %parent.id(),
                existing = %existing.id(),
                "Refusing to re-parent checker"
            );
            return Err(invalid());
        }
        Some(_) => {}
        None => {
            if child.parent.set(parent.clone()).is_err() {
                return Err(invalid());
            }
        }
    }
    child.detached.store(false, Ordering::SeqCst);

    let mut children = lock(&parent.children);
    children.retain(|w| w.strong_count() > 0);
    if !children.iter().any(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(child))) {
        children.push(Arc::downgrade(child));
    }
    Ok(())
}

/// Remove `child` from `parent`'s children, by identity.
///
/// An unknown child is logged and otherwise ignored.
pub fn unregister(parent: &Checker, child: &Checker) {
    let mut children = lock(&parent.children);
    let found = children.iter().any(|w| std::ptr::eq(w.as_ptr(), child));
    children.retain(|w| !std::ptr::eq(w.as_ptr(), child) && w.strong_count() > 0);
    drop(children);

    if found {
        child.detached.store(true, Ordering::SeqCst);
    } else {
        tracing::warn!(
            parent = %parent.id(),
            child = %child.id(),
            "Unregistering a checker that is not a child"
        );
    }
}

/// Apply `f` to `checker`, then to each of its ancestors up to the root.
pub fn apply_upward<F>(checker: &Checker, mut f: F)
where
    F: FnMut(&Checker),
{
    f(checker);
    let mut current = checker.parent();
    while let Some(node) = current {
        f(&node);
        current = node.parent();
    }
}

/// Re-consolidate every ancestor of `checker`, nearest first.
pub fn propagate_up(checker: &Checker) {
    let mut current = checker.parent();
    while let Some(node) = current {
        node.consolidate();
        current = node.parent();
    }
}
