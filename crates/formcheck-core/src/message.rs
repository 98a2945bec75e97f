//! Emitter-keyed message stacks.
//!
//! Every field pushes its diagnostics under its own emitter id. A push
//! replaces everything that emitter said before, so the stack only ever
//! holds the outcome of each emitter's latest check. The UI shows the
//! most severe entry, ties going to the most recent.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use formcheck_types::TypedMessage;

use crate::observable::{Observable, SubscriptionId, lock};

/// One message on the stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackEntry {
    pub message: TypedMessage,
    pub emitter: String,
    /// Insertion order within the stack; strictly increasing.
    pub stamp: u64,
    /// Wall-clock time of the push.
    pub at: DateTime<Utc>,
}

/// Ordered list of the currently active diagnostics.
#[derive(Debug, Default)]
pub struct MessageStack {
    entries: Vec<StackEntry>,
    next_stamp: u64,
}

impl MessageStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all entries of `emitter` with `messages`, in order.
    ///
    /// An empty list just removes the emitter's entries.
    pub fn push_for(&mut self, emitter: &str, messages: &[TypedMessage]) {
        self.entries.retain(|e| e.emitter != emitter);
        let at = Utc::now();
        for message in messages {
            self.next_stamp += 1;
            self.entries.push(StackEntry {
                message: message.clone(),
                emitter: emitter.to_string(),
                stamp: self.next_stamp,
                at,
            });
        }
    }

    /// Drop every entry whose emitter is listed. Returns how many went.
    pub fn remove_for<S: AsRef<str>>(&mut self, emitters: &[S]) -> usize {
        let set: HashSet<&str> = emitters.iter().map(|e| e.as_ref()).collect();
        let before = self.entries.len();
        self.entries.retain(|e| !set.contains(e.emitter.as_str()));
        before - self.entries.len()
    }

    /// Most severe entry; the most recent one wins ties.
    pub fn most_severe(&self) -> Option<&StackEntry> {
        self.entries
            .iter()
            .max_by_key(|e| (e.message.level, e.stamp))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    pub fn entries_for(&self, emitter: &str) -> Vec<&StackEntry> {
        self.entries.iter().filter(|e| e.emitter == emitter).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shareable handle to a [`MessageStack`].
///
/// Every mutation happens in one critical section; afterwards the `top`
/// cell is republished with the new most severe entry.
#[derive(Clone, Default)]
pub struct MessageSink {
    stack: Arc<Mutex<MessageStack>>,
    top: Arc<Observable<Option<StackEntry>>>,
}

impl MessageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_for(&self, emitter: &str, messages: &[TypedMessage]) {
        let top = {
            let mut stack = lock(&self.stack);
            stack.push_for(emitter, messages);
            stack.most_severe().cloned()
        };
        self.top.set(top);
    }

    pub fn remove_for<S: AsRef<str>>(&self, emitters: &[S]) -> usize {
        let (removed, top) = {
            let mut stack = lock(&self.stack);
            let removed = stack.remove_for(emitters);
            (removed, stack.most_severe().cloned())
        };
        self.top.set(top);
        removed
    }

    /// Drop every entry whose emitter starts with `prefix`.
    pub fn remove_prefixed(&self, prefix: &str) -> usize {
        let emitters: Vec<String> = {
            let stack = lock(&self.stack);
            stack
                .entries()
                .iter()
                .filter(|e| e.emitter.starts_with(prefix))
                .map(|e| e.emitter.clone())
                .collect()
        };
        if emitters.is_empty() {
            return 0;
        }
        self.remove_for(&emitters)
    }

    pub fn clear(&self) {
        lock(&self.stack).clear();
        self.top.set(None);
    }

    pub fn most_severe(&self) -> Option<StackEntry> {
        lock(&self.stack).most_severe().cloned()
    }

    pub fn entries(&self) -> Vec<StackEntry> {
        lock(&self.stack).entries().to_vec()
    }

    pub fn entries_for(&self, emitter: &str) -> Vec<StackEntry> {
        lock(&self.stack)
            .entries_for(emitter)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.stack).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.stack).is_empty()
    }

    /// Subscribe to changes of the most severe entry.
    pub fn on_top_change<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Option<StackEntry>) + Send + Sync + 'static,
    {
        self.top.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.top.unsubscribe(id)
    }

    /// Whether two handles share the same stack.
    pub fn same_as(&self, other: &MessageSink) -> bool {
        Arc::ptr_eq(&self.stack, &other.stack)
    }
}

impl fmt::Debug for MessageSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSink")
            .field("len", &self.len())
            .finish()
    }
}
