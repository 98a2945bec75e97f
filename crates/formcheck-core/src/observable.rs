//! Observable cells.
//!
//! An [`Observable`] is a value container with `get`, `set` and
//! `subscribe`. Setting a different value synchronously notifies every
//! subscriber, in subscription order, after the internal lock has been
//! released, so listeners may freely read this or any other cell.
//!
//! There is no dependency tracking: a listener sees exactly the cells it
//! subscribed to. Writing back into the same cell from inside its own
//! notification is not guarded against.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Identifies a subscription so it can be cancelled.
///
/// Ids are unique across all cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: T,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
}

/// A value cell with explicit subscriber lists.
pub struct Observable<T> {
    inner: Mutex<Inner<T>>,
}

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// None of the engine's critical sections can leave their data half
/// written, so a poisoned lock still guards a consistent value.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T> Observable<T>
where
    T: Clone + PartialEq,
{
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Inner {
                value,
                listeners: Vec::new(),
            }),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        lock(&self.inner).value.clone()
    }

    /// Store a value and notify subscribers if it changed.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        let changed = self.store(value);
        if changed {
            self.notify();
        }
        changed
    }

    /// Store a value without notifying anyone.
    ///
    /// Pair with [`Observable::notify`] when several cells must all hold
    /// their new values before the first listener runs.
    pub fn store(&self, value: T) -> bool {
        let mut inner = lock(&self.inner);
        if inner.value == value {
            return false;
        }
        inner.value = value;
        true
    }

    /// Call every subscriber with the current value.
    pub fn notify(&self) {
        let (value, listeners) = {
            let inner = lock(&self.inner);
            let listeners: Vec<Listener<T>> =
                inner.listeners.iter().map(|(_, l)| l.clone()).collect();
            (inner.value.clone(), listeners)
        };
        for listener in listeners {
            listener(&value);
        }
    }

    /// Register a listener, called on every change.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner).listeners.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = lock(&self.inner);
        let before = inner.listeners.len();
        inner.listeners.retain(|(lid, _)| *lid != id);
        inner.listeners.len() != before
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

impl<T: Clone + PartialEq + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("subscribers", &inner.listeners.len())
            .finish()
    }
}
