//! Change notifications for successful writes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use cipherdb_core::Value;

/// What kind of write happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    /// Every row of the table was removed.
    Clear,
}

/// Delivered to observers after a write has committed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: &'static str,
    pub kind: ChangeKind,
    /// Key of the affected row; `None` for bulk deletes and clears.
    pub primary_key: Option<Value>,
}

impl ChangeEvent {
    pub fn new(table: &'static str, kind: ChangeKind, primary_key: Option<Value>) -> Self {
        Self {
            table,
            kind,
            primary_key,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Observers {
    next_id: AtomicU64,
    callbacks: RwLock<Vec<(u64, Callback)>>,
}

impl Observers {
    pub(crate) fn subscribe(&self, callback: Callback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, callback));
        Subscription(id)
    }

    pub(crate) fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut callbacks = self
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = callbacks.len();
        callbacks.retain(|(id, _)| *id != subscription.0);
        callbacks.len() != before
    }

    /// Callbacks run outside the lock, so they may subscribe or unsubscribe.
    pub(crate) fn notify(&self, events: &[ChangeEvent]) {
        if events.is_empty() {
            return;
        }
        let callbacks: Vec<Callback> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for event in events {
            tracing::trace!(table = event.table, kind = ?event.kind, "Change event");
            for callback in &callbacks {
                callback(event);
            }
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .callbacks
            .read()
            .map(|c| c.len())
            .unwrap_or_default();
        f.debug_struct("Observers").field("count", &count).finish()
    }
}
