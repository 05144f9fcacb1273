use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicU64};

use arc_swap::ArcSwap;

use crate::{Listener, ListenerHandle};

// Process-wide, so that a handle can never match an entry of a registry that did not issue it.
static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// One registration: the handle that identifies it and the listener it notifies.
#[derive(Clone)]
pub(crate) struct ListenerEntry {
    handle: ListenerHandle,
    listener: Arc<dyn Listener>,
}

impl ListenerEntry {
    pub(crate) fn handle(&self) -> ListenerHandle {
        self.handle
    }

    pub(crate) fn listener(&self) -> &dyn Listener {
        &*self.listener
    }
}

impl fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// An immutable point-in-time view of the registered listeners, in registration order.
///
/// Taking a snapshot does not copy the entries; the registry replaces its list on every
/// mutation instead, so a snapshot stays valid (and unchanged) for as long as it is held.
#[derive(Clone, Debug)]
pub(crate) struct Snapshot {
    entries: Arc<Vec<ListenerEntry>>,
}

impl Deref for Snapshot {
    type Target = [ListenerEntry];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

/// Thread-safe set of active-state listeners.
///
/// Mutations are copy-on-write: `add()` and `remove()` publish a new list, while readers
/// load the current one without locking. Neither side ever waits for a dispatch round that
/// is iterating an older snapshot.
pub(crate) struct ListenerRegistry {
    id: u64,
    next_entry_id: AtomicU64,
    entries: ArcSwap<Vec<ListenerEntry>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, atomic::Ordering::Relaxed),
            next_entry_id: AtomicU64::new(1),
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Registers a listener. Registering the same listener again creates a second,
    /// independent entry with its own handle.
    pub(crate) fn add(&self, listener: Arc<dyn Listener>) -> ListenerHandle {
        let entry_id = self.next_entry_id.fetch_add(1, atomic::Ordering::Relaxed);
        let entry = ListenerEntry {
            handle: ListenerHandle::new(self.id, entry_id),
            listener,
        };
        let handle = entry.handle;

        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len().saturating_add(1));
            next.extend(current.iter().cloned());
            next.push(entry.clone());
            next
        });

        handle
    }

    /// Removes the entry for `handle`, returning it if there was one.
    ///
    /// Unknown handles, handles that were already removed and handles issued by another
    /// registry are all ignored.
    ///
    /// The returned entry may hold the last reference to the listener, so dropping it runs
    /// listener code. Callers holding a lock release it first.
    pub(crate) fn remove(&self, handle: ListenerHandle) -> Option<ListenerEntry> {
        if handle.registry_id() != self.id {
            return None;
        }

        if !self.entries.load().iter().any(|e| e.handle == handle) {
            return None;
        }

        let previous = self.entries.rcu(|current| {
            current
                .iter()
                .filter(|e| e.handle != handle)
                .cloned()
                .collect::<Vec<_>>()
        });

        previous.iter().find(|e| e.handle == handle).cloned()
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            entries: self.entries.load_full(),
        }
    }

    /// Empties the registry, returning the retired entries.
    ///
    /// As with `remove()`, dropping the result may run listener code.
    pub(crate) fn clear(&self) -> Snapshot {
        Snapshot {
            entries: self.entries.swap(Arc::new(Vec::new())),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.load().len()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
