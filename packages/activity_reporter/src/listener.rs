use std::fmt;

use crate::ListenerError;

/// Receives a notification every time the active state of a reporter changes.
///
/// Implemented for any `Fn(bool) -> Result<(), ListenerError>` closure that is
/// thread-safe, so most listeners are just closures:
///
/// ```
/// use activity_reporter::Reporter;
///
/// let reporter = Reporter::new();
///
/// let _handle = reporter
///     .add_active_listener(|active: bool| {
///         println!("allocation tracking is now {}", if active { "on" } else { "off" });
///         Ok(())
///     })
///     .unwrap();
/// ```
///
/// Notifications are delivered synchronously on the thread that changed the state. A listener
/// must not call [`Reporter::set_active()`][crate::Reporter::set_active] on the reporter that is
/// notifying it; such calls are rejected with
/// [`Error::ReentrantTransition`][crate::Error::ReentrantTransition]. Adding and removing
/// listeners from within a callback is fine.
#[cfg_attr(test, mockall::automock)]
pub trait Listener: Send + Sync {
    /// Called once per transition with the new value of the active flag.
    ///
    /// # Errors
    ///
    /// A returned error does not prevent other listeners from being notified. It is
    /// collected and reported to the caller of `set_active()` once the whole dispatch
    /// round has completed.
    fn on_active_changed(&self, active: bool) -> Result<(), ListenerError>;
}

impl<F> Listener for F
where
    F: Fn(bool) -> Result<(), ListenerError> + Send + Sync,
{
    #[cfg_attr(test, mutants::skip)] // Pure forwarding.
    fn on_active_changed(&self, active: bool) -> Result<(), ListenerError> {
        self(active)
    }
}

/// Identifies one listener registration and can be used to remove it again.
///
/// Each registration gets its own handle, even when the same listener is registered more
/// than once. A handle only ever matches an entry in the reporter that issued it; using it
/// with any other reporter does nothing.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ListenerHandle {
    registry_id: u64,
    entry_id: u64,
}

impl ListenerHandle {
    pub(crate) const fn new(registry_id: u64, entry_id: u64) -> Self {
        Self {
            registry_id,
            entry_id,
        }
    }

    pub(crate) const fn registry_id(self) -> u64 {
        self.registry_id
    }
}

impl fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener {}.{}", self.registry_id, self.entry_id)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(ListenerHandle: Send, Sync, Copy);
    assert_impl_all!(MockListener: Listener);

    #[test]
    fn closure_is_listener() {
        let listener = |active: bool| {
            if active {
                Ok(())
            } else {
                Err(ListenerError::failed("only likes true"))
            }
        };

        listener.on_active_changed(true).unwrap();
        listener.on_active_changed(false).unwrap_err();
    }

    #[test]
    fn handles_compare_by_registry_and_entry() {
        let a = ListenerHandle::new(1, 1);

        assert_eq!(a, ListenerHandle::new(1, 1));
        assert_ne!(a, ListenerHandle::new(2, 1));
        assert_ne!(a, ListenerHandle::new(1, 2));
        assert_eq!(a.registry_id(), 1);
    }

    #[test]
    fn handle_display() {
        assert_eq!(ListenerHandle::new(3, 14).to_string(), "listener 3.14");
    }
}
