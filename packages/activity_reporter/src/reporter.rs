use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace, warn};

use crate::constants::ERR_POISONED_LOCK;
use crate::dispatch::{self, Dispatcher};
use crate::registry::ListenerRegistry;
use crate::state::ActivityState;
use crate::{Error, Listener, ListenerHandle, ReporterBuilder, Subscription};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Lifecycle {
    Open,
    Closed,
}

/// Tells registered listeners whenever allocation tracking turns on or off.
///
/// A reporter holds a single active flag, initially `false`, and a set of listeners.
/// Every real change of the flag made through [`set_active()`][Self::set_active] is
/// delivered exactly once to every listener that was registered at the moment of the
/// change. Setting the value the flag already holds notifies nobody.
///
/// Create one reporter per allocation-tracking context and pass it (by reference or in an
/// `Arc`) to the code that needs it. When the context is torn down, [`close()`][Self::close]
/// the reporter: from then on it refuses new listeners and ignores state changes.
///
/// All methods take `&self` and may be called from any thread.
///
/// # Example
///
/// ```
/// use std::sync::{Arc, Mutex};
///
/// use activity_reporter::Reporter;
///
/// let reporter = Reporter::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let handle = reporter
///     .add_active_listener({
///         let seen = Arc::clone(&seen);
///         move |active: bool| {
///             seen.lock().unwrap().push(active);
///             Ok(())
///         }
///     })
///     .unwrap();
///
/// reporter.set_active(true).unwrap();
/// reporter.set_active(true).unwrap(); // Already active - nobody is notified.
/// reporter.remove_active_listener(handle);
/// reporter.set_active(false).unwrap();
///
/// assert_eq!(*seen.lock().unwrap(), vec![true]);
/// ```
pub struct Reporter {
    name: String,
    state: ActivityState,
    registry: ListenerRegistry,
    dispatcher: Dispatcher,

    // Linearizes registry mutation, teardown and the "flip the flag + take a snapshot" step
    // of a transition. Never held while user code runs.
    lifecycle: Mutex<Lifecycle>,

    // Held for a whole transition, including delivery, so that rounds are delivered in the
    // order their changes were applied to the flag.
    transition: Mutex<()>,
}

impl Reporter {
    /// Creates an open, inactive reporter with default settings.
    ///
    /// See [`builder()`][Self::builder] to customize the reporter.
    #[expect(
        clippy::new_without_default,
        reason = "a reporter belongs to one tracking context, there is no meaningful 'default' one"
    )]
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a reporter with custom settings.
    pub fn builder() -> ReporterBuilder {
        ReporterBuilder::new()
    }

    pub(crate) fn from_builder(name: String, catch_listener_panics: bool) -> Self {
        Self {
            name,
            state: ActivityState::new(),
            registry: ListenerRegistry::new(),
            dispatcher: Dispatcher::new(catch_listener_panics),
            lifecycle: Mutex::new(Lifecycle::Open),
            transition: Mutex::new(()),
        }
    }

    /// The name given to the reporter when it was built.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether allocation tracking is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Whether the reporter has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.lifecycle.lock().expect(ERR_POISONED_LOCK) == Lifecycle::Closed
    }

    /// How many listener registrations are currently active.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    /// Registers a listener for active-state changes.
    ///
    /// The listener is notified of every transition that happens after this call returns,
    /// and of none that completed before it. Registering the same listener twice creates two
    /// registrations, each notified separately and each removed separately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReporterClosed`] if the reporter has been closed.
    pub fn add_active_listener(
        &self,
        listener: impl Listener + 'static,
    ) -> Result<ListenerHandle, Error> {
        self.add_shared_active_listener(Arc::new(listener))
    }

    /// Registers a listener that is shared with other owners.
    ///
    /// Use this to register one listener instance more than once, or to keep access to the
    /// listener while it is registered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReporterClosed`] if the reporter has been closed.
    pub fn add_shared_active_listener(
        &self,
        listener: Arc<dyn Listener>,
    ) -> Result<ListenerHandle, Error> {
        let lifecycle = self.lifecycle.lock().expect(ERR_POISONED_LOCK);

        if *lifecycle == Lifecycle::Closed {
            return Err(Error::ReporterClosed);
        }

        let handle = self.registry.add(listener);
        drop(lifecycle);

        trace!(reporter = %self.name, listener = %handle, "active-state listener added");

        Ok(handle)
    }

    /// Registers a listener that stays registered until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReporterClosed`] if the reporter has been closed.
    pub fn subscribe(&self, listener: impl Listener + 'static) -> Result<Subscription<'_>, Error> {
        let handle = self.add_active_listener(listener)?;
        Ok(Subscription::new(self, handle))
    }

    /// Removes a listener registration.
    ///
    /// Removing a registration that was already removed, that belongs to another reporter
    /// or whose reporter has been closed does nothing. A listener removed while a transition
    /// is being delivered may still receive that one notification if it was part of the
    /// snapshot taken for it, but nothing after.
    pub fn remove_active_listener(&self, handle: ListenerHandle) {
        let lifecycle = self.lifecycle.lock().expect(ERR_POISONED_LOCK);
        let removed = self.registry.remove(handle);
        drop(lifecycle);

        if let Some(entry) = removed {
            trace!(reporter = %self.name, listener = %handle, "active-state listener removed");

            // May be the last reference to the listener, whose drop may call back into us.
            drop(entry);
        }
    }

    /// Sets the active flag, notifying every registered listener if the value changed.
    ///
    /// This call blocks until every listener registered at the time of the change has been
    /// notified. Concurrent callers are serialized, so listeners observe transitions in the
    /// order they were applied. Setting the value the flag already holds, or calling this on
    /// a closed reporter, does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListenerDelivery`] if any listener failed. The flag is changed and all
    /// other listeners are notified regardless.
    ///
    /// Returns [`Error::ReentrantTransition`] if called from within a listener that is being
    /// notified by this same reporter, even if `active` equals the value the flag already
    /// holds. The flag is left unchanged in that case.
    pub fn set_active(&self, active: bool) -> Result<(), Error> {
        if dispatch::is_dispatching(self.registry.id()) {
            warn!(
                reporter = %self.name,
                active, "rejected set_active() from within an active-state listener"
            );
            return Err(Error::ReentrantTransition);
        }

        // Poisoning can only come from a listener panic that we were told not to catch.
        // The guarded value carries no state, so there is nothing to distrust.
        let transition = self
            .transition
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let snapshot = {
            let lifecycle = self.lifecycle.lock().expect(ERR_POISONED_LOCK);

            if *lifecycle == Lifecycle::Closed || !self.state.try_set_active(active) {
                return Ok(());
            }

            self.registry.snapshot()
        };

        debug!(
            reporter = %self.name,
            active,
            listeners = snapshot.len(),
            "allocation tracking active state changed"
        );

        let result = self
            .dispatcher
            .deliver(self.registry.id(), &self.name, &snapshot, active);

        // The snapshot may hold the last reference to a listener removed during the round.
        // Its drop may call back into us, so nothing may be locked by then.
        drop(transition);
        drop(snapshot);

        result.map_err(Error::from)
    }

    /// Tears the reporter down.
    ///
    /// All registrations are dropped. Afterwards, [`add_active_listener()`][Self::add_active_listener]
    /// fails with [`Error::ReporterClosed`], while `remove_active_listener()` and `set_active()`
    /// silently do nothing. Closing an already closed reporter does nothing.
    ///
    /// A transition that was already being delivered when this is called completes normally.
    pub fn close(&self) {
        let mut lifecycle = self.lifecycle.lock().expect(ERR_POISONED_LOCK);

        if *lifecycle == Lifecycle::Closed {
            return;
        }

        *lifecycle = Lifecycle::Closed;
        let retired = self.registry.clear();
        drop(lifecycle);

        debug!(
            reporter = %self.name,
            dropped_listeners = retired.len(),
            "activity reporter closed"
        );

        // Listener drops run here, with nothing locked.
        drop(retired);
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .field("closed", &self.is_closed())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
