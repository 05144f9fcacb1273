use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::{Error, Reporter};

/// Keeps a reporter active for as long as at least one allocation consumer is attached.
///
/// This is one possible policy for driving a [`Reporter`]: the first [`attach()`][Self::attach]
/// turns tracking on, dropping the last [`GateGuard`] turns it off again. The reporter itself
/// stays policy-free and can be driven by other means instead.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use activity_reporter::{Reporter, TrackingGate};
///
/// let reporter = Arc::new(Reporter::new());
/// let gate = TrackingGate::new(Arc::clone(&reporter));
///
/// let profiler = gate.attach().unwrap();
/// let leak_detector = gate.attach().unwrap();
/// assert!(reporter.is_active());
///
/// drop(profiler);
/// assert!(reporter.is_active());
///
/// leak_detector.release().unwrap();
/// assert!(!reporter.is_active());
/// ```
///
/// Attaching or releasing from inside an active-state listener of the same reporter is not
/// supported and will deadlock.
pub struct TrackingGate {
    reporter: Arc<Reporter>,
    consumers: Mutex<usize>,
}

impl TrackingGate {
    /// Creates a gate that drives `reporter`. No consumers are attached initially.
    ///
    /// The gate assumes it is the only driver of the reporter's active state.
    #[must_use]
    pub fn new(reporter: Arc<Reporter>) -> Self {
        Self {
            reporter,
            consumers: Mutex::new(0),
        }
    }

    /// The reporter driven by this gate.
    #[must_use]
    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// How many consumers are currently attached.
    #[must_use]
    pub fn consumers(&self) -> usize {
        *self.lock_consumers()
    }

    /// Attaches an allocation consumer, activating the reporter if it is the first one.
    ///
    /// The consumer stays attached until the returned guard is dropped or released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReporterClosed`] if the reporter has been closed.
    ///
    /// Returns [`Error::ListenerDelivery`] if activating the reporter made some listener fail.
    /// The attachment is rolled back in that case, which deactivates the reporter again.
    pub fn attach(&self) -> Result<GateGuard<'_>, Error> {
        let mut consumers = self.lock_consumers();

        if self.reporter.is_closed() {
            return Err(Error::ReporterClosed);
        }

        *consumers = consumers
            .checked_add(1)
            .expect("attached consumer count overflows usize - this indicates an unrealistic scenario");

        let guard = GateGuard {
            gate: self,
            released: false,
        };

        if *consumers == 1 {
            // A close() that lands after the check above turns set_active() into a no-op.
            // Only the gate drives the flag, so an inactive reporter here means exactly that.
            let result = self.reporter.set_active(true).and_then(|()| {
                if self.reporter.is_active() {
                    Ok(())
                } else {
                    Err(Error::ReporterClosed)
                }
            });

            // The guard re-locks on drop if we bail out below.
            drop(consumers);
            result?;
        }

        Ok(guard)
    }

    fn release(&self) -> Result<(), Error> {
        let mut consumers = self.lock_consumers();
        *consumers = consumers
            .checked_sub(1)
            .expect("every guard increments the count exactly once before it can release");

        if *consumers == 0 {
            self.reporter.set_active(false)
        } else {
            Ok(())
        }
    }

    fn lock_consumers(&self) -> MutexGuard<'_, usize> {
        // The count is always updated before set_active() runs listener code, so a lock
        // poisoned by an uncaught listener panic still holds a correct count.
        self.consumers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TrackingGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingGate")
            .field("reporter", &self.reporter.name())
            .field("consumers", &self.consumers())
            .finish()
    }
}

/// One attached allocation consumer of a [`TrackingGate`].
///
/// Dropping the guard detaches the consumer. Listener failures caused by the resulting
/// deactivation are logged, as `Drop` cannot return them; use [`release()`][Self::release]
/// to receive them instead.
#[derive(Debug)]
#[must_use = "the consumer is detached as soon as the guard is dropped"]
pub struct GateGuard<'g> {
    gate: &'g TrackingGate,
    released: bool,
}

impl GateGuard<'_> {
    /// Detaches the consumer, deactivating the reporter if it was the last one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ListenerDelivery`] if deactivating the reporter made some listener fail.
    /// The consumer is detached and the reporter deactivated regardless.
    pub fn release(mut self) -> Result<(), Error> {
        self.released = true;
        self.gate.release()
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if let Err(error) = self.gate.release() {
            warn!(
                reporter = self.gate.reporter.name(),
                %error,
                "deactivating allocation tracking on detach failed"
            );
        }
    }
}
