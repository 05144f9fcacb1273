use std::error::Error as StdError;

use thiserror::Error;

use crate::ListenerHandle;

/// Errors returned by [`Reporter`][crate::Reporter] operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A listener registration was attempted after the reporter was closed.
    ///
    /// This is the signal to stop trying to register with this reporter. There is
    /// nothing to retry: a closed reporter never opens again.
    #[error("the activity reporter has been closed and accepts no new listeners")]
    ReporterClosed,

    /// One or more listeners failed while being notified of a transition.
    ///
    /// The transition itself was applied and every other listener in the snapshot
    /// was still notified.
    #[error(transparent)]
    ListenerDelivery(#[from] DeliveryErrors),

    /// `set_active()` was called from inside a listener callback that is being
    /// notified by the same reporter. The call was rejected without changing state.
    #[error("set_active() called from within an active-state listener of the same reporter")]
    ReentrantTransition,
}

/// The error a [`Listener`][crate::Listener] returns when it could not handle a notification.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ListenerError {
    /// The listener reported a failure of its own.
    #[error("listener failed: {0}")]
    Failed(#[source] Box<dyn StdError + Send + Sync>),

    /// The listener panicked. The panic was caught and the message preserved.
    #[error("listener panicked: {0}")]
    Panicked(String),
}

impl ListenerError {
    /// Wraps an arbitrary error (or a message) as a listener failure.
    ///
    /// # Example
    ///
    /// ```
    /// use activity_reporter::ListenerError;
    ///
    /// let error = ListenerError::failed("trace file is not writable");
    /// assert_eq!(error.to_string(), "listener failed: trace file is not writable");
    /// ```
    #[must_use]
    pub fn failed(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Failed(error.into())
    }
}

/// A single listener that failed during a dispatch round.
#[derive(Debug, Error)]
#[error("{handle} failed to observe the activity change")]
pub struct DeliveryFailure {
    handle: ListenerHandle,

    #[source]
    cause: ListenerError,
}

impl DeliveryFailure {
    pub(crate) fn new(handle: ListenerHandle, cause: ListenerError) -> Self {
        Self { handle, cause }
    }

    /// The registration of the listener that failed.
    #[must_use]
    pub fn handle(&self) -> ListenerHandle {
        self.handle
    }

    /// What the listener reported (or how it panicked).
    #[must_use]
    pub fn cause(&self) -> &ListenerError {
        &self.cause
    }
}

/// Every listener failure collected during one dispatch round.
///
/// Failures are listed in delivery order. The collection is never empty.
#[derive(Debug, Error)]
#[error(
    "{count} of {notified} active-state listeners failed to observe active = {active}",
    count = .failures.len()
)]
pub struct DeliveryErrors {
    active: bool,
    notified: usize,
    failures: Vec<DeliveryFailure>,
}

impl DeliveryErrors {
    pub(crate) fn new(active: bool, notified: usize, failures: Vec<DeliveryFailure>) -> Self {
        debug_assert!(!failures.is_empty());

        Self {
            active,
            notified,
            failures,
        }
    }

    /// The value that was being delivered when the failures occurred.
    #[must_use]
    pub fn active(&self) -> bool {
        self.active
    }

    /// How many listeners were in the snapshot, including the ones that failed.
    #[must_use]
    pub fn notified(&self) -> usize {
        self.notified
    }

    /// The individual failures, in delivery order.
    #[must_use]
    pub fn failures(&self) -> &[DeliveryFailure] {
        &self.failures
    }

    /// Consumes the collection, returning the individual failures.
    #[must_use]
    pub fn into_failures(self) -> Vec<DeliveryFailure> {
        self.failures
    }
}
