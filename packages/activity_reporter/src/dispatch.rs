use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::registry::ListenerEntry;
use crate::{DeliveryErrors, DeliveryFailure, ListenerError};

thread_local! {
    // Registries whose listeners are being called on this thread right now, innermost last.
    // A listener of reporter A may legitimately drive reporter B, so this is a stack.
    static DISPATCHING: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Whether the current thread is inside a listener callback of the given registry.
pub(crate) fn is_dispatching(registry_id: u64) -> bool {
    DISPATCHING.with_borrow(|stack| stack.contains(&registry_id))
}

/// Delivers one notification to each listener of a snapshot.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    catch_panics: bool,
}

impl Dispatcher {
    pub(crate) const fn new(catch_panics: bool) -> Self {
        Self { catch_panics }
    }

    /// Calls every listener exactly once with `active`, in snapshot order.
    ///
    /// A failing or panicking listener does not stop the round. Failures are collected and
    /// returned once every listener has been called, with panics converted into
    /// [`ListenerError::Panicked`]. If panic catching is disabled, the first listener panic is
    /// instead resumed after the round has completed.
    pub(crate) fn deliver(
        &self,
        registry_id: u64,
        reporter_name: &str,
        listeners: &[ListenerEntry],
        active: bool,
    ) -> Result<(), DeliveryErrors> {
        DISPATCHING.with_borrow_mut(|stack| stack.push(registry_id));

        // Popped even if a listener panic is resumed.
        scopeguard::defer! {
            DISPATCHING.with_borrow_mut(|stack| {
                let popped = stack.pop();
                debug_assert_eq!(popped, Some(registry_id));
            });
        }

        let mut failures = Vec::new();
        let mut uncaught_panic = None;

        for entry in listeners {
            let notified = panic::catch_unwind(AssertUnwindSafe(|| {
                entry.listener().on_active_changed(active)
            }));

            let cause = match notified {
                Ok(Ok(())) => continue,
                Ok(Err(cause)) => cause,
                Err(payload) => {
                    let cause = ListenerError::Panicked(panic_message(&*payload));

                    if !self.catch_panics && uncaught_panic.is_none() {
                        uncaught_panic = Some(payload);
                    }

                    cause
                }
            };

            warn!(
                reporter = reporter_name,
                listener = %entry.handle(),
                active,
                error = %cause,
                "active-state listener failed"
            );

            failures.push(DeliveryFailure::new(entry.handle(), cause));
        }

        if let Some(payload) = uncaught_panic {
            panic::resume_unwind(payload);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DeliveryErrors::new(active, listeners.len(), failures))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
