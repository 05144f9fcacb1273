use std::sync::atomic::{self, AtomicBool};

/// The active flag of a reporter, plus detection of real transitions.
///
/// Starts out inactive.
#[derive(Debug, Default)]
pub(crate) struct ActivityState {
    active: AtomicBool,
}

impl ActivityState {
    pub(crate) const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(atomic::Ordering::Acquire)
    }

    /// Stores `active` and returns whether this call changed the value.
    ///
    /// When several threads race, each observes the value it replaced, so exactly one
    /// of two racing `true` writers sees the change.
    pub(crate) fn try_set_active(&self, active: bool) -> bool {
        self.active.swap(active, atomic::Ordering::AcqRel) != active
    }
}
