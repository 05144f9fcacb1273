use crate::{ListenerHandle, Reporter};

/// A listener registration that is removed when this guard is dropped.
///
/// Returned by [`Reporter::subscribe()`].
///
/// # Example
///
/// ```
/// use activity_reporter::Reporter;
///
/// let reporter = Reporter::new();
///
/// {
///     let _subscription = reporter.subscribe(|_: bool| Ok(())).unwrap();
///     assert_eq!(reporter.listener_count(), 1);
/// } // Unregistered here.
///
/// assert_eq!(reporter.listener_count(), 0);
/// ```
#[derive(Debug)]
#[must_use = "the listener is unregistered as soon as the subscription is dropped"]
pub struct Subscription<'r> {
    reporter: &'r Reporter,

    // `None` once detached.
    handle: Option<ListenerHandle>,
}

impl<'r> Subscription<'r> {
    pub(crate) fn new(reporter: &'r Reporter, handle: ListenerHandle) -> Self {
        Self {
            reporter,
            handle: Some(handle),
        }
    }

    /// The handle of the underlying registration.
    #[must_use]
    pub fn handle(&self) -> ListenerHandle {
        self.handle
            .expect("handle is only taken by detach(), which consumes the subscription")
    }

    /// Keeps the listener registered beyond the lifetime of this guard.
    ///
    /// The returned handle can still be passed to
    /// [`Reporter::remove_active_listener()`] later.
    pub fn detach(mut self) -> ListenerHandle {
        self.handle
            .take()
            .expect("handle is only taken by detach(), which consumes the subscription")
    }
}

impl Drop for Subscription<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.reporter.remove_active_listener(handle);
        }
    }
}
