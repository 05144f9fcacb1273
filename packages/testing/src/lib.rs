#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing and examples in the activity reporter packages.

use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

/// Runs a test with a timeout, so that a deadlock fails the test instead of hanging CI.
///
/// The timeout is 10 seconds under normal conditions and 60 seconds under Miri, where
/// thread synchronization primitives are significantly slower.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled
/// and the test function is executed directly, so mutation testing can detect mutations
/// that hang.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode).
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// with_watchdog(|| {
///     assert_eq!(2 + 2, 4);
/// });
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        let result = test_fn();
        // If this fails, the receiver has already timed out.
        drop(tx.send(result));
    });

    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_handle.join().expect("Test thread should not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("Test exceeded {timeout:?} timeout - likely a deadlock");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("Test thread disconnected unexpectedly"),
            Err(e) => std::panic::resume_unwind(e),
        },
    }
}

/// A thread-safe, cloneable record of calls, for asserting on what a callback observed.
///
/// All clones share the same record.
///
/// # Example
///
/// ```rust
/// use testing::CallLog;
///
/// let log = CallLog::new();
/// let callback = {
///     let log = log.clone();
///     move |value: bool| log.record(value)
/// };
///
/// callback(true);
/// callback(false);
///
/// assert_eq!(log.calls(), vec![true, false]);
/// ```
pub struct CallLog<T> {
    calls: Arc<Mutex<Vec<T>>>,
}

impl<T> CallLog<T> {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Appends one call to the log.
    ///
    /// # Panics
    ///
    /// Panics if a thread panicked while holding the log lock.
    pub fn record(&self, value: T) {
        self.calls.lock().expect("call log lock poisoned").push(value);
    }

    /// How many calls have been recorded so far.
    ///
    /// # Panics
    ///
    /// Panics if a thread panicked while holding the log lock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.lock().expect("call log lock poisoned").len()
    }

    /// Whether no calls have been recorded so far.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> CallLog<T> {
    /// A copy of every recorded call, in recording order.
    ///
    /// # Panics
    ///
    /// Panics if a thread panicked while holding the log lock.
    #[must_use]
    pub fn calls(&self) -> Vec<T> {
        self.calls.lock().expect("call log lock poisoned").clone()
    }
}

impl<T> Clone for CallLog<T> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<T> Default for CallLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug> Debug for CallLog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallLog")
            .field("calls", &self.calls)
            .finish()
    }
}
