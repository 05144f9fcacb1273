use crate::Reporter;
use crate::constants::DEFAULT_REPORTER_NAME;

/// Creates instances of [`Reporter`].
///
/// Use `Reporter::builder()` to create a new instance of this builder. All parameters are
/// optional; `Reporter::new()` is equivalent to `Reporter::builder().build()`.
///
/// # Example
///
/// ```
/// use activity_reporter::Reporter;
///
/// let reporter = Reporter::builder()
///     .name("heap_profiler")
///     .catch_listener_panics(false)
///     .build();
///
/// assert_eq!(reporter.name(), "heap_profiler");
/// ```
#[derive(Debug)]
#[must_use = "a builder does nothing until build() is called"]
pub struct ReporterBuilder {
    name: String,
    catch_listener_panics: bool,
}

impl ReporterBuilder {
    pub(crate) fn new() -> Self {
        Self {
            name: DEFAULT_REPORTER_NAME.to_string(),
            catch_listener_panics: true,
        }
    }

    /// Sets the name of the reporter, used to tell reporters apart in log events.
    ///
    /// Defaults to `allocation`.
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }

    /// Sets whether a panicking listener is caught and reported as
    /// [`ListenerError::Panicked`][crate::ListenerError::Panicked].
    ///
    /// Enabled by default. When disabled, the round still completes: every other listener
    /// is notified of the transition, and only then is the first listener panic resumed out
    /// of `set_active()`. The state change stays applied.
    pub fn catch_listener_panics(self, catch: bool) -> Self {
        Self {
            catch_listener_panics: catch,
            ..self
        }
    }

    /// Creates the reporter, initially inactive and open.
    #[must_use]
    pub fn build(self) -> Reporter {
        Reporter::from_builder(self.name, self.catch_listener_panics)
    }
}
