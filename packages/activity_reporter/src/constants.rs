// A poisoned lock means a panic interrupted a critical section that never runs user code,
// so the reporter state can no longer be trusted and we refuse to continue.
pub(crate) const ERR_POISONED_LOCK: &str = "encountered poisoned lock - continued execution \
    is not safe because the activity reporter state may be inconsistent";

/// Name given to reporters that are not explicitly named via the builder.
pub(crate) const DEFAULT_REPORTER_NAME: &str = "allocation";
