#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Active-state notifications for allocation tracking.
//!
//! Allocation tracking is expensive, so it is only switched on while somebody is interested.
//! Code that caches "is tracking on?" decisions (instrumented allocation sites, diagnostics,
//! test hooks) needs to hear about every switch. This package provides the piece that
//! announces those switches:
//!
//! * [`Reporter`] - holds the active flag and the registered listeners. Every real change
//!   of the flag is delivered to every listener registered at that moment, exactly once,
//!   before [`Reporter::set_active()`] returns. Repeating the current value delivers nothing.
//! * [`Listener`] - the single-method capability a listener implements. Closures of the form
//!   `Fn(bool) -> Result<(), ListenerError>` qualify.
//! * [`ListenerHandle`] / [`Subscription`] - identify a registration for later removal.
//!   Removal is idempotent and never fails.
//! * [`TrackingGate`] - an example driver that keeps a reporter active while at least one
//!   allocation consumer is attached.
//!
//! Deciding *when* tracking should be active is not the reporter's business; whoever owns the
//! tracking policy calls [`Reporter::set_active()`].
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! use activity_reporter::Reporter;
//!
//! let reporter = Reporter::new();
//!
//! // An allocation site that caches whether it needs to report anything.
//! let site_enabled = Arc::new(AtomicBool::new(reporter.is_active()));
//!
//! reporter
//!     .add_active_listener({
//!         let site_enabled = Arc::clone(&site_enabled);
//!         move |active: bool| {
//!             site_enabled.store(active, Ordering::Relaxed);
//!             Ok(())
//!         }
//!     })
//!     .unwrap();
//!
//! reporter.set_active(true).unwrap();
//! assert!(site_enabled.load(Ordering::Relaxed));
//!
//! reporter.close();
//! ```
//!
//! # Delivery guarantees
//!
//! * A transition is delivered to the snapshot of listeners taken atomically with the change
//!   of the flag. A listener that is added or removed concurrently with a transition is either
//!   in that snapshot and notified once, or not in it and not notified at all.
//! * Transitions of one reporter are delivered one round at a time, in the order they were
//!   applied to the flag. `set_active()` blocks until its round is complete.
//! * Listeners are called outside of any registry lock, so they may add and remove listeners,
//!   including themselves. They may not call `set_active()` on the reporter that is notifying
//!   them; that call fails with [`Error::ReentrantTransition`].
//! * A failing or panicking listener does not stop the round. All failures are returned
//!   together as [`Error::ListenerDelivery`] once every listener has been called.
//!
//! # Logging
//!
//! Transitions, registrations and listener failures are emitted as [`tracing`] events.
//! No subscriber is installed by this package.

mod builder;
mod constants;
mod dispatch;
mod error;
mod gate;
mod listener;
mod registry;
mod reporter;
mod state;
mod subscription;

pub use builder::*;
pub use error::*;
pub use gate::*;
pub use listener::*;
pub use reporter::*;
pub use subscription::*;
