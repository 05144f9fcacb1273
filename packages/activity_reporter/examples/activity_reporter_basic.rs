//! Demonstrates an allocation tracking reporter driven by a `TrackingGate`.
//!
//! Two consumers attach to the gate at different times. A listener standing in for an
//! instrumented allocation site follows the active state, and a diagnostics listener prints
//! every transition. Set `RUST_LOG=activity_reporter=trace` to also see the log events.
//!
//! Run with: `cargo run --example activity_reporter_basic`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use activity_reporter::{Reporter, TrackingGate};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let reporter = Arc::new(Reporter::builder().name("demo_heap").build());
    let gate = TrackingGate::new(Arc::clone(&reporter));

    // An allocation site caches whether it must report allocations.
    let site_enabled = Arc::new(AtomicBool::new(reporter.is_active()));
    reporter
        .add_active_listener({
            let site_enabled = Arc::clone(&site_enabled);
            move |active: bool| {
                site_enabled.store(active, Ordering::Relaxed);
                Ok(())
            }
        })
        .expect("reporter is open");

    let diagnostics = reporter
        .subscribe(|active: bool| {
            println!("   [diagnostics] tracking is now {}", if active { "ON" } else { "OFF" });
            Ok(())
        })
        .expect("reporter is open");

    println!("1. Attaching a heap profiler:");
    let profiler = gate.attach().expect("reporter is open");
    println!("   site enabled: {}", site_enabled.load(Ordering::Relaxed));

    println!("2. Attaching a leak detector (already active, no transition):");
    let leak_detector = gate.attach().expect("reporter is open");
    println!("   consumers: {}", gate.consumers());

    println!("3. Detaching the profiler:");
    drop(profiler);
    println!("   site enabled: {}", site_enabled.load(Ordering::Relaxed));

    println!("4. Detaching the leak detector:");
    if let Err(error) = leak_detector.release() {
        println!("   some listeners failed: {error}");
    }
    println!("   site enabled: {}", site_enabled.load(Ordering::Relaxed));

    drop(diagnostics);

    println!("5. Tearing down the tracking context:");
    reporter.close();
    println!(
        "   closed: {}, registering now fails with: {}",
        reporter.is_closed(),
        reporter
            .add_active_listener(|_: bool| Ok(()))
            .expect_err("reporter is closed")
    );
}
