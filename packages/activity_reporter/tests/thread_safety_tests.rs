//! Thread safety integration tests for `activity_reporter`.
//!
//! These tests drive one reporter from many threads at once and check that every listener
//! still observes a well-formed sequence of transitions.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use activity_reporter::{ListenerError, Reporter, TrackingGate};
use testing::{CallLog, with_watchdog};

fn recording_listener(log: &CallLog<bool>) -> impl Fn(bool) -> Result<(), ListenerError> + use<> {
    let log = log.clone();
    move |active: bool| {
        log.record(active);
        Ok(())
    }
}

/// Each real transition flips the flag, so any contiguous run of transitions alternates.
fn assert_alternates(calls: &[bool]) {
    for pair in calls.windows(2) {
        assert_ne!(pair[0], pair[1], "observed the same value twice in a row: {calls:?}");
    }
}

#[test]
fn racing_toggles_are_delivered_in_order() {
    const THREADS: usize = 8;
    const TOGGLES_PER_THREAD: usize = 500;

    with_watchdog(|| {
        let reporter = Arc::new(Reporter::new());
        let log = CallLog::new();
        reporter.add_active_listener(recording_listener(&log)).unwrap();

        let threads = (0..THREADS)
            .map(|thread_index| {
                let reporter = Arc::clone(&reporter);
                thread::spawn(move || {
                    for i in 0..TOGGLES_PER_THREAD {
                        reporter.set_active((i + thread_index) % 2 == 0).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();

        for thread in threads {
            thread.join().unwrap();
        }

        let calls = log.calls();
        assert_alternates(&calls);
        assert_eq!(calls.first(), Some(&true));
        assert_eq!(calls.last().copied(), Some(reporter.is_active()));
    });
}

#[test]
fn listeners_churning_during_toggles_see_contiguous_transitions() {
    const TOGGLERS: usize = 2;
    const CHURNERS: usize = 4;
    const ITERATIONS: usize = 300;

    with_watchdog(|| {
        let reporter = Arc::new(Reporter::new());

        let togglers = (0..TOGGLERS)
            .map(|_| {
                let reporter = Arc::clone(&reporter);
                thread::spawn(move || {
                    for i in 0..ITERATIONS {
                        reporter.set_active(i % 2 == 0).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();

        let churners = (0..CHURNERS)
            .map(|_| {
                let reporter = Arc::clone(&reporter);
                thread::spawn(move || {
                    let mut logs = Vec::with_capacity(ITERATIONS);

                    for _ in 0..ITERATIONS {
                        let log = CallLog::new();
                        let handle = reporter
                            .add_active_listener(recording_listener(&log))
                            .unwrap();
                        thread::yield_now();
                        reporter.remove_active_listener(handle);

                        logs.push(log);
                    }

                    logs
                })
            })
            .collect::<Vec<_>>();

        for thread in togglers {
            thread.join().unwrap();
        }

        for thread in churners {
            for log in thread.join().unwrap() {
                assert_alternates(&log.calls());
            }
        }

        assert_eq!(reporter.listener_count(), 0);
    });
}

#[test]
fn removed_listener_hears_nothing_afterwards() {
    const ROUNDS: usize = 200;

    with_watchdog(|| {
        let reporter = Arc::new(Reporter::new());

        let toggler = {
            let reporter = Arc::clone(&reporter);
            thread::spawn(move || {
                for i in 0..ROUNDS * 4 {
                    reporter.set_active(i % 2 == 0).unwrap();
                }
            })
        };

        for _ in 0..ROUNDS {
            let log = CallLog::new();
            let handle = reporter.add_active_listener(recording_listener(&log)).unwrap();
            reporter.remove_active_listener(handle);

            // A round that was already in flight may still deliver to the snapshot it took
            // before the removal. Any transition call on this thread waits for that round.
            reporter.set_active(reporter.is_active()).unwrap();
            let settled = log.len();

            reporter.set_active(!reporter.is_active()).unwrap();
            reporter.set_active(!reporter.is_active()).unwrap();
            assert_eq!(log.len(), settled);
        }

        toggler.join().unwrap();
    });
}

#[test]
fn concurrent_transitions_notify_each_listener_once_per_transition() {
    const THREADS: usize = 4;
    const LISTENERS: usize = 16;

    with_watchdog(|| {
        let reporter = Arc::new(Reporter::new());
        let notifications = Arc::new(AtomicUsize::new(0));

        for _ in 0..LISTENERS {
            let notifications = Arc::clone(&notifications);
            reporter
                .add_active_listener(move |_: bool| {
                    notifications.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                })
                .unwrap();
        }

        // Every thread tries to switch tracking on; exactly one of them wins.
        let threads = (0..THREADS)
            .map(|_| {
                let reporter = Arc::clone(&reporter);
                thread::spawn(move || reporter.set_active(true).unwrap())
            })
            .collect::<Vec<_>>();

        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(notifications.load(Ordering::Relaxed), LISTENERS);
    });
}

#[test]
fn gate_shared_between_threads_settles_inactive() {
    const THREADS: usize = 6;
    const ITERATIONS: usize = 200;

    with_watchdog(|| {
        let reporter = Arc::new(Reporter::new());
        let gate = Arc::new(TrackingGate::new(Arc::clone(&reporter)));
        let log = CallLog::new();
        reporter.add_active_listener(recording_listener(&log)).unwrap();

        let threads = (0..THREADS)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || {
                    for _ in 0..ITERATIONS {
                        let _consumer = gate.attach().unwrap();
                        thread::yield_now();
                    }
                })
            })
            .collect::<Vec<_>>();

        for thread in threads {
            thread.join().unwrap();
        }

        let calls = log.calls();
        assert_alternates(&calls);
        assert_eq!(calls.last(), Some(&false));
        assert!(!reporter.is_active());
        assert_eq!(gate.consumers(), 0);
    });
}

#[test]
fn close_races_with_registration() {
    const THREADS: usize = 4;

    with_watchdog(|| {
        let reporter = Arc::new(Reporter::new());
        let accepted = Arc::new(AtomicUsize::new(0));

        let threads = (0..THREADS)
            .map(|_| {
                let reporter = Arc::clone(&reporter);
                let accepted = Arc::clone(&accepted);
                thread::spawn(move || {
                    while reporter.add_active_listener(|_: bool| Ok(())).is_ok() {
                        accepted.fetch_add(1, Ordering::Relaxed);
                        thread::yield_now();
                    }
                })
            })
            .collect::<Vec<_>>();

        while accepted.load(Ordering::Relaxed) < THREADS {
            thread::yield_now();
        }
        reporter.close();

        for thread in threads {
            thread.join().unwrap();
        }

        // Nothing can sneak in after teardown.
        assert_eq!(reporter.listener_count(), 0);
    });
}
