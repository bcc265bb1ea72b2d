//! Concurrency tests: one writer per counter, many readers.

use manifold_atomic::prelude::*;
use std::sync::Arc;
use std::thread;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn test_independent_writers_do_not_interfere() -> TestResult {
    let counters = Arc::new(CycleCounters::new());
    let mut handles = vec![];

    for (kind, cycles) in [
        (ProfileKind::Pressure, 10_000u64),
        (ProfileKind::Fluid, 120),
        (ProfileKind::Chamber, 130),
    ] {
        let counters = Arc::clone(&counters);
        handles.push(thread::spawn(move || {
            for _ in 0..cycles {
                counters.get(kind).increment();
            }
        }));
    }

    for handle in handles {
        handle.join().map_err(|_| "writer thread panicked")?;
    }

    let snapshot = counters.snapshot();
    assert_eq!(snapshot.pressure.current, 10_000);
    assert_eq!(snapshot.fluid.current, 120);
    assert_eq!(snapshot.chamber.current, 130);
    Ok(())
}

#[test]
fn test_readers_observe_monotonic_values() -> TestResult {
    let counter = Arc::new(CycleCounter::new(ProfileKind::Pressure));

    let writer = {
        let counter = Arc::clone(&counter);
        thread::spawn(move || {
            for _ in 0..50_000 {
                counter.increment();
            }
        })
    };

    let reader = {
        let counter = Arc::clone(&counter);
        thread::spawn(move || {
            let mut last = 0;
            for _ in 0..50_000 {
                let now = counter.current();
                assert!(now >= last, "counter went backwards: {last} -> {now}");
                last = now;
            }
        })
    };

    writer.join().map_err(|_| "writer thread panicked")?;
    reader.join().map_err(|_| "reader thread panicked")?;
    assert_eq!(counter.current(), 50_000);
    Ok(())
}
