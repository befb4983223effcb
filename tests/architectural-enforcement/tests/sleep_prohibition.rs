//! Integration Test: Sleep Prohibition
//!
//! **Policy**: production code waits on I/O, timers with a deadline, or
//! channels. It never sleeps to poll or to paper over ordering.
//! **Exception**: the reconnect backoff delay.

use architectural_enforcement::{report, scan, SourceFile};

fn is_backoff_context(file: &SourceFile, idx: usize) -> bool {
    let context = file.context(idx, 25, 3);
    context.contains("reconnect") || context.contains("backoff")
}

#[test]
fn test_no_sleep_in_production_code() {
    let violations = scan(|file, idx, code| {
        let sleeps = code.contains("::sleep(") || code.contains(".sleep(") || code.contains(" sleep(");
        sleeps && !is_backoff_context(file, idx)
    });

    report(
        "sleep calls in production code (use sleep_until with a deadline, a channel, or Notify)",
        &violations,
    );
}

#[test]
fn test_no_thread_sleep_anywhere_in_production_code() {
    let violations = scan(|_, _, code| code.contains("thread::sleep"));
    report("thread::sleep blocks a runtime worker", &violations);
}
