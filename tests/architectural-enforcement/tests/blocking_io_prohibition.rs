//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async functions never use blocking I/O.
//! **Acceptable**: synchronous functions that run before the session
//! starts (config file loading).

use architectural_enforcement::{report, scan};

const BLOCKING: &[&str] = &[
    "std::fs::",
    "std::net::",
    "reqwest::blocking",
    "futures::executor::block_on",
    "Handle::current().block_on",
];

#[test]
fn test_no_blocking_io_in_async_code() {
    let violations = scan(|file, idx, code| {
        BLOCKING.iter().any(|pattern| code.contains(pattern))
            && file.enclosing_fn(idx).map_or(true, |(is_async, _)| is_async)
    });

    report(
        "blocking I/O inside async code (use tokio::fs / tokio::net / async reqwest)",
        &violations,
    );
}
