//! Integration Test: Panic Prohibition
//!
//! **Policy**: library and binary code propagate errors. Bad frames,
//! failed sends and refused credentials are values, never panics.

use architectural_enforcement::{report, scan};

const FORBIDDEN: &[&str] = &[
    ".unwrap()",
    ".expect(",
    "panic!(",
    "unreachable!(",
    "todo!(",
    "unimplemented!(",
];

#[test]
fn test_no_panicking_calls_in_production_code() {
    let violations = scan(|_, _, code| FORBIDDEN.iter().any(|pattern| code.contains(pattern)));

    report(
        "panicking calls in production code (return a Result or use a fallback)",
        &violations,
    );
}
