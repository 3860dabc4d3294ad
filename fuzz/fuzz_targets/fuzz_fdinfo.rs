//! Fuzz target for /proc/[pid]/fdinfo parsing.
//!
//! Tests that `parse_fdinfo_content` handles arbitrary input without
//! panicking. Unknown keys and malformed values must be ignored.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pv_core::proc::parse_fdinfo_content;

fuzz_target!(|data: &str| {
    let _ = parse_fdinfo_content(data);
});
