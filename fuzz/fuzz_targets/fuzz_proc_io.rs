//! Fuzz target for /proc/[pid]/io parsing.
//!
//! Tests that `parse_io_content` handles arbitrary input without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pv_core::proc::parse_io_content;

fuzz_target!(|data: &str| {
    let _ = parse_io_content(data);
});
