//! Fuzz target for socket table parsing.
//!
//! Tests that /proc/net/{tcp,tcp6} parsing handles arbitrary input without
//! panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pv_core::net::{parse_socket_table_content, SocketTable};

fuzz_target!(|data: &str| {
    // Test IPv4 parsing
    let _ = parse_socket_table_content(SocketTable::Tcp4, data);

    // Test IPv6 parsing
    let _ = parse_socket_table_content(SocketTable::Tcp6, data);
});
