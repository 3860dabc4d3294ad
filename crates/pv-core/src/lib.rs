//! pv-core - typed views over Linux kernel state tables.
//!
//! The kernel publishes live system state as text pseudo-files under /proc
//! and /sys. This crate decodes those tables into typed records:
//!
//! - [`net`] - socket tables, routes, neighbors, interfaces, and the
//!   socket-to-process correlation index
//! - [`proc`] - process enumeration, status, and descriptor tables
//! - [`disk`] - block device attributes, mount tables, and usage
//!
//! Every reader re-reads the live tables on each call; nothing is cached
//! between calls. Readers take the table root as a path so tests can point
//! them at a mock tree.

pub mod disk;
pub mod exit_codes;
pub mod logging;
pub mod net;
pub mod proc;

pub use pv_common::{Error, Result};
