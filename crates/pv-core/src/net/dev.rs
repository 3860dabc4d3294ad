//! Interface counters and addresses.
//!
//! /proc/net/dev carries two header lines and glues the interface name to
//! its counters with a colon. /proc/net/if_inet6 has no header and renders
//! each address as one 32-digit hex token.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use pv_common::{Error, Result};

use super::addr::{decode_addr, is_hex_token, FamilyHint};

const DEV_COUNTERS: usize = 16;
const IF_INET6_FIELDS: usize = 6;

/// Per-interface counters from /proc/net/dev.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub name: String,
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errors: u64,
    pub rx_dropped: u64,
    pub rx_fifo: u64,
    pub rx_frame: u64,
    pub rx_compressed: u64,
    pub rx_multicast: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
    pub tx_dropped: u64,
    pub tx_fifo: u64,
    pub tx_collisions: u64,
    pub tx_carrier: u64,
    pub tx_compressed: u64,
}

/// One address row from /proc/net/if_inet6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inet6Addr {
    pub addr: String,
    pub if_index: u32,
    pub prefix_len: u8,
    pub scope: u8,
    pub flags: u8,
    pub name: String,
}

/// An interface with its counters and configured IPv6 addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceInfo {
    #[serde(flatten)]
    pub stats: InterfaceStats,
    /// Addresses as `addr/prefix`.
    pub ipv6_addrs: Vec<String>,
    /// Backed by /sys/devices/virtual/net rather than hardware.
    pub is_virtual: bool,
}

/// Read interface counters from the live /proc tree.
pub fn interface_stats() -> Result<Vec<InterfaceStats>> {
    interface_stats_at(Path::new("/proc"))
}

pub fn interface_stats_at(proc_root: &Path) -> Result<Vec<InterfaceStats>> {
    let content = std::fs::read_to_string(proc_root.join("net").join("dev"))?;
    parse_dev_content(&content)
}

/// Parse /proc/net/dev content (for testing). The first two lines are
/// column headers.
pub fn parse_dev_content(content: &str) -> Result<Vec<InterfaceStats>> {
    let mut stats = Vec::new();
    for line in content.lines().skip(2) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, counters)) = line.split_once(':') else {
            warn!("skipping interface row without a name separator");
            continue;
        };
        let fields: Vec<&str> = counters.split_whitespace().collect();
        if fields.len() < DEV_COUNTERS {
            warn!(
                interface = name.trim(),
                fields = fields.len(),
                "skipping short interface counter row"
            );
            continue;
        }
        let mut values = [0u64; DEV_COUNTERS];
        for (value, token) in values.iter_mut().zip(&fields) {
            *value = token.parse().map_err(|_| Error::FieldDecode {
                field: "interface counter".to_string(),
                value: (*token).to_string(),
            })?;
        }
        stats.push(InterfaceStats {
            name: name.trim().to_string(),
            rx_bytes: values[0],
            rx_packets: values[1],
            rx_errors: values[2],
            rx_dropped: values[3],
            rx_fifo: values[4],
            rx_frame: values[5],
            rx_compressed: values[6],
            rx_multicast: values[7],
            tx_bytes: values[8],
            tx_packets: values[9],
            tx_errors: values[10],
            tx_dropped: values[11],
            tx_fifo: values[12],
            tx_collisions: values[13],
            tx_carrier: values[14],
            tx_compressed: values[15],
        });
    }
    Ok(stats)
}

/// Read configured IPv6 addresses. An absent table means IPv6 is
/// disabled and yields an empty set.
pub fn inet6_addrs() -> Result<Vec<Inet6Addr>> {
    inet6_addrs_at(Path::new("/proc"))
}

pub fn inet6_addrs_at(proc_root: &Path) -> Result<Vec<Inet6Addr>> {
    let path = proc_root.join("net").join("if_inet6");
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    parse_if_inet6_content(&content)
}

/// Parse /proc/net/if_inet6 content (for testing). No header line.
pub fn parse_if_inet6_content(content: &str) -> Result<Vec<Inet6Addr>> {
    let mut addrs = Vec::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < IF_INET6_FIELDS {
            warn!(fields = fields.len(), "skipping short if_inet6 row");
            continue;
        }
        addrs.push(Inet6Addr {
            addr: decode_addr(fields[0], FamilyHint::V6)?.to_string(),
            if_index: parse_hex_u32(fields[1], "if_index")?,
            prefix_len: parse_hex_u8(fields[2], "prefix_len")?,
            scope: parse_hex_u8(fields[3], "scope")?,
            flags: parse_hex_u8(fields[4], "flags")?,
            name: fields[5].to_string(),
        });
    }
    Ok(addrs)
}

/// Interfaces with counters, IPv6 addresses, and the virtual-device flag.
pub fn interfaces() -> Result<Vec<InterfaceInfo>> {
    interfaces_at(Path::new("/proc"), Path::new("/sys"))
}

/// Build interface records from specific proc and sys roots (for testing).
pub fn interfaces_at(proc_root: &Path, sys_root: &Path) -> Result<Vec<InterfaceInfo>> {
    let stats = interface_stats_at(proc_root)?;
    let addrs = inet6_addrs_at(proc_root)?;
    let virtual_dir = sys_root.join("devices").join("virtual").join("net");

    Ok(stats
        .into_iter()
        .map(|stats| {
            let ipv6_addrs = addrs
                .iter()
                .filter(|a| a.name == stats.name)
                .map(|a| format!("{}/{}", a.addr, a.prefix_len))
                .collect();
            let is_virtual = virtual_dir.join(&stats.name).exists();
            InterfaceInfo {
                stats,
                ipv6_addrs,
                is_virtual,
            }
        })
        .collect())
}

fn parse_hex_u8(token: &str, field: &'static str) -> Result<u8> {
    if !is_hex_token(token) {
        return Err(field_error(field, token));
    }
    u8::from_str_radix(token, 16).map_err(|_| field_error(field, token))
}

fn parse_hex_u32(token: &str, field: &'static str) -> Result<u32> {
    if !is_hex_token(token) {
        return Err(field_error(field, token));
    }
    u32::from_str_radix(token, 16).map_err(|_| field_error(field, token))
}

fn field_error(field: &'static str, value: &str) -> Error {
    Error::FieldDecode {
        field: field.to_string(),
        value: value.to_string(),
    }
}
