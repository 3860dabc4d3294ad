//! Routing and neighbor tables.
//!
//! /proc/net/route and /proc/net/arp carry a header line; /proc/net/ipv6_route
//! does not. Route masks are full network masks, not prefix lengths, matching
//! the kernel rendering. The same skip-short-rows policy as the socket tables
//! applies.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use pv_common::{Error, Result};

use super::addr::{decode_addr, is_hex_token, FamilyHint};

const ROUTE_FIELDS: usize = 11;
const ROUTE6_FIELDS: usize = 10;
const ARP_FIELDS: usize = 6;

/// One IPv4 route from /proc/net/route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEntry {
    pub iface: String,
    pub destination: String,
    pub gateway: String,
    pub flags: u16,
    pub ref_count: u32,
    pub use_count: u32,
    pub metric: u32,
    /// Dotted-quad network mask, as the kernel renders it.
    pub mask: String,
    pub mtu: u32,
    pub window: u32,
    pub irtt: u32,
}

/// One IPv6 route from /proc/net/ipv6_route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ipv6RouteEntry {
    pub destination: String,
    pub dest_prefix: u8,
    pub source: String,
    pub src_prefix: u8,
    pub next_hop: String,
    pub metric: u32,
    pub ref_count: u32,
    pub use_count: u32,
    pub flags: u32,
    pub iface: String,
}

/// One neighbor from /proc/net/arp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArpEntry {
    pub ip: String,
    pub hw_type: u16,
    pub flags: u16,
    pub mac: String,
    pub mask: String,
    pub device: String,
}

/// Read the IPv4 routing table.
pub fn routes() -> Result<Vec<RouteEntry>> {
    routes_at(Path::new("/proc"))
}

/// Read routes from a specific proc root (for testing).
pub fn routes_at(proc_root: &Path) -> Result<Vec<RouteEntry>> {
    let content = std::fs::read_to_string(proc_root.join("net").join("route"))?;
    parse_route_content(&content)
}

/// Parse /proc/net/route content (for testing).
pub fn parse_route_content(content: &str) -> Result<Vec<RouteEntry>> {
    let mut entries = Vec::new();
    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < ROUTE_FIELDS {
            warn!(fields = fields.len(), "skipping short route table row");
            continue;
        }
        entries.push(RouteEntry {
            iface: fields[0].to_string(),
            destination: decode_addr(fields[1], FamilyHint::V4)?.to_string(),
            gateway: decode_addr(fields[2], FamilyHint::V4)?.to_string(),
            flags: parse_hex_u16(fields[3], "flags")?,
            ref_count: parse_dec(fields[4], "refcnt")?,
            use_count: parse_dec(fields[5], "use")?,
            metric: parse_dec(fields[6], "metric")?,
            mask: decode_addr(fields[7], FamilyHint::V4)?.to_string(),
            mtu: parse_dec(fields[8], "mtu")?,
            window: parse_dec(fields[9], "window")?,
            irtt: parse_dec(fields[10], "irtt")?,
        });
    }
    Ok(entries)
}

/// Read the IPv6 routing table. Absent when IPv6 is disabled, which
/// yields an empty set rather than an error.
pub fn routes_v6() -> Result<Vec<Ipv6RouteEntry>> {
    routes_v6_at(Path::new("/proc"))
}

pub fn routes_v6_at(proc_root: &Path) -> Result<Vec<Ipv6RouteEntry>> {
    let path = proc_root.join("net").join("ipv6_route");
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    parse_ipv6_route_content(&content)
}

/// Parse /proc/net/ipv6_route content (for testing). This table has no
/// header line. Numeric columns are hex apart from refcnt and use, which
/// the kernel prints in decimal.
pub fn parse_ipv6_route_content(content: &str) -> Result<Vec<Ipv6RouteEntry>> {
    let mut entries = Vec::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < ROUTE6_FIELDS {
            warn!(fields = fields.len(), "skipping short ipv6_route row");
            continue;
        }
        entries.push(Ipv6RouteEntry {
            destination: decode_addr(fields[0], FamilyHint::V6)?.to_string(),
            dest_prefix: parse_hex_u8(fields[1], "dst_prefix")?,
            source: decode_addr(fields[2], FamilyHint::V6)?.to_string(),
            src_prefix: parse_hex_u8(fields[3], "src_prefix")?,
            next_hop: decode_addr(fields[4], FamilyHint::V6)?.to_string(),
            metric: parse_hex_u32(fields[5], "metric")?,
            ref_count: parse_dec(fields[6], "refcnt")?,
            use_count: parse_dec(fields[7], "use")?,
            flags: parse_hex_u32(fields[8], "flags")?,
            iface: fields[9].to_string(),
        });
    }
    Ok(entries)
}

/// Read the neighbor table.
pub fn neighbors() -> Result<Vec<ArpEntry>> {
    neighbors_at(Path::new("/proc"))
}

pub fn neighbors_at(proc_root: &Path) -> Result<Vec<ArpEntry>> {
    let content = std::fs::read_to_string(proc_root.join("net").join("arp"))?;
    parse_arp_content(&content)
}

/// Parse /proc/net/arp content (for testing). Unlike the socket tables,
/// the IP column is already dotted text.
pub fn parse_arp_content(content: &str) -> Result<Vec<ArpEntry>> {
    let mut entries = Vec::new();
    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < ARP_FIELDS {
            warn!(fields = fields.len(), "skipping short arp table row");
            continue;
        }
        entries.push(ArpEntry {
            ip: fields[0].to_string(),
            hw_type: parse_hex_u16(fields[1], "hw_type")?,
            flags: parse_hex_u16(fields[2], "flags")?,
            mac: fields[3].to_string(),
            mask: fields[4].to_string(),
            device: fields[5].to_string(),
        });
    }
    Ok(entries)
}

/// Iface and gateway of the first all-destinations route naming a next
/// hop, if any.
pub fn default_gateway() -> Result<Option<(String, String)>> {
    default_gateway_at(Path::new("/proc"))
}

pub fn default_gateway_at(proc_root: &Path) -> Result<Option<(String, String)>> {
    let entries = routes_at(proc_root)?;
    Ok(pick_default_gateway(&entries))
}

// An on-link default route renders its gateway column as 0.0.0.0 and is
// skipped.
fn pick_default_gateway(entries: &[RouteEntry]) -> Option<(String, String)> {
    entries
        .iter()
        .find(|route| {
            route.destination == "0.0.0.0"
                && route.mask == "0.0.0.0"
                && route.gateway != "0.0.0.0"
        })
        .map(|route| (route.iface.clone(), route.gateway.clone()))
}

fn parse_hex_u16(token: &str, field: &'static str) -> Result<u16> {
    let digits = token.strip_prefix("0x").unwrap_or(token);
    if !is_hex_token(digits) {
        return Err(field_error(field, token));
    }
    u16::from_str_radix(digits, 16).map_err(|_| field_error(field, token))
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

fn parse_dec(token: &str, field: &'static str) -> Result<u32> {
    token.parse().map_err(|_| field_error(field, token))
}

fn field_error(field: &'static str, value: &str) -> Error {
    Error::FieldDecode {
        field: field.to_string(),
        value: value.to_string(),
    }
}
