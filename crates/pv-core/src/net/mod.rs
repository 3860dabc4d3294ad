//! Network state decoded from the kernel's /proc/net tables.
//!
//! The kernel renders live socket, route, and neighbor state as text
//! tables. This module decodes them into typed records and can attribute
//! sockets to owning processes by joining socket inode numbers against
//! every process's descriptor table.
//!
//! Every read is a fresh snapshot: tables are re-read per call, sources
//! are decoded in selector order, and nothing is cached across calls.

pub mod addr;
pub mod dev;
pub mod resolve;
pub mod routes;
pub mod state;

pub use addr::{decode_addr, decode_endpoint, encode_addr, FamilyHint};
pub use dev::{interface_stats, interfaces, interfaces_at, Inet6Addr, InterfaceInfo, InterfaceStats};
pub use resolve::NameResolver;
pub use routes::{
    default_gateway, default_gateway_at, neighbors, neighbors_at, routes, routes_at, routes_v6,
    routes_v6_at, ArpEntry, Ipv6RouteEntry, RouteEntry,
};
pub use state::{TcpState, TimerKind};

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pv_common::{Error, Result};

use crate::proc;

/// Owner shown for sockets no user-space descriptor refers to.
pub const KERNEL_OWNER: &str = "kernel";

/// Fields a socket table row must carry to decode.
const SOCKET_ROW_FIELDS: usize = 12;

/// Address family of a socket table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpFamily {
    #[serde(rename = "ipv4")]
    V4,
    #[serde(rename = "ipv6")]
    V6,
}

/// Transport protocol of a socket table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proto {
    Tcp,
    Udp,
    Udplite,
}

impl std::fmt::Display for Proto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Proto::Tcp => write!(f, "tcp"),
            Proto::Udp => write!(f, "udp"),
            Proto::Udplite => write!(f, "udplite"),
        }
    }
}

/// One socket table source under /proc/net.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketTable {
    Tcp4,
    Tcp6,
    Udp4,
    Udp6,
    Udplite4,
    Udplite6,
}

impl SocketTable {
    /// File name of this table under /proc/net.
    pub fn file_name(&self) -> &'static str {
        match self {
            SocketTable::Tcp4 => "tcp",
            SocketTable::Tcp6 => "tcp6",
            SocketTable::Udp4 => "udp",
            SocketTable::Udp6 => "udp6",
            SocketTable::Udplite4 => "udplite",
            SocketTable::Udplite6 => "udplite6",
        }
    }

    pub fn proto(&self) -> Proto {
        match self {
            SocketTable::Tcp4 | SocketTable::Tcp6 => Proto::Tcp,
            SocketTable::Udp4 | SocketTable::Udp6 => Proto::Udp,
            SocketTable::Udplite4 | SocketTable::Udplite6 => Proto::Udplite,
        }
    }

    pub fn family(&self) -> IpFamily {
        match self {
            SocketTable::Tcp4 | SocketTable::Udp4 | SocketTable::Udplite4 => IpFamily::V4,
            SocketTable::Tcp6 | SocketTable::Udp6 | SocketTable::Udplite6 => IpFamily::V6,
        }
    }

    fn family_hint(&self) -> FamilyHint {
        match self.family() {
            IpFamily::V4 => FamilyHint::V4,
            IpFamily::V6 => FamilyHint::V6,
        }
    }
}

/// Caller-facing socket table selector.
///
/// Each selector expands to a fixed, ordered list of table sources;
/// output concatenates sources in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    All,
    Inet,
    Inet4,
    Inet6,
    Tcp,
    Tcp4,
    Tcp6,
    Udp,
    Udp4,
    Udp6,
}

impl Selector {
    /// The table sources this selector covers, in output order.
    pub fn tables(&self) -> &'static [SocketTable] {
        use SocketTable::*;
        match self {
            Selector::All | Selector::Inet => &[Tcp4, Tcp6, Udp4, Udp6, Udplite4, Udplite6],
            Selector::Inet4 => &[Tcp4, Udp4, Udplite4],
            Selector::Inet6 => &[Tcp6, Udp6, Udplite6],
            Selector::Tcp => &[Tcp4, Tcp6],
            Selector::Tcp4 => &[Tcp4],
            Selector::Tcp6 => &[Tcp6],
            Selector::Udp => &[Udp4, Udp6, Udplite4, Udplite6],
            Selector::Udp4 => &[Udp4, Udplite4],
            Selector::Udp6 => &[Udp6, Udplite6],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Selector::All => "all",
            Selector::Inet => "inet",
            Selector::Inet4 => "inet4",
            Selector::Inet6 => "inet6",
            Selector::Tcp => "tcp",
            Selector::Tcp4 => "tcp4",
            Selector::Tcp6 => "tcp6",
            Selector::Udp => "udp",
            Selector::Udp4 => "udp4",
            Selector::Udp6 => "udp6",
        }
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Selector::All),
            "inet" => Ok(Selector::Inet),
            "inet4" => Ok(Selector::Inet4),
            "inet6" => Ok(Selector::Inet6),
            "tcp" => Ok(Selector::Tcp),
            "tcp4" => Ok(Selector::Tcp4),
            "tcp6" => Ok(Selector::Tcp6),
            "udp" => Ok(Selector::Udp),
            "udp4" => Ok(Selector::Udp4),
            "udp6" => Ok(Selector::Udp6),
            other => Err(Error::Selector(other.to_string())),
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Enrichment options for a connection scan.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    /// Reverse-resolve local and remote addresses.
    pub resolve_dns: bool,
    /// Replace numeric owner uids with usernames where resolvable.
    pub resolve_user: bool,
    /// Attribute socket inodes to owning processes.
    pub resolve_process: bool,
    /// Keep only records whose owner matches, compared after uid resolution.
    pub owner_filter: Option<String>,
}

/// One decoded socket table row.
///
/// Addresses are kept in presentation form so DNS enrichment can replace
/// them in place without changing the record shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketConnection {
    pub family: IpFamily,
    pub proto: Proto,
    pub slot: u32,
    pub local_addr: String,
    pub local_port: u16,
    pub remote_addr: String,
    pub remote_port: u16,
    pub state: TcpState,
    pub tx_queue: u64,
    pub rx_queue: u64,
    pub timer: TimerKind,
    pub timer_expiry_ticks: u64,
    pub retransmits: u64,
    /// Numeric uid, or a username after user resolution.
    pub owner: String,
    pub inode: u64,
    /// Owning process as `pid/comm`, or [`KERNEL_OWNER`]; present only
    /// when process resolution was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    pub ref_count: u32,
    pub mem_addr: String,
}

/// Read connections from the live /proc tree.
pub fn connections(
    selector: Selector,
    options: &ConnectionOptions,
) -> Result<Vec<SocketConnection>> {
    connections_at(Path::new("/proc"), selector, options)
}

/// Read connections from a specific proc root (for testing with a mock tree).
pub fn connections_at(
    proc_root: &Path,
    selector: Selector,
    options: &ConnectionOptions,
) -> Result<Vec<SocketConnection>> {
    let mut resolver = NameResolver::new();
    let mut index: Option<HashMap<u64, String>> = None;
    let mut records = Vec::new();

    for table in selector.tables() {
        let path = proc_root.join("net").join(table.file_name());
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "socket table absent, skipping");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        for mut record in parse_socket_table_content(*table, &content)? {
            if options.resolve_dns {
                record.local_addr = resolve_addr_string(&mut resolver, &record.local_addr);
                record.remote_addr = resolve_addr_string(&mut resolver, &record.remote_addr);
            }
            if options.resolve_user {
                if let Ok(uid) = record.owner.parse::<u32>() {
                    record.owner = resolver.username(uid);
                }
            }
            if let Some(filter) = &options.owner_filter {
                if record.owner != *filter {
                    continue;
                }
            }
            if options.resolve_process {
                if index.is_none() {
                    index = Some(build_socket_index(proc_root)?);
                }
                if let Some(map) = &index {
                    record.process = Some(
                        map.get(&record.inode)
                            .cloned()
                            .unwrap_or_else(|| KERNEL_OWNER.to_string()),
                    );
                }
            }
            records.push(record);
        }
    }

    Ok(records)
}

/// Sockets in the LISTEN state under the given selector.
pub fn listening(selector: Selector, options: &ConnectionOptions) -> Result<Vec<SocketConnection>> {
    listening_at(Path::new("/proc"), selector, options)
}

/// Listening sockets from a specific proc root (for testing).
pub fn listening_at(
    proc_root: &Path,
    selector: Selector,
    options: &ConnectionOptions,
) -> Result<Vec<SocketConnection>> {
    let records = connections_at(proc_root, selector, options)?;
    Ok(records
        .into_iter()
        .filter(|record| record.state == TcpState::Listen)
        .collect())
}

/// Whether the kernel exposes IPv6 socket tables.
pub fn ipv6_enabled() -> bool {
    ipv6_enabled_at(Path::new("/proc"))
}

pub fn ipv6_enabled_at(proc_root: &Path) -> bool {
    proc_root.join("net").join("tcp6").exists()
}

/// Parse the content of one socket table (for testing).
///
/// The header line is discarded. Rows with too few fields are logged and
/// skipped; rows with the full field count that fail to decode are a hard
/// error, since they signal an unsupported table format rather than a
/// torn mid-write read.
pub fn parse_socket_table_content(
    table: SocketTable,
    content: &str,
) -> Result<Vec<SocketConnection>> {
    let mut records = Vec::new();
    for line in content.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < SOCKET_ROW_FIELDS {
            warn!(
                table = table.file_name(),
                fields = fields.len(),
                "skipping short socket table row"
            );
            continue;
        }
        records.push(decode_row(table, &fields)?);
    }
    Ok(records)
}

fn decode_row(table: SocketTable, fields: &[&str]) -> Result<SocketConnection> {
    let hint = table.family_hint();
    let slot = parse_slot(fields[0])?;
    let (local_addr, local_port) = decode_endpoint(fields[1], hint)?;
    let (remote_addr, remote_port) = decode_endpoint(fields[2], hint)?;
    let state = TcpState::from_code(fields[3])?;
    let (tx_queue, rx_queue) = split_hex_pair(fields[4], "tx_queue:rx_queue")?;
    let (timer_code, timer_expiry_ticks) = split_hex_pair(fields[5], "tr:tm->when")?;
    let timer_code = u8::try_from(timer_code).map_err(|_| field_error("tr:tm->when", fields[5]))?;
    let timer = TimerKind::from_code(timer_code)?;
    let retransmits = parse_hex(fields[6], "retrnsmt")?;
    let uid: u32 = parse_dec(fields[7], "uid")?;
    // fields[8] is the timeout column; it carries nothing we report.
    let inode: u64 = parse_dec(fields[9], "inode")?;
    let ref_count: u32 = parse_dec(fields[10], "ref_count")?;
    let mem_addr = fields[11].to_string();

    Ok(SocketConnection {
        family: table.family(),
        proto: table.proto(),
        slot,
        local_addr: local_addr.to_string(),
        local_port,
        remote_addr: remote_addr.to_string(),
        remote_port,
        state,
        tx_queue,
        rx_queue,
        timer,
        timer_expiry_ticks,
        retransmits,
        owner: uid.to_string(),
        inode,
        process: None,
        ref_count,
        mem_addr,
    })
}

/// Build the socket inode to owning-process index.
///
/// Scans every process's descriptor table. Processes that exit mid-scan
/// contribute nothing. Pids are visited in ascending order and the first
/// holder of an inode wins, so two builds over the same process set agree.
pub fn build_socket_index(proc_root: &Path) -> Result<HashMap<u64, String>> {
    let mut index = HashMap::new();
    let mut pids = proc::list_pids_at(proc_root)?;
    pids.sort_unstable();

    for pid in pids {
        let inodes = match proc::socket_inodes_at(proc_root, pid) {
            Ok(inodes) => inodes,
            Err(err) => {
                debug!(pid, error = %err, "process dropped out during index build");
                continue;
            }
        };
        if inodes.is_empty() {
            continue;
        }
        let name = process_display_name(proc_root, pid);
        for inode in inodes {
            index.entry(inode).or_insert_with(|| name.clone());
        }
    }

    Ok(index)
}

fn process_display_name(proc_root: &Path, pid: u32) -> String {
    match proc::comm_at(proc_root, pid) {
        Ok(comm) => format!("{pid}/{comm}"),
        Err(_) => pid.to_string(),
    }
}

fn resolve_addr_string(resolver: &mut NameResolver, literal: &str) -> String {
    match literal.parse::<std::net::IpAddr>() {
        Ok(ip) => resolver.hostname(ip),
        Err(_) => literal.to_string(),
    }
}

fn parse_slot(token: &str) -> Result<u32> {
    token
        .trim_end_matches(':')
        .parse()
        .map_err(|_| field_error("sl", token))
}

fn split_hex_pair(token: &str, field: &'static str) -> Result<(u64, u64)> {
    let (left, right) = token
        .split_once(':')
        .ok_or_else(|| field_error(field, token))?;
    if !addr::is_hex_token(left) || !addr::is_hex_token(right) {
        return Err(field_error(field, token));
    }
    let left = u64::from_str_radix(left, 16).map_err(|_| field_error(field, token))?;
    let right = u64::from_str_radix(right, 16).map_err(|_| field_error(field, token))?;
    Ok((left, right))
}

fn parse_hex(token: &str, field: &'static str) -> Result<u64> {
    if !addr::is_hex_token(token) {
        return Err(field_error(field, token));
    }
    u64::from_str_radix(token, 16).map_err(|_| field_error(field, token))
}

fn parse_dec<T: FromStr>(token: &str, field: &'static str) -> Result<T> {
    token.parse().map_err(|_| field_error(field, token))
}

fn field_error(field: &'static str, value: &str) -> Error {
    Error::FieldDecode {
        field: field.to_string(),
        value: value.to_string(),
    }
}
