//! Mount tables and filesystem usage.
//!
//! /proc/mounts and /etc/fstab share the six-column fstab format; the
//! live table has no comments, fstab may. Usage numbers come from
//! statvfs on the mount point.

use std::collections::HashSet;
use std::ffi::CString;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use pv_common::{Error, Result};

/// One row of a mount table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountEntry {
    pub source: String,
    pub target: String,
    pub fstype: String,
    pub options: String,
    pub dump: u32,
    pub pass: u32,
}

/// Capacity and free space for a mounted filesystem.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MountUsage {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
}

/// Read the live mount table.
pub fn mounts() -> Result<Vec<MountEntry>> {
    mounts_at(Path::new("/proc"))
}

/// Read mounts from a specific proc root (for testing).
pub fn mounts_at(proc_root: &Path) -> Result<Vec<MountEntry>> {
    let content = std::fs::read_to_string(proc_root.join("mounts"))?;
    Ok(parse_mounts_content(&content))
}

/// Read the static mount configuration.
pub fn fstab() -> Result<Vec<MountEntry>> {
    fstab_at(Path::new("/etc/fstab"))
}

/// Read a specific fstab-format file (for testing).
pub fn fstab_at(path: &Path) -> Result<Vec<MountEntry>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_mounts_content(&content))
}

/// Parse fstab-format content (for testing). Comments and blank lines
/// are skipped; rows need at least the four leading columns.
pub fn parse_mounts_content(content: &str) -> Vec<MountEntry> {
    let mut entries = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            warn!(fields = fields.len(), "skipping short mount table row");
            continue;
        }
        entries.push(MountEntry {
            source: fields[0].to_string(),
            target: fields[1].to_string(),
            fstype: fields[2].to_string(),
            options: fields[3].to_string(),
            dump: fields.get(4).and_then(|f| f.parse().ok()).unwrap_or(0),
            pass: fields.get(5).and_then(|f| f.parse().ok()).unwrap_or(0),
        });
    }
    entries
}

/// Configured filesystems whose mount point is not currently mounted.
///
/// Swap and usbfs entries never appear in the live table under their
/// fstab form and are excluded up front.
pub fn fstab_not_mounted() -> Result<Vec<MountEntry>> {
    let configured = fstab()?;
    let live = mounts()?;
    Ok(not_mounted(&configured, &live))
}

/// The comparison behind [`fstab_not_mounted`], on explicit tables
/// (for testing). Matching is by mount point only; the same filesystem
/// is routinely named differently in fstab (UUID=, LABEL=) and in the
/// live table (/dev/...).
pub fn not_mounted(configured: &[MountEntry], live: &[MountEntry]) -> Vec<MountEntry> {
    let mounted_targets: HashSet<&str> = live.iter().map(|m| m.target.as_str()).collect();
    configured
        .iter()
        .filter(|entry| entry.fstype != "swap" && entry.fstype != "usbfs")
        .filter(|entry| !mounted_targets.contains(entry.target.as_str()))
        .cloned()
        .collect()
}

/// Query filesystem usage for a mount point.
pub fn mount_usage(path: &str) -> Result<MountUsage> {
    let c_path = CString::new(path).map_err(|_| Error::Statvfs {
        path: path.to_string(),
    })?;
    let mut stats: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stats) };
    if rc != 0 {
        return Err(Error::Statvfs {
            path: path.to_string(),
        });
    }

    let block = stats.f_frsize as u64;
    Ok(MountUsage {
        total_bytes: block * stats.f_blocks as u64,
        free_bytes: block * stats.f_bfree as u64,
        available_bytes: block * stats.f_bavail as u64,
    })
}
