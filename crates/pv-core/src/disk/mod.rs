//! Block device topology and attributes from /sys.
//!
//! Device names come from /sys/block; virtual devices (loop, ram, dm) are
//! the ones also listed under /sys/devices/virtual/block. Sizes are
//! reported by the kernel in 512-byte sectors regardless of the device's
//! logical block size.

pub mod mounts;

pub use mounts::{
    fstab, fstab_at, fstab_not_mounted, mount_usage, mounts, mounts_at, not_mounted,
    parse_mounts_content, MountEntry, MountUsage,
};

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use pv_common::{Error, Result};

const SECTOR_BYTES: u64 = 512;
const DISK_STAT_FIELDS: usize = 11;

/// Attributes of one block device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskInfo {
    pub name: String,
    /// Device number as `major:minor`.
    pub dev: String,
    pub size_bytes: u64,
    pub removable: bool,
    pub read_only: bool,
    pub rotational: bool,
    /// Active scheduler, absent on devices without a queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
    pub is_virtual: bool,
    /// Device-mapper target (LVM, crypt).
    pub is_dm: bool,
}

/// Cumulative I/O statistics from a device's stat file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskStats {
    pub reads_completed: u64,
    pub reads_merged: u64,
    pub sectors_read: u64,
    pub time_reading_ms: u64,
    pub writes_completed: u64,
    pub writes_merged: u64,
    pub sectors_written: u64,
    pub time_writing_ms: u64,
    pub io_in_progress: u64,
    pub time_io_ms: u64,
    pub time_io_weighted_ms: u64,
}

/// List block device names, ascending.
///
/// Optical drives with no medium report size zero and are excluded, since
/// every attribute read on them fails anyway.
pub fn list_disks() -> Result<Vec<String>> {
    list_disks_at(Path::new("/sys"))
}

/// List devices from a specific sys root (for testing with a mock tree).
pub fn list_disks_at(sys_root: &Path) -> Result<Vec<String>> {
    let block = sys_root.join("block");
    let mut names = Vec::new();
    for entry in std::fs::read_dir(&block)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_empty_optical(&block, &name) {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Devices backed by no hardware: loop, ram, and device-mapper nodes.
pub fn virtual_disks() -> Result<Vec<String>> {
    virtual_disks_at(Path::new("/sys"))
}

pub fn virtual_disks_at(sys_root: &Path) -> Result<Vec<String>> {
    let dir = sys_root.join("devices").join("virtual").join("block");
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut names = Vec::new();
    for entry in entries {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Hardware-backed devices: everything listed that is not virtual.
pub fn physical_disks() -> Result<Vec<String>> {
    physical_disks_at(Path::new("/sys"))
}

pub fn physical_disks_at(sys_root: &Path) -> Result<Vec<String>> {
    let all = list_disks_at(sys_root)?;
    let virtuals = virtual_disks_at(sys_root)?;
    Ok(all
        .into_iter()
        .filter(|name| !virtuals.contains(name))
        .collect())
}

/// Read the attributes of one block device.
pub fn disk_info(name: &str) -> Result<DiskInfo> {
    disk_info_at(Path::new("/sys"), name)
}

pub fn disk_info_at(sys_root: &Path, name: &str) -> Result<DiskInfo> {
    let device = sys_root.join("block").join(name);
    if !device.is_dir() {
        return Err(Error::DeviceNotFound(name.to_string()));
    }

    let sectors = read_u64_attr(&device.join("size"), "size")?;
    let scheduler = match std::fs::read_to_string(device.join("queue").join("scheduler")) {
        Ok(content) => parse_scheduler(&content),
        Err(_) => None,
    };

    Ok(DiskInfo {
        name: name.to_string(),
        dev: read_trimmed(&device.join("dev"))?,
        size_bytes: sectors * SECTOR_BYTES,
        removable: read_bool_attr(&device.join("removable"), "removable")?,
        read_only: read_bool_attr(&device.join("ro"), "ro")?,
        rotational: read_bool_attr(&device.join("queue").join("rotational"), "rotational")?,
        scheduler,
        is_virtual: sys_root
            .join("devices")
            .join("virtual")
            .join("block")
            .join(name)
            .exists(),
        is_dm: device.join("dm").is_dir(),
    })
}

/// Snapshot every listed device, skipping any that unplug mid-scan.
pub fn disks() -> Result<Vec<DiskInfo>> {
    disks_at(Path::new("/sys"))
}

pub fn disks_at(sys_root: &Path) -> Result<Vec<DiskInfo>> {
    let mut out = Vec::new();
    for name in list_disks_at(sys_root)? {
        match disk_info_at(sys_root, &name) {
            Ok(info) => out.push(info),
            Err(err) => debug!(device = %name, error = %err, "skipping device"),
        }
    }
    Ok(out)
}

/// Size of one partition of a device, in bytes.
pub fn partition_size(disk: &str, partition: &str) -> Result<u64> {
    partition_size_at(Path::new("/sys"), disk, partition)
}

pub fn partition_size_at(sys_root: &Path, disk: &str, partition: &str) -> Result<u64> {
    let dir = sys_root.join("block").join(disk).join(partition);
    if !dir.is_dir() {
        return Err(Error::DeviceNotFound(format!("{disk}/{partition}")));
    }
    Ok(read_u64_attr(&dir.join("size"), "size")? * SECTOR_BYTES)
}

/// Read a device's cumulative I/O statistics.
pub fn disk_stats(name: &str) -> Result<DiskStats> {
    disk_stats_at(Path::new("/sys"), name)
}

pub fn disk_stats_at(sys_root: &Path, name: &str) -> Result<DiskStats> {
    let path = sys_root.join("block").join(name).join("stat");
    if !path.is_file() {
        return Err(Error::DeviceNotFound(name.to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    parse_disk_stat_content(&content)
}

/// Parse a device stat file (for testing).
pub fn parse_disk_stat_content(content: &str) -> Result<DiskStats> {
    let fields: Vec<u64> = content
        .split_whitespace()
        .take(DISK_STAT_FIELDS)
        .map(|token| token.parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| Error::DeviceAttr {
            attr: "stat".to_string(),
            value: content.trim().to_string(),
        })?;
    if fields.len() < DISK_STAT_FIELDS {
        return Err(Error::DeviceAttr {
            attr: "stat".to_string(),
            value: content.trim().to_string(),
        });
    }
    Ok(DiskStats {
        reads_completed: fields[0],
        reads_merged: fields[1],
        sectors_read: fields[2],
        time_reading_ms: fields[3],
        writes_completed: fields[4],
        writes_merged: fields[5],
        sectors_written: fields[6],
        time_writing_ms: fields[7],
        io_in_progress: fields[8],
        time_io_ms: fields[9],
        time_io_weighted_ms: fields[10],
    })
}

fn is_empty_optical(block: &Path, name: &str) -> bool {
    let is_sr = name
        .strip_prefix("sr")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()));
    if !is_sr {
        return false;
    }
    matches!(read_u64_attr(&block.join(name).join("size"), "size"), Ok(0))
}

fn read_trimmed(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?.trim().to_string())
}

fn read_u64_attr(path: &Path, attr: &'static str) -> Result<u64> {
    let content = std::fs::read_to_string(path)?;
    content.trim().parse().map_err(|_| Error::DeviceAttr {
        attr: attr.to_string(),
        value: content.trim().to_string(),
    })
}

fn read_bool_attr(path: &Path, attr: &'static str) -> Result<bool> {
    let content = std::fs::read_to_string(path)?;
    match content.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(Error::DeviceAttr {
            attr: attr.to_string(),
            value: other.to_string(),
        }),
    }
}

/// Extract the bracketed active entry from a scheduler file,
/// e.g. `none [mq-deadline] kyber`.
fn parse_scheduler(content: &str) -> Option<String> {
    let open = content.find('[')?;
    let close = content[open..].find(']')? + open;
    Some(content[open + 1..close].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn mock_disk(sys: &Path, name: &str, sectors: u64) {
        let dev = sys.join("block").join(name);
        fs::create_dir_all(dev.join("queue")).unwrap();
        fs::write(dev.join("dev"), "8:0\n").unwrap();
        fs::write(dev.join("size"), format!("{sectors}\n")).unwrap();
        fs::write(dev.join("removable"), "0\n").unwrap();
        fs::write(dev.join("ro"), "0\n").unwrap();
        fs::write(dev.join("queue").join("rotational"), "0\n").unwrap();
        fs::write(dev.join("queue").join("scheduler"), "none [mq-deadline] kyber\n").unwrap();
        fs::write(dev.join("stat"), "  101 2 10282 48 57 6 1062 21 0 73 69\n").unwrap();
    }

    fn mock_virtual(sys: &Path, name: &str) {
        fs::create_dir_all(sys.join("devices").join("virtual").join("block").join(name)).unwrap();
    }

    #[test]
    fn test_list_disks_excludes_empty_optical() {
        let dir = tempfile::tempdir().unwrap();
        mock_disk(dir.path(), "sda", 1000);
        mock_disk(dir.path(), "sr0", 0);
        mock_disk(dir.path(), "sr1", 800);

        let names = list_disks_at(dir.path()).unwrap();
        assert_eq!(names, vec!["sda", "sr1"]);
    }

    #[test]
    fn test_virtual_and_physical_split() {
        let dir = tempfile::tempdir().unwrap();
        mock_disk(dir.path(), "sda", 1000);
        mock_disk(dir.path(), "loop0", 64);
        mock_virtual(dir.path(), "loop0");

        assert_eq!(virtual_disks_at(dir.path()).unwrap(), vec!["loop0"]);
        assert_eq!(physical_disks_at(dir.path()).unwrap(), vec!["sda"]);
    }

    #[test]
    fn test_virtual_disks_without_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("block")).unwrap();
        assert!(virtual_disks_at(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_disk_info_at() {
        let dir = tempfile::tempdir().unwrap();
        mock_disk(dir.path(), "sda", 7_814_037_168);

        let info = disk_info_at(dir.path(), "sda").unwrap();
        assert_eq!(info.name, "sda");
        assert_eq!(info.dev, "8:0");
        assert_eq!(info.size_bytes, 7_814_037_168 * 512);
        assert!(!info.removable);
        assert!(!info.read_only);
        assert!(!info.rotational);
        assert_eq!(info.scheduler.as_deref(), Some("mq-deadline"));
        assert!(!info.is_virtual);
        assert!(!info.is_dm);
    }

    #[test]
    fn test_disk_info_detects_dm() {
        let dir = tempfile::tempdir().unwrap();
        mock_disk(dir.path(), "dm-0", 2048);
        mock_virtual(dir.path(), "dm-0");
        fs::create_dir_all(dir.path().join("block").join("dm-0").join("dm")).unwrap();

        let info = disk_info_at(dir.path(), "dm-0").unwrap();
        assert!(info.is_dm);
        assert!(info.is_virtual);
    }

    #[test]
    fn test_disk_info_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("block")).unwrap();
        assert!(matches!(
            disk_info_at(dir.path(), "sdz"),
            Err(Error::DeviceNotFound(name)) if name == "sdz"
        ));
    }

    #[test]
    fn test_partition_size_at() {
        let dir = tempfile::tempdir().unwrap();
        mock_disk(dir.path(), "sda", 1000);
        let part = dir.path().join("block").join("sda").join("sda1");
        fs::create_dir_all(&part).unwrap();
        fs::write(part.join("size"), "204800\n").unwrap();

        assert_eq!(
            partition_size_at(dir.path(), "sda", "sda1").unwrap(),
            204_800 * 512
        );
        assert!(partition_size_at(dir.path(), "sda", "sda9").is_err());
    }

    #[test]
    fn test_parse_disk_stat() {
        let stats = parse_disk_stat_content("  101 2 10282 48 57 6 1062 21 0 73 69\n").unwrap();
        assert_eq!(stats.reads_completed, 101);
        assert_eq!(stats.sectors_read, 10_282);
        assert_eq!(stats.writes_completed, 57);
        assert_eq!(stats.sectors_written, 1062);
        assert_eq!(stats.io_in_progress, 0);
        assert_eq!(stats.time_io_weighted_ms, 69);
    }

    #[test]
    fn test_parse_disk_stat_tolerates_extra_fields() {
        // Newer kernels append discard and flush counters.
        let content = "1 2 3 4 5 6 7 8 9 10 11 12 13 14 15\n";
        let stats = parse_disk_stat_content(content).unwrap();
        assert_eq!(stats.time_io_weighted_ms, 11);
    }

    #[test]
    fn test_parse_disk_stat_rejects_short_content() {
        assert!(matches!(
            parse_disk_stat_content("1 2 3\n"),
            Err(Error::DeviceAttr { attr, .. }) if attr == "stat"
        ));
    }

    #[test]
    fn test_scheduler_parse() {
        assert_eq!(
            parse_scheduler("noop deadline [cfq]\n"),
            Some("cfq".to_string())
        );
        assert_eq!(parse_scheduler("none\n"), None);
    }

    #[test]
    fn test_bad_attr_is_error() {
        let dir = tempfile::tempdir().unwrap();
        mock_disk(dir.path(), "sda", 1000);
        fs::write(dir.path().join("block").join("sda").join("ro"), "yes\n").unwrap();
        assert!(matches!(
            disk_info_at(dir.path(), "sda"),
            Err(Error::DeviceAttr { attr, .. }) if attr == "ro"
        ));
    }

    #[test]
    #[ignore] // reads the live /sys of the test host
    fn test_list_disks_live() {
        let names = list_disks().unwrap();
        assert!(!names.is_empty());
    }
}
