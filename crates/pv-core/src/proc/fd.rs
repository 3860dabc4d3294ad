//! Per-process descriptor tables.
//!
//! Each entry under /proc/<pid>/fd is a symlink whose target names the
//! object behind the descriptor: a path for regular files, or a
//! `kind:[identifier]` token for sockets, pipes, and anonymous inodes.
//! The fdinfo table adds position and open flags per descriptor.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use pv_common::{Error, Result};

/// Kind of object behind a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FdKind {
    Socket,
    Pipe,
    AnonInode,
    File,
}

/// Access mode extracted from the fdinfo flags field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl OpenMode {
    /// Extract the access mode from open flags.
    pub fn from_flags(flags: u32) -> Option<Self> {
        match flags & 0o3 {
            0 => Some(OpenMode::ReadOnly),
            1 => Some(OpenMode::WriteOnly),
            2 => Some(OpenMode::ReadWrite),
            _ => None,
        }
    }
}

/// One descriptor slot of a process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FdEntry {
    pub fd: u32,
    pub kind: FdKind,
    /// Socket and pipe inodes as a decimal string, anonymous inode class
    /// name, or the resolved path for files.
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<OpenMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mnt_id: Option<u32>,
}

/// Fields parsed from an fdinfo file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FdInfo {
    pub pos: Option<u64>,
    pub flags: Option<u32>,
    pub mnt_id: Option<u32>,
}

/// Parse fdinfo file content (for testing). The flags field is octal.
pub fn parse_fdinfo_content(content: &str) -> FdInfo {
    let mut info = FdInfo::default();
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("pos:") {
            info.pos = value.trim().parse().ok();
        } else if let Some(value) = line.strip_prefix("flags:") {
            info.flags = u32::from_str_radix(value.trim(), 8).ok();
        } else if let Some(value) = line.strip_prefix("mnt_id:") {
            info.mnt_id = value.trim().parse().ok();
        }
    }
    info
}

/// List the open descriptors of a process.
pub fn fd_entries(pid: u32) -> Result<Vec<FdEntry>> {
    fd_entries_at(Path::new("/proc"), pid)
}

/// List descriptors from a specific proc root (for testing with a mock tree).
pub fn fd_entries_at(proc_root: &Path, pid: u32) -> Result<Vec<FdEntry>> {
    let fd_dir = proc_root.join(pid.to_string()).join("fd");
    let dir = std::fs::read_dir(&fd_dir).map_err(|err| access_error(pid, err))?;

    let mut entries = Vec::new();
    for dirent in dir {
        let dirent = dirent.map_err(|err| access_error(pid, err))?;
        let Some(fd) = dirent
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };
        let target = match std::fs::read_link(dirent.path()) {
            Ok(target) => target.to_string_lossy().into_owned(),
            // The descriptor closed between listing and readlink.
            Err(_) => continue,
        };
        let (kind, target) = classify_target(&target);
        let info = read_fdinfo(proc_root, pid, fd);

        entries.push(FdEntry {
            fd,
            kind,
            target,
            pos: info.pos,
            flags: info.flags,
            mode: info.flags.and_then(OpenMode::from_flags),
            mnt_id: info.mnt_id,
        });
    }
    entries.sort_by_key(|entry| entry.fd);
    Ok(entries)
}

/// Socket inodes held by a process, for the connection index.
pub fn socket_inodes(pid: u32) -> Result<Vec<u64>> {
    socket_inodes_at(Path::new("/proc"), pid)
}

pub fn socket_inodes_at(proc_root: &Path, pid: u32) -> Result<Vec<u64>> {
    let entries = fd_entries_at(proc_root, pid)?;
    Ok(entries
        .iter()
        .filter(|entry| entry.kind == FdKind::Socket)
        .filter_map(|entry| entry.target.parse().ok())
        .collect())
}

fn read_fdinfo(proc_root: &Path, pid: u32, fd: u32) -> FdInfo {
    let path = proc_root
        .join(pid.to_string())
        .join("fdinfo")
        .join(fd.to_string());
    match std::fs::read_to_string(path) {
        Ok(content) => parse_fdinfo_content(&content),
        Err(_) => FdInfo::default(),
    }
}

fn classify_target(target: &str) -> (FdKind, String) {
    if let Some(inner) = strip_token(target, "socket:") {
        return (FdKind::Socket, inner);
    }
    if let Some(inner) = strip_token(target, "pipe:") {
        return (FdKind::Pipe, inner);
    }
    if let Some(inner) = strip_token(target, "anon_inode:") {
        return (FdKind::AnonInode, inner);
    }
    (FdKind::File, target.to_string())
}

/// Strip `prefix` and the optional bracket pair around the remainder.
fn strip_token(target: &str, prefix: &str) -> Option<String> {
    let rest = target.strip_prefix(prefix)?;
    let inner = rest
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .unwrap_or(rest);
    Some(inner.to_string())
}

fn access_error(pid: u32, err: std::io::Error) -> Error {
    match err.kind() {
        ErrorKind::NotFound => Error::ProcessVanished { pid },
        ErrorKind::PermissionDenied => Error::ProcessDenied { pid },
        _ => Error::Io(err),
    }
}
