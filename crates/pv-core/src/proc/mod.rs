//! Process enumeration and per-process status readers.
//!
//! Serves two callers: the CLI's process listing, and the network module's
//! socket index, which joins descriptor tables against socket tables. All
//! readers treat a process vanishing mid-read as an expected race.

pub mod fd;

pub use fd::{
    fd_entries, fd_entries_at, parse_fdinfo_content, socket_inodes, socket_inodes_at, FdEntry,
    FdInfo, FdKind, OpenMode,
};

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use pv_common::{Error, Result};

/// Identity and scheduling fields for one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub comm: String,
    /// Single-character scheduler state (R, S, D, Z, T, ...).
    pub state: char,
    pub ppid: u32,
    pub pgrp: u32,
    pub session: u32,
    pub uid: u32,
    /// Process start time in clock ticks since boot.
    pub start_ticks: u64,
    pub cmdline: Vec<String>,
}

/// Cumulative I/O counters from /proc/<pid>/io.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoCounters {
    pub rchar: u64,
    pub wchar: u64,
    pub syscr: u64,
    pub syscw: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub cancelled_write_bytes: u64,
}

/// List running process ids, ascending.
pub fn list_pids() -> Result<Vec<u32>> {
    list_pids_at(Path::new("/proc"))
}

/// List pids from a specific proc root (for testing with a mock tree).
pub fn list_pids_at(proc_root: &Path) -> Result<Vec<u32>> {
    let mut pids = Vec::new();
    for entry in std::fs::read_dir(proc_root)? {
        let entry = entry?;
        if let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        {
            pids.push(pid);
        }
    }
    pids.sort_unstable();
    Ok(pids)
}

/// Read one process's identity record.
pub fn process(pid: u32) -> Result<ProcessInfo> {
    process_at(Path::new("/proc"), pid)
}

pub fn process_at(proc_root: &Path, pid: u32) -> Result<ProcessInfo> {
    let pid_dir = proc_root.join(pid.to_string());

    let stat = read_proc_file(&pid_dir.join("stat"), pid)?;
    let fields = parse_stat_content(pid, &stat)?;

    let status = read_proc_file(&pid_dir.join("status"), pid)?;
    let uid = parse_uid_from_status(&status).ok_or_else(|| Error::ProcessParse {
        pid,
        message: "missing Uid line in status".to_string(),
    })?;

    // cmdline is empty for kernel threads; that is not an error.
    let cmdline = match std::fs::read(pid_dir.join("cmdline")) {
        Ok(raw) => parse_cmdline_content(&raw),
        Err(_) => Vec::new(),
    };

    Ok(ProcessInfo {
        pid,
        comm: fields.comm,
        state: fields.state,
        ppid: fields.ppid,
        pgrp: fields.pgrp,
        session: fields.session,
        uid,
        start_ticks: fields.start_ticks,
        cmdline,
    })
}

/// Snapshot every running process, skipping any that vanish mid-scan.
pub fn processes() -> Result<Vec<ProcessInfo>> {
    processes_at(Path::new("/proc"))
}

pub fn processes_at(proc_root: &Path) -> Result<Vec<ProcessInfo>> {
    let mut out = Vec::new();
    for pid in list_pids_at(proc_root)? {
        match process_at(proc_root, pid) {
            Ok(info) => out.push(info),
            Err(err) => debug!(pid, error = %err, "skipping process"),
        }
    }
    Ok(out)
}

/// Read the comm (thread name) of a process.
pub fn comm(pid: u32) -> Result<String> {
    comm_at(Path::new("/proc"), pid)
}

pub fn comm_at(proc_root: &Path, pid: u32) -> Result<String> {
    let content = read_proc_file(&proc_root.join(pid.to_string()).join("comm"), pid)?;
    Ok(content.trim().to_string())
}

/// Read a process's cumulative I/O counters.
pub fn io_counters(pid: u32) -> Result<IoCounters> {
    io_counters_at(Path::new("/proc"), pid)
}

pub fn io_counters_at(proc_root: &Path, pid: u32) -> Result<IoCounters> {
    let content = read_proc_file(&proc_root.join(pid.to_string()).join("io"), pid)?;
    Ok(parse_io_content(&content))
}

#[derive(Debug)]
struct StatFields {
    comm: String,
    state: char,
    ppid: u32,
    pgrp: u32,
    session: u32,
    start_ticks: u64,
}

/// Split /proc/<pid>/stat around the parenthesized comm.
///
/// comm may itself contain spaces and parentheses, so the split runs from
/// the first `(` to the last `)`.
fn parse_stat_content(pid: u32, content: &str) -> Result<StatFields> {
    let open = content
        .find('(')
        .ok_or_else(|| stat_error(pid, "no opening paren"))?;
    let close = content
        .rfind(')')
        .ok_or_else(|| stat_error(pid, "no closing paren"))?;
    if close < open {
        return Err(stat_error(pid, "mismatched parens"));
    }

    let comm = content[open + 1..close].to_string();
    let rest: Vec<&str> = content[close + 1..].split_whitespace().collect();
    // After comm: state, ppid, pgrp, session, ..., starttime at index 19.
    if rest.len() < 20 {
        return Err(stat_error(pid, "too few fields"));
    }

    let state = rest[0]
        .chars()
        .next()
        .ok_or_else(|| stat_error(pid, "empty state field"))?;

    Ok(StatFields {
        comm,
        state,
        ppid: parse_stat_field(pid, rest[1], "ppid")?,
        pgrp: parse_stat_field(pid, rest[2], "pgrp")?,
        session: parse_stat_field(pid, rest[3], "session")?,
        start_ticks: parse_stat_field(pid, rest[19], "starttime")?,
    })
}

fn parse_stat_field<T: std::str::FromStr>(pid: u32, token: &str, name: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| stat_error(pid, &format!("bad {name} field")))
}

fn stat_error(pid: u32, message: &str) -> Error {
    Error::ProcessParse {
        pid,
        message: format!("stat: {message}"),
    }
}

/// Extract the real uid from /proc/<pid>/status content.
fn parse_uid_from_status(content: &str) -> Option<u32> {
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("Uid:") {
            return rest.split_whitespace().next()?.parse().ok();
        }
    }
    None
}

/// Split NUL-separated cmdline bytes into arguments.
fn parse_cmdline_content(raw: &[u8]) -> Vec<String> {
    raw.split(|byte| *byte == 0)
        .filter(|part| !part.is_empty())
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect()
}

/// Parse /proc/<pid>/io content (for testing). Unknown keys are ignored.
pub fn parse_io_content(content: &str) -> IoCounters {
    let mut io = IoCounters::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Ok(value) = value.trim().parse::<u64>() else {
            continue;
        };
        match key {
            "rchar" => io.rchar = value,
            "wchar" => io.wchar = value,
            "syscr" => io.syscr = value,
            "syscw" => io.syscw = value,
            "read_bytes" => io.read_bytes = value,
            "write_bytes" => io.write_bytes = value,
            "cancelled_write_bytes" => io.cancelled_write_bytes = value,
            _ => {}
        }
    }
    io
}

fn read_proc_file(path: &Path, pid: u32) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => Error::ProcessVanished { pid },
        ErrorKind::PermissionDenied => Error::ProcessDenied { pid },
        _ => Error::Io(err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const STAT_LINE: &str = "1234 (webserv) S 1 1234 1234 0 -1 4194560 1523 0 2 0 12 7 0 0 20 0 4 0 8899 10240000 512 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 0 0";

    fn mock_process(root: &Path, pid: u32, stat: &str, uid: u32) {
        let pid_dir = root.join(pid.to_string());
        fs::create_dir_all(&pid_dir).unwrap();
        fs::write(pid_dir.join("stat"), stat).unwrap();
        fs::write(
            pid_dir.join("status"),
            format!("Name:\twebserv\nUid:\t{uid}\t{uid}\t{uid}\t{uid}\nGid:\t{uid}\t{uid}\t{uid}\t{uid}\n"),
        )
        .unwrap();
        fs::write(pid_dir.join("cmdline"), b"/usr/bin/webserv\0--port\08080\0").unwrap();
        fs::write(pid_dir.join("comm"), "webserv\n").unwrap();
    }

    #[test]
    fn test_parse_stat_basic() {
        let fields = parse_stat_content(1234, STAT_LINE).unwrap();
        assert_eq!(fields.comm, "webserv");
        assert_eq!(fields.state, 'S');
        assert_eq!(fields.ppid, 1);
        assert_eq!(fields.pgrp, 1234);
        assert_eq!(fields.session, 1234);
        assert_eq!(fields.start_ticks, 8899);
    }

    #[test]
    fn test_parse_stat_comm_with_spaces_and_parens() {
        let line = "77 (tmux: server (1)) R 1 77 77 0 -1 4194560 0 0 0 0 0 0 0 0 20 0 1 0 4242 0 0 18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0";
        let fields = parse_stat_content(77, line).unwrap();
        assert_eq!(fields.comm, "tmux: server (1)");
        assert_eq!(fields.state, 'R');
        assert_eq!(fields.start_ticks, 4242);
    }

    #[test]
    fn test_parse_stat_rejects_garbage() {
        assert!(parse_stat_content(1, "no parens here").is_err());
        assert!(parse_stat_content(1, "1 (x) S 2 3").is_err());
        let err = parse_stat_content(9, "garbage").unwrap_err();
        assert!(matches!(err, Error::ProcessParse { pid: 9, .. }));
    }

    #[test]
    fn test_parse_uid_from_status() {
        let content = "Name:\tbash\nState:\tS (sleeping)\nUid:\t1000\t1000\t1000\t1000\n";
        assert_eq!(parse_uid_from_status(content), Some(1000));
        assert_eq!(parse_uid_from_status("Name:\tbash\n"), None);
    }

    #[test]
    fn test_parse_cmdline() {
        assert_eq!(
            parse_cmdline_content(b"/bin/sh\0-c\0sleep 1\0"),
            vec!["/bin/sh", "-c", "sleep 1"]
        );
        assert!(parse_cmdline_content(b"").is_empty());
    }

    #[test]
    fn test_parse_io_content() {
        let content = "rchar: 323934931\nwchar: 323929600\nsyscr: 632687\nsyscw: 632675\nread_bytes: 0\nwrite_bytes: 323932160\ncancelled_write_bytes: 0\n";
        let io = parse_io_content(content);
        assert_eq!(io.rchar, 323_934_931);
        assert_eq!(io.wchar, 323_929_600);
        assert_eq!(io.syscr, 632_687);
        assert_eq!(io.write_bytes, 323_932_160);
        assert_eq!(io.cancelled_write_bytes, 0);
    }

    #[test]
    fn test_list_pids_at() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["12", "3", "cpuinfo", "net", "100"] {
            fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        assert_eq!(list_pids_at(dir.path()).unwrap(), vec![3, 12, 100]);
    }

    #[test]
    fn test_process_at_mock_tree() {
        let dir = tempfile::tempdir().unwrap();
        mock_process(dir.path(), 1234, STAT_LINE, 1000);

        let info = process_at(dir.path(), 1234).unwrap();
        assert_eq!(info.pid, 1234);
        assert_eq!(info.comm, "webserv");
        assert_eq!(info.state, 'S');
        assert_eq!(info.uid, 1000);
        assert_eq!(info.cmdline, vec!["/usr/bin/webserv", "--port", "8080"]);
    }

    #[test]
    fn test_process_at_vanished() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            process_at(dir.path(), 999),
            Err(Error::ProcessVanished { pid: 999 })
        ));
    }

    #[test]
    fn test_processes_at_skips_broken_entries() {
        let dir = tempfile::tempdir().unwrap();
        mock_process(dir.path(), 10, STAT_LINE, 0);
        // A pid directory without stat/status files, as left by an
        // exiting process.
        fs::create_dir_all(dir.path().join("11")).unwrap();

        let infos = processes_at(dir.path()).unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].pid, 10);
    }

    #[test]
    fn test_comm_at() {
        let dir = tempfile::tempdir().unwrap();
        mock_process(dir.path(), 55, STAT_LINE, 0);
        assert_eq!(comm_at(dir.path(), 55).unwrap(), "webserv");
    }

    #[test]
    #[ignore] // reads the live /proc of the test runner
    fn test_own_process_live() {
        let pid = std::process::id();
        let info = process(pid).unwrap();
        assert_eq!(info.pid, pid);
        assert!(!info.comm.is_empty());
    }
}
