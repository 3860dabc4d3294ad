//! End-to-end tests over a synthetic proc and sys tree.
//!
//! Every command is driven through the binary with --proc-root and
//! --sys-root pointed at tempdir fixtures, so the full pipeline from
//! argument parsing to rendered output is covered without touching the
//! host system.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command for the procview binary with a scrubbed environment.
fn procview() -> Command {
    let mut cmd = Command::cargo_bin("procview").expect("procview binary should exist");
    cmd.env_remove("PROCVIEW_FORMAT");
    cmd.env_remove("PROCVIEW_PROC_ROOT");
    cmd.env_remove("PROCVIEW_SYS_ROOT");
    cmd
}

const TCP4_TABLE: &str = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000:1F40 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 4711 1 0000000000000000 100 0 0 10 0
   1: 01010101:1F40 01010101:01BB 01 00000000:00000000 00:00000000 00000000  1000        0 4712 1 0000000000000000 100 0 0 10 0
";

const TCP6_TABLE: &str = "\
  sl  local_address                         rem_address                           st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 00000000000000000000000000000001:0016 00000000000000000000000000000000:0000 0A 00000000:00000000 00:00000000 00000000     0        0 4713 1 0000000000000000 100 0 0 10 0
";

const ROUTE_TABLE: &str = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
eth0\t00000000\t01010101\t0003\t0\t0\t100\t00000000\t0\t0\t0
eth0\t01010101\t00000000\t0001\t0\t0\t1000\tFFFFFFFF\t0\t0\t0
";

const IPV6_ROUTE_TABLE: &str = "\
00000000000000000000000000000000 00 00000000000000000000000000000000 00 00000000000000000000000000000001 00000400 00000001 00000000 00000003 lo
";

const ARP_TABLE: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.1.1      0x1         0x2         aa:bb:cc:dd:ee:ff     *        eth0
";

const DEV_TABLE: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1234567    9876    0    0    0     0          0         0  1234567    9876    0    0    0     0       0          0
  eth0: 987654321 123456    0    0    0     0          0         0 12345678   54321    0    0    0     0       0          0
";

const IF_INET6_TABLE: &str = "\
00000000000000000000000000000001 01 80 10 80       lo
fe800000000000000000000000000001 02 40 20 80     eth0
";

const MOUNTS_TABLE: &str = "\
/dev/sda1 / ext4 rw,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
tmpfs /run tmpfs rw,nosuid,nodev,mode=755 0 0
";

fn write_net(root: &Path) {
    let net = root.join("net");
    fs::create_dir_all(&net).unwrap();
    fs::write(net.join("tcp"), TCP4_TABLE).unwrap();
    fs::write(net.join("tcp6"), TCP6_TABLE).unwrap();
    fs::write(net.join("route"), ROUTE_TABLE).unwrap();
    fs::write(net.join("ipv6_route"), IPV6_ROUTE_TABLE).unwrap();
    fs::write(net.join("arp"), ARP_TABLE).unwrap();
    fs::write(net.join("dev"), DEV_TABLE).unwrap();
    fs::write(net.join("if_inet6"), IF_INET6_TABLE).unwrap();
    fs::write(root.join("mounts"), MOUNTS_TABLE).unwrap();
}

fn write_process(root: &Path) {
    let pid_dir = root.join("42");
    fs::create_dir_all(pid_dir.join("fd")).unwrap();
    fs::create_dir_all(pid_dir.join("fdinfo")).unwrap();
    fs::write(
        pid_dir.join("stat"),
        "42 (webserv) S 1 42 42 0 -1 4194304 100 0 0 0 10 20 0 0 20 0 1 0 8899 1000000 500 \
         18446744073709551615 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0\n",
    )
    .unwrap();
    fs::write(
        pid_dir.join("status"),
        "Name:\twebserv\nUmask:\t0022\nState:\tS (sleeping)\nUid:\t1000\t1000\t1000\t1000\nGid:\t1000\t1000\t1000\t1000\n",
    )
    .unwrap();
    fs::write(pid_dir.join("cmdline"), b"/usr/bin/webserv\0--port\x008080\0").unwrap();
    fs::write(pid_dir.join("comm"), "webserv\n").unwrap();

    symlink("/dev/null", pid_dir.join("fd").join("0")).unwrap();
    symlink("socket:[4711]", pid_dir.join("fd").join("3")).unwrap();
    symlink("socket:[4712]", pid_dir.join("fd").join("4")).unwrap();
    fs::write(pid_dir.join("fdinfo").join("0"), "pos:\t0\nflags:\t0100002\nmnt_id:\t22\n").unwrap();
    fs::write(pid_dir.join("fdinfo").join("3"), "pos:\t0\nflags:\t02\nmnt_id:\t10\n").unwrap();
    fs::write(pid_dir.join("fdinfo").join("4"), "pos:\t0\nflags:\t02\nmnt_id:\t10\n").unwrap();
}

fn write_disk(sys: &Path, name: &str, dev: &str, sectors: u64, scheduler: &str) {
    let block = sys.join("block").join(name);
    fs::create_dir_all(block.join("queue")).unwrap();
    fs::write(block.join("dev"), format!("{dev}\n")).unwrap();
    fs::write(block.join("size"), format!("{sectors}\n")).unwrap();
    fs::write(block.join("removable"), "0\n").unwrap();
    fs::write(block.join("ro"), "0\n").unwrap();
    fs::write(block.join("queue").join("rotational"), "0\n").unwrap();
    fs::write(block.join("queue").join("scheduler"), format!("{scheduler}\n")).unwrap();
    fs::write(block.join("stat"), "  101 2 10282 48 57 6 1062 21 0 73 69\n").unwrap();
}

fn write_sys(sys: &Path) {
    write_disk(sys, "sda", "8:0", 204800, "none [mq-deadline] kyber");
    write_disk(sys, "loop0", "7:0", 2048, "none");
    fs::create_dir_all(sys.join("devices").join("virtual").join("block").join("loop0")).unwrap();
    fs::create_dir_all(sys.join("devices").join("virtual").join("net").join("lo")).unwrap();
}

fn mock_tree() -> (tempfile::TempDir, tempfile::TempDir) {
    let proc = tempfile::tempdir().unwrap();
    let sys = tempfile::tempdir().unwrap();
    write_net(proc.path());
    write_process(proc.path());
    write_sys(sys.path());
    (proc, sys)
}

fn procview_at(proc_root: &Path, sys_root: &Path) -> Command {
    let mut cmd = procview();
    cmd.arg("--proc-root").arg(proc_root);
    cmd.arg("--sys-root").arg(sys_root);
    cmd
}

// ============================================================================
// Connection Tests
// ============================================================================

mod connections {
    use super::*;

    #[test]
    fn table_shows_decoded_endpoints() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["connections", "--net", "tcp"])
            .assert()
            .success()
            .stdout(predicate::str::contains("0.0.0.0:8000"))
            .stdout(predicate::str::contains("1.1.1.1:443"))
            .stdout(predicate::str::contains("::1:22"))
            .stdout(predicate::str::contains("LISTEN"))
            .stdout(predicate::str::contains("ESTABLISHED"));
    }

    #[test]
    fn json_carries_typed_fields() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["connections", "--net", "tcp4", "-f", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"count\": 2"))
            .stdout(predicate::str::contains("\"state\": \"LISTEN\""))
            .stdout(predicate::str::contains("\"local_port\": 8000"))
            .stdout(predicate::str::contains("\"proto\": \"tcp\""))
            .stdout(predicate::str::contains("\"family\": \"ipv4\""));
    }

    #[test]
    fn process_attribution_joins_descriptor_table() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["connections", "--process", "-f", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"process\": \"42/webserv\""))
            .stdout(predicate::str::contains("\"process\": \"kernel\""));
    }

    #[test]
    fn owner_filter_keeps_matching_rows_only() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["connections", "--owner", "0", "-f", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"count\": 1"))
            .stdout(predicate::str::contains("\"local_port\": 22"));
    }

    #[test]
    fn listening_excludes_established_rows() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .arg("listening")
            .assert()
            .success()
            .stdout(predicate::str::contains("0.0.0.0:8000"))
            .stdout(predicate::str::contains("1.1.1.1:443").not());
    }

    #[test]
    fn listening_scopes_to_selector_family() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["listening", "--net", "tcp6"])
            .assert()
            .success()
            .stdout(predicate::str::contains("::1:22"))
            .stdout(predicate::str::contains("0.0.0.0:8000").not());
    }
}

// ============================================================================
// Route and Neighbor Tests
// ============================================================================

mod routing {
    use super::*;

    #[test]
    fn gateway_resolves_default_route() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .arg("gateway")
            .assert()
            .success()
            .stdout(predicate::str::contains("1.1.1.1 dev eth0"));
    }

    #[test]
    fn gateway_json_record() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["gateway", "-f", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"gateway\": \"1.1.1.1\""))
            .stdout(predicate::str::contains("\"iface\": \"eth0\""));
    }

    #[test]
    fn gateway_reports_absence() {
        let proc = tempfile::tempdir().unwrap();
        let sys = tempfile::tempdir().unwrap();
        let net = proc.path().join("net");
        fs::create_dir_all(&net).unwrap();
        fs::write(
            net.join("route"),
            "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT\n",
        )
        .unwrap();

        procview_at(proc.path(), sys.path())
            .arg("gateway")
            .assert()
            .success()
            .stdout(predicate::str::contains("no default route"));
    }

    #[test]
    fn routes_table_lists_interfaces() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .arg("routes")
            .assert()
            .success()
            .stdout(predicate::str::contains("eth0"))
            .stdout(predicate::str::contains("1.1.1.1"));
    }

    #[test]
    fn ipv6_routes_decode_prefix_and_metric() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["routes", "--ipv6"])
            .assert()
            .success()
            .stdout(predicate::str::contains("::/0"))
            .stdout(predicate::str::contains("1024"));
    }

    #[test]
    fn arp_table_lists_neighbors() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .arg("arp")
            .assert()
            .success()
            .stdout(predicate::str::contains("192.168.1.1"))
            .stdout(predicate::str::contains("aa:bb:cc:dd:ee:ff"));
    }
}

// ============================================================================
// Interface Tests
// ============================================================================

mod interfaces {
    use super::*;

    #[test]
    fn table_joins_counters_and_addresses() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .arg("interfaces")
            .assert()
            .success()
            .stdout(predicate::str::contains("eth0"))
            .stdout(predicate::str::contains("987654321"))
            .stdout(predicate::str::contains("::1/128"));
    }

    #[test]
    fn virtual_flag_comes_from_sys_tree() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["interfaces", "-f", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"is_virtual\": true"))
            .stdout(predicate::str::contains("\"rx_bytes\": 987654321"));
    }
}

// ============================================================================
// Process Tests
// ============================================================================

mod processes {
    use super::*;

    #[test]
    fn table_lists_command_lines() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .arg("processes")
            .assert()
            .success()
            .stdout(predicate::str::contains("webserv"))
            .stdout(predicate::str::contains("--port 8080"));
    }

    #[test]
    fn single_pid_lookup() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["processes", "--pid", "42", "-f", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"count\": 1"))
            .stdout(predicate::str::contains("\"comm\": \"webserv\""))
            .stdout(predicate::str::contains("\"ppid\": 1"));
    }

    #[test]
    fn fds_classify_descriptors() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["fds", "42"])
            .assert()
            .success()
            .stdout(predicate::str::contains("socket:[4711]"))
            .stdout(predicate::str::contains("/dev/null"));
    }

    #[test]
    fn fds_json_carries_kind_and_mode() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["fds", "42", "-f", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"kind\": \"socket\""))
            .stdout(predicate::str::contains("\"mode\": \"read_write\""));
    }
}

// ============================================================================
// Disk and Mount Tests
// ============================================================================

mod disks {
    use super::*;

    #[test]
    fn table_shows_size_and_scheduler() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .arg("disks")
            .assert()
            .success()
            .stdout(predicate::str::contains("sda"))
            .stdout(predicate::str::contains("100.0 MiB"))
            .stdout(predicate::str::contains("mq-deadline"));
    }

    #[test]
    fn virtual_filter_keeps_loop_devices() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["disks", "--virtual"])
            .assert()
            .success()
            .stdout(predicate::str::contains("loop0"))
            .stdout(predicate::str::contains("sda").not());
    }

    #[test]
    fn physical_filter_drops_loop_devices() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["disks", "--physical"])
            .assert()
            .success()
            .stdout(predicate::str::contains("sda"))
            .stdout(predicate::str::contains("loop0").not());
    }
}

mod mounts {
    use super::*;

    #[test]
    fn live_table_lists_mounted_filesystems() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .arg("mounts")
            .assert()
            .success()
            .stdout(predicate::str::contains("/dev/sda1"))
            .stdout(predicate::str::contains("ext4"))
            .stdout(predicate::str::contains("tmpfs"));
    }

    #[test]
    fn json_carries_mount_fields() {
        let (proc, sys) = mock_tree();
        procview_at(proc.path(), sys.path())
            .args(["mounts", "-f", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"fstype\": \"ext4\""))
            .stdout(predicate::str::contains("\"target\": \"/\""));
    }
}
