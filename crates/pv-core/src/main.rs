//! procview - typed views over Linux kernel state tables.
//!
//! The main entry point, handling:
//! - Socket table decoding with DNS, user, and process enrichment
//! - Route, neighbor, and interface queries
//! - Process and descriptor listings
//! - Block device and mount queries
//!
//! stdout carries payloads (tables or JSON envelopes); all logs and
//! human-readable errors go to stderr.

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;

use pv_common::{format_error_human, Error, OutputFormat, StructuredError, SCHEMA_VERSION};
use pv_core::exit_codes::ExitCode;
use pv_core::logging::{generate_run_id, init_logging, LogConfig, LogFormat, LogLevel};
use pv_core::net::{self, ConnectionOptions, IpFamily, Selector};
use pv_core::{disk, proc};

/// procview - structured views over /proc and /sys tables
#[derive(Parser)]
#[command(name = "procview")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Output format
    #[arg(
        long,
        short = 'f',
        global = true,
        env = "PROCVIEW_FORMAT",
        default_value = "table"
    )]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Read kernel tables from an alternate proc root
    #[arg(long, global = true, env = "PROCVIEW_PROC_ROOT", default_value = "/proc")]
    proc_root: PathBuf,

    /// Read device attributes from an alternate sys root
    #[arg(long, global = true, env = "PROCVIEW_SYS_ROOT", default_value = "/sys")]
    sys_root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Decoded socket tables with optional enrichment
    #[command(alias = "conn")]
    Connections(ConnectionsArgs),

    /// Sockets in the LISTEN state
    Listening(ListeningArgs),

    /// IPv4 or IPv6 routing table
    Routes(RoutesArgs),

    /// Default gateway, if present
    Gateway,

    /// Neighbor (ARP) table
    Arp,

    /// Interface counters and addresses
    Interfaces,

    /// Running processes
    Processes(ProcessesArgs),

    /// Open descriptors of one process
    Fds(FdsArgs),

    /// Block devices and their attributes
    Disks(DisksArgs),

    /// Mount tables, optionally with usage
    Mounts(MountsArgs),

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct ConnectionsArgs {
    /// Table selector: all, inet, inet4, inet6, tcp, tcp4, tcp6, udp, udp4, udp6
    #[arg(long, default_value = "all")]
    net: String,

    /// Reverse-resolve addresses
    #[arg(long)]
    dns: bool,

    /// Resolve owner uids to usernames
    #[arg(long)]
    user: bool,

    /// Attribute sockets to owning processes
    #[arg(long)]
    process: bool,

    /// Keep only connections owned by this user
    #[arg(long)]
    owner: Option<String>,
}

#[derive(Args, Debug)]
struct ListeningArgs {
    /// Table selector: all, inet, inet4, inet6, tcp, tcp4, tcp6, udp, udp4, udp6
    #[arg(long, default_value = "tcp")]
    net: String,

    /// Resolve owner uids to usernames
    #[arg(long)]
    user: bool,

    /// Attribute sockets to owning processes
    #[arg(long)]
    process: bool,

    /// Keep only sockets owned by this user
    #[arg(long)]
    owner: Option<String>,
}

#[derive(Args, Debug)]
struct RoutesArgs {
    /// Show the IPv6 routing table instead of IPv4
    #[arg(long)]
    ipv6: bool,
}

#[derive(Args, Debug)]
struct ProcessesArgs {
    /// Show a single process
    #[arg(long)]
    pid: Option<u32>,
}

#[derive(Args, Debug)]
struct FdsArgs {
    /// Process to inspect
    pid: u32,
}

#[derive(Args, Debug)]
struct DisksArgs {
    /// Only hardware-backed devices
    #[arg(long, conflicts_with = "virtual_only")]
    physical: bool,

    /// Only virtual devices (loop, ram, dm)
    #[arg(long = "virtual")]
    virtual_only: bool,
}

#[derive(Args, Debug)]
struct MountsArgs {
    /// Read /etc/fstab instead of the live table
    #[arg(long)]
    fstab: bool,

    /// Show fstab entries whose mount point is not mounted
    #[arg(long)]
    not_mounted: bool,

    /// Include capacity and free space per mount
    #[arg(long)]
    usage: bool,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.global.quiet {
        LogLevel::Error
    } else {
        match cli.global.verbose {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    };
    // Machine-readable stdout pairs with machine-readable stderr.
    let log_format = if cli.global.format == OutputFormat::Json {
        LogFormat::Jsonl
    } else {
        LogFormat::Human
    };
    init_logging(&LogConfig {
        level: log_level,
        format: log_format,
        timestamps: true,
    });

    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(err) => report_error(&cli.global, &err),
    };
    std::process::exit(exit_code.as_i32());
}

fn run(cli: &Cli) -> pv_common::Result<ExitCode> {
    match &cli.command {
        Commands::Connections(args) => run_connections(&cli.global, args),
        Commands::Listening(args) => run_listening(&cli.global, args),
        Commands::Routes(args) => run_routes(&cli.global, args),
        Commands::Gateway => run_gateway(&cli.global),
        Commands::Arp => run_arp(&cli.global),
        Commands::Interfaces => run_interfaces(&cli.global),
        Commands::Processes(args) => run_processes(&cli.global, args),
        Commands::Fds(args) => run_fds(&cli.global, args),
        Commands::Disks(args) => run_disks(&cli.global, args),
        Commands::Mounts(args) => run_mounts(&cli.global, args),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "procview", &mut std::io::stdout());
            Ok(ExitCode::Success)
        }
        Commands::Version => {
            print_version(&cli.global);
            Ok(ExitCode::Success)
        }
    }
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_connections(global: &GlobalOpts, args: &ConnectionsArgs) -> pv_common::Result<ExitCode> {
    let selector: Selector = args.net.parse()?;
    let options = ConnectionOptions {
        resolve_dns: args.dns,
        resolve_user: args.user,
        resolve_process: args.process,
        owner_filter: args.owner.clone(),
    };
    let records = net::connections_at(&global.proc_root, selector, &options)?;
    match global.format {
        OutputFormat::Json => emit_json(&records)?,
        OutputFormat::Table => print_connections(&records),
    }
    Ok(ExitCode::Success)
}

fn run_listening(global: &GlobalOpts, args: &ListeningArgs) -> pv_common::Result<ExitCode> {
    let selector: Selector = args.net.parse()?;
    let options = ConnectionOptions {
        resolve_dns: false,
        resolve_user: args.user,
        resolve_process: args.process,
        owner_filter: args.owner.clone(),
    };
    let records = net::listening_at(&global.proc_root, selector, &options)?;
    match global.format {
        OutputFormat::Json => emit_json(&records)?,
        OutputFormat::Table => print_connections(&records),
    }
    Ok(ExitCode::Success)
}

fn run_routes(global: &GlobalOpts, args: &RoutesArgs) -> pv_common::Result<ExitCode> {
    if args.ipv6 {
        let records = net::routes_v6_at(&global.proc_root)?;
        match global.format {
            OutputFormat::Json => emit_json(&records)?,
            OutputFormat::Table => {
                println!(
                    "{:<42} {:<42} {:>8} {:>8} {}",
                    "DESTINATION", "NEXT_HOP", "METRIC", "FLAGS", "IFACE"
                );
                for r in &records {
                    println!(
                        "{:<42} {:<42} {:>8} {:>8x} {}",
                        format!("{}/{}", r.destination, r.dest_prefix),
                        r.next_hop,
                        r.metric,
                        r.flags,
                        r.iface
                    );
                }
            }
        }
    } else {
        let records = net::routes_at(&global.proc_root)?;
        match global.format {
            OutputFormat::Json => emit_json(&records)?,
            OutputFormat::Table => {
                println!(
                    "{:<8} {:<17} {:<17} {:<17} {:>6} {:>7}",
                    "IFACE", "DESTINATION", "GATEWAY", "MASK", "FLAGS", "METRIC"
                );
                for r in &records {
                    println!(
                        "{:<8} {:<17} {:<17} {:<17} {:>6x} {:>7}",
                        r.iface, r.destination, r.gateway, r.mask, r.flags, r.metric
                    );
                }
            }
        }
    }
    Ok(ExitCode::Success)
}

#[derive(Serialize)]
struct GatewayRecord {
    iface: String,
    gateway: String,
}

fn run_gateway(global: &GlobalOpts) -> pv_common::Result<ExitCode> {
    let gateway = net::default_gateway_at(&global.proc_root)?;
    match global.format {
        OutputFormat::Json => {
            let records: Vec<GatewayRecord> = gateway
                .into_iter()
                .map(|(iface, gateway)| GatewayRecord { iface, gateway })
                .collect();
            emit_json(&records)?;
        }
        OutputFormat::Table => match gateway {
            Some((iface, addr)) => println!("{addr} dev {iface}"),
            None => println!("no default route"),
        },
    }
    Ok(ExitCode::Success)
}

fn run_arp(global: &GlobalOpts) -> pv_common::Result<ExitCode> {
    let records = net::neighbors_at(&global.proc_root)?;
    match global.format {
        OutputFormat::Json => emit_json(&records)?,
        OutputFormat::Table => {
            println!(
                "{:<17} {:>7} {:>6} {:<19} {}",
                "IP", "HWTYPE", "FLAGS", "MAC", "DEVICE"
            );
            for r in &records {
                println!(
                    "{:<17} {:>7} {:>6x} {:<19} {}",
                    r.ip, r.hw_type, r.flags, r.mac, r.device
                );
            }
        }
    }
    Ok(ExitCode::Success)
}

fn run_interfaces(global: &GlobalOpts) -> pv_common::Result<ExitCode> {
    let records = net::interfaces_at(&global.proc_root, &global.sys_root)?;
    match global.format {
        OutputFormat::Json => emit_json(&records)?,
        OutputFormat::Table => {
            println!(
                "{:<12} {:>14} {:>12} {:>14} {:>12} {:>5} {}",
                "NAME", "RX_BYTES", "RX_PKTS", "TX_BYTES", "TX_PKTS", "VIRT", "IPV6"
            );
            for r in &records {
                println!(
                    "{:<12} {:>14} {:>12} {:>14} {:>12} {:>5} {}",
                    r.stats.name,
                    r.stats.rx_bytes,
                    r.stats.rx_packets,
                    r.stats.tx_bytes,
                    r.stats.tx_packets,
                    if r.is_virtual { "yes" } else { "no" },
                    r.ipv6_addrs.join(",")
                );
            }
        }
    }
    Ok(ExitCode::Success)
}

fn run_processes(global: &GlobalOpts, args: &ProcessesArgs) -> pv_common::Result<ExitCode> {
    let records = match args.pid {
        Some(pid) => vec![proc::process_at(&global.proc_root, pid)?],
        None => proc::processes_at(&global.proc_root)?,
    };
    match global.format {
        OutputFormat::Json => emit_json(&records)?,
        OutputFormat::Table => {
            println!(
                "{:>8} {:>8} {:>6} {:<5} {:<16} {}",
                "PID", "PPID", "UID", "STATE", "COMM", "CMDLINE"
            );
            for r in &records {
                println!(
                    "{:>8} {:>8} {:>6} {:<5} {:<16} {}",
                    r.pid,
                    r.ppid,
                    r.uid,
                    r.state,
                    r.comm,
                    r.cmdline.join(" ")
                );
            }
        }
    }
    Ok(ExitCode::Success)
}

fn run_fds(global: &GlobalOpts, args: &FdsArgs) -> pv_common::Result<ExitCode> {
    let records = proc::fd_entries_at(&global.proc_root, args.pid)?;
    match global.format {
        OutputFormat::Json => emit_json(&records)?,
        OutputFormat::Table => {
            println!("{:>5} {:<11} {:<11} {}", "FD", "KIND", "MODE", "TARGET");
            for r in &records {
                let kind = serde_name(&r.kind);
                let mode = r.mode.map(|m| serde_name(&m)).unwrap_or_else(|| "-".into());
                println!("{:>5} {:<11} {:<11} {}", r.fd, kind, mode, fd_target(r));
            }
        }
    }
    Ok(ExitCode::Success)
}

fn run_disks(global: &GlobalOpts, args: &DisksArgs) -> pv_common::Result<ExitCode> {
    let keep: Option<Vec<String>> = if args.physical {
        Some(disk::physical_disks_at(&global.sys_root)?)
    } else if args.virtual_only {
        Some(disk::virtual_disks_at(&global.sys_root)?)
    } else {
        None
    };
    let mut records = disk::disks_at(&global.sys_root)?;
    if let Some(keep) = keep {
        records.retain(|info| keep.contains(&info.name));
    }

    match global.format {
        OutputFormat::Json => emit_json(&records)?,
        OutputFormat::Table => {
            println!(
                "{:<10} {:<8} {:>10} {:>4} {:>4} {:>4} {:>4} {:<12}",
                "NAME", "DEV", "SIZE", "RM", "RO", "ROT", "VIRT", "SCHED"
            );
            for r in &records {
                println!(
                    "{:<10} {:<8} {:>10} {:>4} {:>4} {:>4} {:>4} {:<12}",
                    r.name,
                    r.dev,
                    fmt_bytes(r.size_bytes),
                    yes_no(r.removable),
                    yes_no(r.read_only),
                    yes_no(r.rotational),
                    yes_no(r.is_virtual),
                    r.scheduler.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(ExitCode::Success)
}

#[derive(Serialize)]
struct MountRow {
    #[serde(flatten)]
    entry: disk::MountEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<disk::MountUsage>,
}

fn run_mounts(global: &GlobalOpts, args: &MountsArgs) -> pv_common::Result<ExitCode> {
    if args.usage && (args.fstab || args.not_mounted) {
        eprintln!("--usage applies to mounted filesystems only");
        return Ok(ExitCode::ArgsError);
    }

    let entries = if args.not_mounted {
        let configured = disk::fstab()?;
        let live = disk::mounts_at(&global.proc_root)?;
        disk::not_mounted(&configured, &live)
    } else if args.fstab {
        disk::fstab()?
    } else {
        disk::mounts_at(&global.proc_root)?
    };

    let rows: Vec<MountRow> = entries
        .into_iter()
        .map(|entry| {
            let usage = if args.usage {
                disk::mount_usage(&entry.target).ok()
            } else {
                None
            };
            MountRow { entry, usage }
        })
        .collect();

    match global.format {
        OutputFormat::Json => emit_json(&rows)?,
        OutputFormat::Table => {
            if args.usage {
                println!(
                    "{:<28} {:<24} {:<10} {:>10} {:>10} {:>10}",
                    "SOURCE", "TARGET", "TYPE", "TOTAL", "FREE", "AVAIL"
                );
                for row in &rows {
                    let (total, free, avail) = match row.usage {
                        Some(u) => (
                            fmt_bytes(u.total_bytes),
                            fmt_bytes(u.free_bytes),
                            fmt_bytes(u.available_bytes),
                        ),
                        None => ("-".into(), "-".into(), "-".into()),
                    };
                    println!(
                        "{:<28} {:<24} {:<10} {:>10} {:>10} {:>10}",
                        row.entry.source, row.entry.target, row.entry.fstype, total, free, avail
                    );
                }
            } else {
                println!(
                    "{:<28} {:<24} {:<10} {}",
                    "SOURCE", "TARGET", "TYPE", "OPTIONS"
                );
                for row in &rows {
                    println!(
                        "{:<28} {:<24} {:<10} {}",
                        row.entry.source, row.entry.target, row.entry.fstype, row.entry.options
                    );
                }
            }
        }
    }
    Ok(ExitCode::Success)
}

fn print_version(global: &GlobalOpts) {
    match global.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "name": "procview",
                "version": env!("CARGO_PKG_VERSION"),
                "schema_version": SCHEMA_VERSION,
            })
        ),
        OutputFormat::Table => println!(
            "procview {} (schema {})",
            env!("CARGO_PKG_VERSION"),
            SCHEMA_VERSION
        ),
    }
}

// ============================================================================
// Output helpers
// ============================================================================

fn print_connections(records: &[net::SocketConnection]) {
    println!(
        "{:<9} {:<30} {:<30} {:<12} {:<12} {:>9} {}",
        "PROTO", "LOCAL", "REMOTE", "STATE", "OWNER", "INODE", "PROCESS"
    );
    for r in records {
        let proto = format!(
            "{}{}",
            r.proto,
            match r.family {
                IpFamily::V4 => "4",
                IpFamily::V6 => "6",
            }
        );
        println!(
            "{:<9} {:<30} {:<30} {:<12} {:<12} {:>9} {}",
            proto,
            format!("{}:{}", r.local_addr, r.local_port),
            format!("{}:{}", r.remote_addr, r.remote_port),
            r.state,
            r.owner,
            r.inode,
            r.process.as_deref().unwrap_or("-")
        );
    }
}

/// Emit the standard JSON envelope around a record set.
fn emit_json<T: Serialize>(records: &[T]) -> pv_common::Result<()> {
    let envelope = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "run_id": generate_run_id(),
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "count": records.len(),
        "records": records,
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

/// Render a descriptor target back in the kernel's symlink form.
fn fd_target(entry: &proc::FdEntry) -> String {
    match entry.kind {
        proc::FdKind::Socket => format!("socket:[{}]", entry.target),
        proc::FdKind::Pipe => format!("pipe:[{}]", entry.target),
        proc::FdKind::AnonInode => format!("anon_inode:[{}]", entry.target),
        proc::FdKind::File => entry.target.clone(),
    }
}

/// Render a unit enum through its serde name (kind and mode columns).
fn serde_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "?".to_string())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn fmt_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

// ============================================================================
// Error reporting
// ============================================================================

fn report_error(global: &GlobalOpts, err: &Error) -> ExitCode {
    let use_color = !global.no_color && std::io::stderr().is_terminal();
    eprintln!("{}", format_error_human(err, use_color));
    if global.format == OutputFormat::Json {
        println!("{}", StructuredError::from(err).to_json());
    }
    exit_code_for(err)
}

fn exit_code_for(err: &Error) -> ExitCode {
    match err {
        Error::Selector(_) => ExitCode::SelectorError,
        Error::ProcessDenied { .. } => ExitCode::PermissionError,
        Error::ProcessVanished { .. } | Error::DeviceNotFound(_) => ExitCode::NotFoundError,
        Error::AddressDecode(_)
        | Error::UnknownState(_)
        | Error::UnknownTimer(_)
        | Error::FieldDecode { .. }
        | Error::ProcessParse { .. }
        | Error::DeviceAttr { .. } => ExitCode::FormatError,
        Error::Io(io_err) if io_err.kind() == std::io::ErrorKind::PermissionDenied => {
            ExitCode::PermissionError
        }
        Error::Io(_) | Error::Statvfs { .. } => ExitCode::IoError,
        Error::Json(_) | Error::UnsupportedPlatform(_) => ExitCode::InternalError,
    }
}
