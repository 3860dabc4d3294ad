//! Connection state and timer catalogs.
//!
//! Socket tables report state as a two-digit hex code. The code set is
//! closed; a code outside it means the kernel grew a table format this
//! build does not understand, which is a hard decode error rather than
//! something to guess at.

use serde::{Deserialize, Serialize};

use pv_common::{Error, Result};

/// Symbolic connection states for the kernel codes 01 through 0B.
///
/// UDP sockets reuse the same code column, typically reporting 07 (CLOSE)
/// for unconnected sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TcpState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
}

impl TcpState {
    /// Map a two-digit hex state code to its symbolic state.
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "01" => Ok(TcpState::Established),
            "02" => Ok(TcpState::SynSent),
            "03" => Ok(TcpState::SynRecv),
            "04" => Ok(TcpState::FinWait1),
            "05" => Ok(TcpState::FinWait2),
            "06" => Ok(TcpState::TimeWait),
            "07" => Ok(TcpState::Close),
            "08" => Ok(TcpState::CloseWait),
            "09" => Ok(TcpState::LastAck),
            "0A" => Ok(TcpState::Listen),
            "0B" => Ok(TcpState::Closing),
            other => Err(Error::UnknownState(other.to_string())),
        }
    }

    /// The kernel hex code for this state.
    pub fn code(&self) -> &'static str {
        match self {
            TcpState::Established => "01",
            TcpState::SynSent => "02",
            TcpState::SynRecv => "03",
            TcpState::FinWait1 => "04",
            TcpState::FinWait2 => "05",
            TcpState::TimeWait => "06",
            TcpState::Close => "07",
            TcpState::CloseWait => "08",
            TcpState::LastAck => "09",
            TcpState::Listen => "0A",
            TcpState::Closing => "0B",
        }
    }

    /// The symbolic name, as rendered in tables and JSON.
    pub fn name(&self) -> &'static str {
        match self {
            TcpState::Established => "ESTABLISHED",
            TcpState::SynSent => "SYN_SENT",
            TcpState::SynRecv => "SYN_RECV",
            TcpState::FinWait1 => "FIN_WAIT1",
            TcpState::FinWait2 => "FIN_WAIT2",
            TcpState::TimeWait => "TIME_WAIT",
            TcpState::Close => "CLOSE",
            TcpState::CloseWait => "CLOSE_WAIT",
            TcpState::LastAck => "LAST_ACK",
            TcpState::Listen => "LISTEN",
            TcpState::Closing => "CLOSING",
        }
    }
}

impl std::fmt::Display for TcpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Active timer kinds for the `tr` column of a socket table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    None,
    Retransmit,
    Other,
    Timewait,
    Probe,
}

impl TimerKind {
    /// Map the kernel's numeric timer code. Codes above 4 are unknown.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(TimerKind::None),
            1 => Ok(TimerKind::Retransmit),
            2 => Ok(TimerKind::Other),
            3 => Ok(TimerKind::Timewait),
            4 => Ok(TimerKind::Probe),
            other => Err(Error::UnknownTimer(other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimerKind::None => "none",
            TimerKind::Retransmit => "retransmit",
            TimerKind::Other => "other",
            TimerKind::Timewait => "timewait",
            TimerKind::Probe => "probe",
        }
    }
}

impl std::fmt::Display for TimerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
