//! Messages flowing through the application loop.
//!
//! ```text
//! watch tick / start ──▶ Action::Scan(kind)
//!                             │
//!                             ▼
//!                  ScanSession::start → ScanTicket
//!                             │
//!              ┌──────────────┴──────────────┐
//!              ▼                             ▼
//!   Action::HostsReady(report)    Action::WifiReady(report)
//!              │                             │
//!              └──────────▶ export ◀─────────┘
//! ```
//!
//! Scan tasks never touch stdout; they report back through the channel and the loop prints.

use crate::enums::ScanKind;
use crate::scan::{AccessPoint, HostRecord, ScanReport};

#[derive(Debug, Clone)]
pub enum Action {
    /// Start a pass of the given kind
    Scan(ScanKind),
    HostsReady(ScanReport<HostRecord>),
    WifiReady(ScanReport<AccessPoint>),
    /// A pass ended without a report
    ScanFailed(ScanKind, String),
    /// Watch interval elapsed
    Tick,
    /// Request graceful shutdown
    Quit,
    /// Fatal error, print it and quit
    Error(String),
}

impl Action {
    /// Scan kind a result message belongs to.
    pub fn finished_kind(&self) -> Option<ScanKind> {
        match self {
            Action::HostsReady(_) => Some(ScanKind::Hosts),
            Action::WifiReady(_) => Some(ScanKind::Wifi),
            Action::ScanFailed(kind, _) => Some(*kind),
            _ => None,
        }
    }
}
