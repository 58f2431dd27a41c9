//! Discovery engine.
//!
//! Two independent discovery paths share one toolbox:
//!
//! * [`HostDiscovery`] sweeps the local /24 with ARP and falls back to the OS neighbor cache, then
//!   resolves host names with a bounded [`ResolutionPool`].
//! * [`WifiDiscovery`] runs `netsh` or `iw` through a [`ProcessRunner`] and parses the listing into
//!   [`AccessPoint`] records.
//!
//! A [`ScanSession`] drives either one: it admits a single pass at a time, cancels it on request
//! and reports the result through a [`ScanTicket`].

pub mod arp;
pub mod codepage;
pub mod discovery;
pub mod error;
pub mod iw_parser;
pub mod keywords;
pub mod neighbor_parser;
pub mod process;
pub mod records;
pub mod resolver;
pub mod session;
pub mod vendor;
pub mod wifi;
pub mod wifi_parser;

pub use discovery::HostDiscovery;
pub use error::{ProcessError, ScanError};
pub use process::{CommandRunner, CommandSpec, ProcessRunner};
pub use records::{AccessPoint, HostRecord, MacAddress};
pub use resolver::ResolutionPool;
pub use session::{ScanReport, ScanSession, ScanState, ScanTicket, Strategy};
pub use wifi::WifiDiscovery;

/// What a strategy hands back from one pass: whatever it found plus the fault it hit, if any.
#[derive(Debug)]
pub struct ScanOutcome<T> {
    pub records: Vec<T>,
    pub fault: Option<ScanError>,
}

impl<T> ScanOutcome<T> {
    pub fn ok(records: Vec<T>) -> Self {
        Self {
            records,
            fault: None,
        }
    }

    pub fn failed(fault: ScanError) -> Self {
        Self {
            records: Vec::new(),
            fault: Some(fault),
        }
    }
}
