use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::enums::{OutputFormat, ScanKind};
use crate::utils::version;

#[derive(Parser, Debug)]
#[command(author, version = version(), about)]
pub struct Cli {
    /// Mirror log events to stderr
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(short, long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Repeat the scan every SECS seconds until interrupted
    #[arg(short, long, value_name = "SECS")]
    pub watch: Option<u64>,

    /// Write the wifi parser's decisions to PATH
    #[arg(long, value_name = "PATH")]
    pub parser_trace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Discover live hosts on the local /24 network
    Hosts,
    /// List visible WiFi access points
    Wifi,
    /// Run both scans
    All,
    /// Parse a saved netsh or iw dump instead of scanning
    Parse {
        file: PathBuf,
        /// Treat the dump as `iw dev <iface> scan` output
        #[arg(long)]
        iw: bool,
    },
}

impl Command {
    /// Scan kinds the command runs; empty for offline parsing.
    pub fn scan_kinds(&self) -> Vec<ScanKind> {
        match self {
            Command::Hosts => vec![ScanKind::Hosts],
            Command::Wifi => vec![ScanKind::Wifi],
            Command::All => vec![ScanKind::Hosts, ScanKind::Wifi],
            Command::Parse { .. } => Vec::new(),
        }
    }
}
