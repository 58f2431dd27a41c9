use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The two independent discovery paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScanKind {
    Hosts,
    Wifi,
}

/// How a neighbor entry came to be known.
///
/// Parsing is case-insensitive and understands the localized words `arp -a` prints as well as
/// the Linux neighbor states. Anything else is [`HostOrigin::Unknown`].
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum HostOrigin {
    #[strum(
        to_string = "dynamic",
        serialize = "dynamique",
        serialize = "dynamisch",
        serialize = "dinámico",
        serialize = "dinamico",
        serialize = "dinâmico",
        serialize = "reachable",
        serialize = "stale",
        serialize = "delay",
        serialize = "probe"
    )]
    Dynamic,
    #[strum(
        to_string = "static",
        serialize = "statique",
        serialize = "statisch",
        serialize = "estático",
        serialize = "estatico",
        serialize = "statico",
        serialize = "permanent",
        serialize = "noarp"
    )]
    Static,
    #[default]
    Unknown,
}

impl HostOrigin {
    pub fn from_word(word: &str) -> Self {
        word.trim().to_lowercase().parse().unwrap_or_default()
    }
}

/// Output format of the command line front end.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, clap::ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

/// Which tool grammar the wifi strategy speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WifiTool {
    Netsh,
    Iw,
}

impl Default for WifiTool {
    fn default() -> Self {
        if cfg!(target_os = "windows") {
            WifiTool::Netsh
        } else {
            WifiTool::Iw
        }
    }
}

/// Shape of the neighbor cache listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum NeighborFormat {
    /// Windows `arp -a`: `<ip> <mac> <type>` columns.
    ArpTable,
    /// macOS and BSD `arp -a`: `? (<ip>) at <mac> on <if> [ifscope] [permanent] [ethernet]`.
    BsdArp,
    /// `ip neigh show`: `<ip> dev <if> lladdr <mac> <STATE>`.
    IpNeigh,
}

impl NeighborFormat {
    /// Layout `arp -a` prints on this platform.
    pub fn arp_listing() -> Self {
        if cfg!(any(
            target_os = "macos",
            target_os = "freebsd",
            target_os = "openbsd",
            target_os = "netbsd"
        )) {
            NeighborFormat::BsdArp
        } else {
            NeighborFormat::ArpTable
        }
    }
}

impl Default for NeighborFormat {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            NeighborFormat::IpNeigh
        } else {
            NeighborFormat::arp_listing()
        }
    }
}
