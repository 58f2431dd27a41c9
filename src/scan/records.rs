use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::enums::HostOrigin;

/// Network id used for access points that broadcast an empty SSID.
pub const HIDDEN_NETWORK: &str = "<Hidden>";

/// Placeholder for authentication/encryption values the tool never printed.
pub const UNKNOWN_VALUE: &str = "Unknown";

/// Name recorded when a reverse lookup fails or times out.
pub const UNKNOWN_NAME: &str = "Unknown";

/// A 48-bit hardware address.
///
/// Accepts `aa:bb:cc:dd:ee:ff` and `AA-BB-CC-DD-EE-FF`; always prints the colon-separated
/// lowercase form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hardware address `{0}`")]
pub struct InvalidMac(String);

impl FromStr for MacAddress {
    type Err = InvalidMac;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bytes = s.as_bytes();
        if bytes.len() != 17 || !s.is_ascii() {
            return Err(InvalidMac(s.to_string()));
        }
        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            let start = i * 3;
            if i > 0 && !matches!(bytes[start - 1], b':' | b'-') {
                return Err(InvalidMac(s.to_string()));
            }
            if !bytes[start..start + 2].iter().all(u8::is_ascii_hexdigit) {
                return Err(InvalidMac(s.to_string()));
            }
            *octet = u8::from_str_radix(&s[start..start + 2], 16)
                .map_err(|_| InvalidMac(s.to_string()))?;
        }
        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<pnet::util::MacAddr> for MacAddress {
    fn from(mac: pnet::util::MacAddr) -> Self {
        MacAddress([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5])
    }
}

/// A live host on the local network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRecord {
    pub address: Ipv4Addr,
    pub hardware_id: MacAddress,
    pub origin: HostOrigin,
    pub name: Option<String>,
    pub vendor: Option<String>,
}

impl HostRecord {
    pub fn new(address: Ipv4Addr, hardware_id: MacAddress, origin: HostOrigin) -> Self {
        Self {
            address,
            hardware_id,
            origin,
            name: None,
            vendor: None,
        }
    }
}

/// One physical radio endpoint. Several may share a `network_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessPoint {
    pub network_id: String,
    pub bssid: MacAddress,
    pub authentication: String,
    pub encryption: String,
    pub signal_percent: u8,
    pub channel: u16,
}

/// Security settings a network header hands down to its access points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDefaults {
    pub authentication: String,
    pub encryption: String,
}

impl Default for NetworkDefaults {
    fn default() -> Self {
        Self {
            authentication: UNKNOWN_VALUE.to_string(),
            encryption: UNKNOWN_VALUE.to_string(),
        }
    }
}

impl AccessPoint {
    pub fn new(network_id: &str, bssid: MacAddress, defaults: &NetworkDefaults) -> Self {
        Self {
            network_id: network_id.to_string(),
            bssid,
            authentication: defaults.authentication.clone(),
            encryption: defaults.encryption.clone(),
            signal_percent: 0,
            channel: 0,
        }
    }
}

/// Maps an empty (after trimming) broadcast identifier to [`HIDDEN_NETWORK`].
pub fn network_name(raw: &str) -> String {
    let name = raw.trim();
    if name.is_empty() {
        HIDDEN_NETWORK.to_string()
    } else {
        name.to_string()
    }
}

/// Keeps the digits of `value` and parses them, falling back to zero.
pub fn digits_or_zero<T: FromStr + Default>(value: &str) -> T {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or_default()
}
