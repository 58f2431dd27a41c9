//! `iw dev` and `iw dev <iface> scan` grammar.
//!
//! `iw` prints one block per BSS, opened by an unindented `BSS <mac>(on <iface>)` line. Fields are
//! indented by one tab; the RSN and WPA elements carry their suites on lines indented by two.

use super::records::{network_name, AccessPoint, MacAddress, NetworkDefaults, HIDDEN_NETWORK};

/// Name of the first wireless interface listed by `iw dev`.
pub fn parse_iw_dev(interfaces: &str) -> Option<String> {
    interfaces
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Interface "))
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Other,
    Rsn,
    Wpa,
}

#[derive(Debug, Default)]
struct Suites {
    present: bool,
    pairwise: Option<String>,
    authentication: Option<String>,
}

#[derive(Debug)]
struct Bss {
    bssid: MacAddress,
    ssid: Option<String>,
    signal_dbm: Option<f32>,
    ds_channel: Option<u16>,
    primary_channel: Option<u16>,
    freq_mhz: Option<f32>,
    privacy: bool,
    rsn: Suites,
    wpa: Suites,
    element: Element,
}

impl Bss {
    fn new(bssid: MacAddress) -> Self {
        Self {
            bssid,
            ssid: None,
            signal_dbm: None,
            ds_channel: None,
            primary_channel: None,
            freq_mhz: None,
            privacy: false,
            rsn: Suites::default(),
            wpa: Suites::default(),
            element: Element::Other,
        }
    }

    fn suites(&mut self) -> Option<&mut Suites> {
        match self.element {
            Element::Rsn => Some(&mut self.rsn),
            Element::Wpa => Some(&mut self.wpa),
            Element::Other => None,
        }
    }

    fn field(&mut self, line: &str) {
        if let Some(value) = extract_value(line, "\t\t * ", None) {
            if let Some(ciphers) = value.strip_prefix("Pairwise ciphers: ") {
                if let Some(suites) = self.suites() {
                    suites.pairwise = Some(ciphers.trim().to_string());
                }
            } else if let Some(auth) = value.strip_prefix("Authentication suites: ") {
                if let Some(suites) = self.suites() {
                    suites.authentication = Some(auth.trim().to_string());
                }
            } else if let Some(channel) = value.strip_prefix("primary channel: ") {
                self.primary_channel = channel.trim().parse().ok();
            }
            return;
        }

        // a new top-level field closes the previous element
        self.element = Element::Other;
        if let Some(signal) = extract_value(line, "\tsignal: ", Some(" dBm")) {
            self.signal_dbm = signal.trim().parse().ok();
        } else if let Some(ssid) = extract_value(line, "\tSSID: ", None) {
            self.ssid = Some(ssid.to_string());
        } else if let Some(freq) = extract_value(line, "\tfreq: ", None) {
            self.freq_mhz = freq.trim().parse().ok();
        } else if let Some(channel) = extract_value(line, "\tDS Parameter set: channel ", None) {
            self.ds_channel = channel.trim().parse().ok();
        } else if let Some(capability) = extract_value(line, "\tcapability: ", None) {
            self.privacy = capability.split_whitespace().any(|flag| flag == "Privacy");
        } else if line.starts_with("\tRSN:") {
            self.element = Element::Rsn;
            self.rsn.present = true;
        } else if line.starts_with("\tWPA:") {
            self.element = Element::Wpa;
            self.wpa.present = true;
        }
    }

    fn into_access_point(self) -> AccessPoint {
        let network_id = match self.ssid.as_deref() {
            Some(ssid) if !is_blank_ssid(ssid) => network_name(ssid),
            _ => HIDDEN_NETWORK.to_string(),
        };
        let security = self.security();
        let mut record = AccessPoint::new(&network_id, self.bssid, &security);
        record.signal_percent = self.signal_dbm.map(dbm_to_percent).unwrap_or(0);
        record.channel = self
            .ds_channel
            .or(self.primary_channel)
            .or_else(|| self.freq_mhz.map(freq_to_channel))
            .unwrap_or(0);
        record
    }

    fn security(&self) -> NetworkDefaults {
        let (authentication, encryption) = if self.rsn.present {
            (
                auth_label("WPA2", self.rsn.authentication.as_deref()),
                self.rsn.pairwise.clone(),
            )
        } else if self.wpa.present {
            (
                auth_label("WPA", self.wpa.authentication.as_deref()),
                self.wpa.pairwise.clone(),
            )
        } else if self.privacy {
            ("WEP".to_string(), Some("WEP".to_string()))
        } else {
            ("Open".to_string(), Some("None".to_string()))
        };
        let mut defaults = NetworkDefaults {
            authentication,
            ..NetworkDefaults::default()
        };
        if let Some(encryption) = encryption {
            defaults.encryption = encryption;
        }
        defaults
    }
}

fn auth_label(generation: &str, suites: Option<&str>) -> String {
    let suites: Vec<&str> = suites.map(|s| s.split_whitespace().collect()).unwrap_or_default();
    if suites.contains(&"SAE") {
        "WPA3-Personal".to_string()
    } else if suites.contains(&"PSK") {
        format!("{generation}-Personal")
    } else if suites.contains(&"802.1X") {
        format!("{generation}-Enterprise")
    } else {
        generation.to_string()
    }
}

/// `iw` escapes non-printable bytes as `\xNN`; an SSID made only of NULs is a hidden network.
fn is_blank_ssid(ssid: &str) -> bool {
    ssid.replace("\\x00", "").trim().is_empty()
}

/// Linear map of -100 dBm..-50 dBm onto 0..100 %.
pub fn dbm_to_percent(dbm: f32) -> u8 {
    (2.0 * (dbm + 100.0)).clamp(0.0, 100.0).round() as u8
}

pub fn freq_to_channel(freq: f32) -> u16 {
    let freq = freq.round() as u32;
    let channel = match freq {
        2484 => 14,
        2412..=2472 => (freq - 2407) / 5,
        5000..=5895 => (freq - 5000) / 5,
        5955..=7115 => (freq - 5950) / 5,
        _ => 0,
    };
    channel as u16
}

fn extract_value<'a>(line: &'a str, pattern_start: &str, pattern_end: Option<&str>) -> Option<&'a str> {
    let rest = line.strip_prefix(pattern_start)?;
    match pattern_end {
        Some(end) => rest.find(end).map(|i| &rest[..i]),
        None => Some(rest),
    }
}

fn flush(bss: Option<Bss>, records: &mut Vec<AccessPoint>) {
    if let Some(bss) = bss {
        if records.iter().all(|r| r.bssid != bss.bssid) {
            records.push(bss.into_access_point());
        }
    }
}

pub fn parse_iw_scan(network_list: &str) -> Vec<AccessPoint> {
    let mut records: Vec<AccessPoint> = Vec::new();
    let mut current: Option<Bss> = None;

    for line in network_list.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(header) = line.strip_prefix("BSS ") {
            flush(current.take(), &mut records);
            let mac = header.split(['(', ' ']).next().unwrap_or_default();
            match mac.parse::<MacAddress>() {
                Ok(bssid) => current = Some(Bss::new(bssid)),
                Err(err) => tracing::trace!(%err, line, "skipping BSS block"),
            }
        } else if let Some(bss) = current.as_mut() {
            bss.field(line);
        }
    }
    flush(current, &mut records);

    tracing::debug!(records = records.len(), "parsed iw scan");
    records
}
