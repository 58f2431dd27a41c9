//! `netsh wlan show networks mode=bssid` grammar.
//!
//! The listing looks like this (field names vary with the OS language, padding varies with the
//! Windows build):
//!
//! ```text
//! SSID 1 : HomeNet
//!     Network type            : Infrastructure
//!     Authentication          : WPA2-Personal
//!     Encryption              : CCMP
//!     BSSID 1                 : aa:bb:cc:dd:ee:ff
//!          Signal             : 87%
//!          Radio type         : 802.11ac
//!          Channel            : 36
//!     BSSID 2                 : ...
//! ```
//!
//! [`WifiGrammar::parse`] walks it once, line by line. A network header opens a block and resets
//! the security defaults; every access point header inside the block emits one [`AccessPoint`]
//! that inherits those defaults; signal and channel lines update the access point opened last.
//! Nothing in here fails: unknown lines are dropped and bad numbers become zero.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use super::keywords::{Field, KeywordTable, Locales};
use super::records::{digits_or_zero, network_name, AccessPoint, MacAddress, NetworkDefaults};

lazy_static! {
    static ref MAC_TOKEN: Regex =
        Regex::new(r"^([0-9A-Fa-f]{2}(?:[:-][0-9A-Fa-f]{2}){5})\b").expect("valid pattern");
}

/// What the parser did with a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceKind {
    Network(String),
    AccessPoint(MacAddress),
    Attribute(&'static str),
    /// The line fit no rule and was dropped.
    Anomaly(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// 1-based line number in the source text.
    pub line: usize,
    pub text: String,
    pub kind: TraceKind,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, detail) = match &self.kind {
            TraceKind::Network(id) => ("network", format!("{id:?}")),
            TraceKind::AccessPoint(bssid) => ("bssid", bssid.to_string()),
            TraceKind::Attribute(name) => (*name, format!("{:?}", self.text)),
            TraceKind::Anomaly(reason) => ("dropped", format!("{:?} ({reason})", self.text)),
        };
        write!(f, "{:>5} {label:<14} {detail}", self.line)
    }
}

/// Receives a record of every parsing decision.
pub trait ParseTrace {
    fn event(&mut self, event: TraceEvent);
}

impl ParseTrace for () {
    fn event(&mut self, _event: TraceEvent) {}
}

impl ParseTrace for Vec<TraceEvent> {
    fn event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

#[derive(Debug, Clone, Default)]
pub struct WifiGrammar {
    keywords: KeywordTable,
}

impl WifiGrammar {
    pub fn new(locales: &Locales) -> Result<Self, regex::Error> {
        Ok(Self {
            keywords: KeywordTable::new(locales)?,
        })
    }

    pub fn parse(&self, text: &str) -> Vec<AccessPoint> {
        self.parse_traced(text, &mut ())
    }

    pub fn parse_traced(&self, text: &str, trace: &mut dyn ParseTrace) -> Vec<AccessPoint> {
        let kw = &self.keywords;
        let mut records: Vec<AccessPoint> = Vec::new();
        let mut network: Option<String> = None;
        let mut defaults = NetworkDefaults::default();
        let mut active: Option<usize> = None;
        let mut anomalies = 0usize;

        let mut note = |line: usize, text: &str, kind: TraceKind| {
            if let TraceKind::Anomaly(reason) = kind {
                anomalies += 1;
                tracing::trace!(line, text, reason, "parse anomaly");
            }
            trace.event(TraceEvent {
                line,
                text: text.to_string(),
                kind,
            });
        };

        let text = text.replace("\r\n", "\n");
        for (index, raw) in text.split(['\r', '\n']).enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                note(line_no, line, TraceKind::Anomaly("no key/value separator"));
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            if kw.is(Field::Network, key) {
                let name = network_name(value);
                note(line_no, line, TraceKind::Network(name.clone()));
                network = Some(name);
                defaults = NetworkDefaults::default();
                active = None;
                continue;
            }

            let Some(current) = network.as_deref() else {
                note(line_no, line, TraceKind::Anomaly("outside any network block"));
                continue;
            };

            if kw.is(Field::Authentication, key) {
                defaults.authentication = value.to_string();
                note(line_no, line, TraceKind::Attribute("authentication"));
                continue;
            }
            if kw.is(Field::Encryption, key) {
                defaults.encryption = value.to_string();
                note(line_no, line, TraceKind::Attribute("encryption"));
                continue;
            }

            if kw.is(Field::AccessPoint, key) {
                let bssid = MAC_TOKEN
                    .captures(value)
                    .and_then(|c| c[1].parse::<MacAddress>().ok());
                match bssid {
                    Some(bssid) if records.iter().any(|r| r.bssid == bssid) => {
                        active = None;
                        note(line_no, line, TraceKind::Anomaly("duplicate access point"));
                    }
                    Some(bssid) => {
                        records.push(AccessPoint::new(current, bssid, &defaults));
                        active = Some(records.len() - 1);
                        note(line_no, line, TraceKind::AccessPoint(bssid));
                    }
                    None => {
                        active = None;
                        note(line_no, line, TraceKind::Anomaly("access point without address"));
                    }
                }
                continue;
            }

            let Some(record) = active
                .map(|i| &mut records[i])
                .filter(|r| r.network_id == current)
            else {
                note(line_no, line, TraceKind::Anomaly("no access point open"));
                continue;
            };

            if kw.is(Field::Signal, key) {
                record.signal_percent = digits_or_zero::<u32>(value).min(100) as u8;
                note(line_no, line, TraceKind::Attribute("signal"));
            } else if kw.is(Field::Channel, key) {
                record.channel = digits_or_zero(value);
                note(line_no, line, TraceKind::Attribute("channel"));
            } else {
                note(line_no, line, TraceKind::Anomaly("unrecognised field"));
            }
        }

        tracing::debug!(records = records.len(), anomalies, "parsed netsh listing");
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::records::{HIDDEN_NETWORK, UNKNOWN_VALUE};
    use pretty_assertions::assert_eq;
    use std::fs;

    fn ap(network: &str, bssid: &str, auth: &str, enc: &str, signal: u8, channel: u16) -> AccessPoint {
        AccessPoint {
            network_id: network.to_string(),
            bssid: bssid.parse().unwrap(),
            authentication: auth.to_string(),
            encryption: enc.to_string(),
            signal_percent: signal,
            channel,
        }
    }

    #[test]
    fn single_network_scenario() {
        let text = "SSID 1 : HomeNet\nAuthentication : WPA2-Personal\nBSSID 1 : aa-bb-cc-dd-ee-ff\nSignal : 87%\n";
        let records = WifiGrammar::default().parse(text);
        assert_eq!(
            records,
            vec![ap("HomeNet", "aa:bb:cc:dd:ee:ff", "WPA2-Personal", "Unknown", 87, 0)]
        );
        assert_eq!(records[0].bssid.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn blank_ssid_is_hidden() {
        let text = "SSID 2 :    \nBSSID 1 : 00:11:22:33:44:55\n";
        let records = WifiGrammar::default().parse(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].network_id, HIDDEN_NETWORK);
    }

    #[test]
    fn access_points_before_any_header_are_dropped() {
        let text = "BSSID 1 : 00:11:22:33:44:55\nSignal : 50%\nSSID 1 : Cafe\nBSSID 1 : 00:11:22:33:44:66\n";
        let records = WifiGrammar::default().parse(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].network_id, "Cafe");
        assert_eq!(records[0].signal_percent, 0);
    }

    #[test]
    fn defaults_reset_per_network() {
        let text = "\
SSID 1 : Secure
    Authentication : WPA3-Personal
    Encryption : GCMP
    BSSID 1 : 00:00:00:00:00:01
SSID 2 : Plain
    BSSID 1 : 00:00:00:00:00:02
";
        let records = WifiGrammar::default().parse(text);
        assert_eq!(records[0].authentication, "WPA3-Personal");
        assert_eq!(records[0].encryption, "GCMP");
        assert_eq!(records[1].authentication, "Unknown");
        assert_eq!(records[1].encryption, "Unknown");
    }

    #[test]
    fn attributes_never_leak_into_the_next_block() {
        let text = "\
SSID 1 : Same
    BSSID 1 : 00:00:00:00:00:01
         Signal : 40%
SSID 2 : Same
         Signal : 99%
         Channel : 11
";
        let records = WifiGrammar::default().parse(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].signal_percent, 40);
        assert_eq!(records[0].channel, 0);
    }

    #[test]
    fn malformed_numbers_become_zero_and_parsing_goes_on() {
        let text = "\
SSID 1 : Lab
    BSSID 1 : 00:00:00:00:00:01
         Signal : strong
         Channel : n/a
    BSSID 2 : 00:00:00:00:00:02
         Signal : 61%
         Channel : 6
";
        let records = WifiGrammar::default().parse(text);
        assert_eq!(records[0].signal_percent, 0);
        assert_eq!(records[0].channel, 0);
        assert_eq!(records[1].signal_percent, 61);
        assert_eq!(records[1].channel, 6);
    }

    #[test]
    fn channel_utilization_does_not_override_channel() {
        let text = "\
SSID 1 : Office
    BSSID 1 : 00:00:00:00:00:01
         Channel : 36
         Channel Utilization: 25 (9 %)
";
        let records = WifiGrammar::default().parse(text);
        assert_eq!(records[0].channel, 36);
    }

    #[test]
    fn colons_in_network_names_survive() {
        let records = WifiGrammar::default().parse("SSID 1 : a:b:c\nBSSID 1 : 00:00:00:00:00:01");
        assert_eq!(records[0].network_id, "a:b:c");
    }

    #[test]
    fn duplicate_bssids_are_kept_once() {
        let text = "\
SSID 1 : One
    BSSID 1 : 00:00:00:00:00:01
         Signal : 10%
    BSSID 2 : 00-00-00-00-00-01
         Signal : 90%
";
        let records = WifiGrammar::default().parse(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].signal_percent, 10);
    }

    #[test]
    fn reparsing_is_idempotent() {
        let text = fs::read_to_string("tests/fixtures/netsh/netsh_en.txt").unwrap();
        let grammar = WifiGrammar::default();
        assert_eq!(grammar.parse(&text), grammar.parse(&text));
    }

    #[test]
    fn parses_english_fixture() {
        let text = fs::read_to_string("tests/fixtures/netsh/netsh_en.txt").unwrap();
        let records = WifiGrammar::default().parse(&text);
        assert_eq!(
            records,
            vec![
                ap("Vodafone Hotspot", "ab:cd:ef:01:23:45", "Open", "None", 16, 6),
                ap("Vodafone Hotspot", "ab:cd:ef:01:23:46", "Open", "None", 54, 6),
                ap("EdaBox", "ab:cd:ef:01:23:47", "WPA2-Personal", "CCMP", 36, 11),
                ap(HIDDEN_NETWORK, "ab:cd:ef:01:23:48", "WPA2-Personal", "CCMP", 100, 1),
                ap("FRITZ!Box 2345 Cable", "ab:cd:ef:01:23:49", "WPA3-Personal", "GCMP", 88, 44),
            ]
        );
    }

    #[test]
    fn parses_french_cp850_fixture() {
        let bytes = fs::read("tests/fixtures/netsh/netsh_fr_cp850.txt").unwrap();
        let text = crate::scan::process::decode(&bytes, crate::scan::codepage::CodePage::Cp850)
            .unwrap();
        let records = WifiGrammar::default().parse(&text);
        assert_eq!(
            records,
            vec![
                ap("Livebox-Café", "10:20:30:40:50:60", "WPA2 - Personnel", "CCMP", 92, 1),
                ap("Livebox-Café", "10:20:30:40:50:61", "WPA2 - Personnel", "CCMP", 40, 36),
            ]
        );
    }

    #[test]
    fn trace_reports_every_decision() {
        let text = "Garbage\nSSID 1 : Net\nNetwork type : Infrastructure\nBSSID 1 : 00:00:00:00:00:01\nSignal : 5%";
        let mut trace: Vec<TraceEvent> = Vec::new();
        WifiGrammar::default().parse_traced(text, &mut trace);
        let kinds: Vec<_> = trace.iter().map(|e| (e.line, e.kind.clone())).collect();
        assert_eq!(
            kinds,
            vec![
                (1, TraceKind::Anomaly("no key/value separator")),
                (2, TraceKind::Network("Net".to_string())),
                (3, TraceKind::Anomaly("no access point open")),
                (4, TraceKind::AccessPoint("00:00:00:00:00:01".parse().unwrap())),
                (5, TraceKind::Attribute("signal")),
            ]
        );
    }

    #[test]
    fn trace_lines_are_readable() {
        let text = "SSID 1 : Net\r\nBSSID 1 : 00:00:00:00:00:01\r\nColour : blue\r\n";
        let mut trace: Vec<TraceEvent> = Vec::new();
        WifiGrammar::default().parse_traced(text, &mut trace);
        let lines: Vec<_> = trace.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "    1 network        \"Net\"",
                "    2 bssid          00:00:00:00:00:01",
                "    3 dropped        \"Colour : blue\" (unrecognised field)",
            ]
        );
    }

    #[test]
    fn nbsp_residue_keeps_the_block() {
        let text = "SSID 1 \u{fffd}: HomeNet\nAuthentication\u{fffd}: WPA2-Personal\n\
                    BSSID 1 \u{fffd}: aa-bb-cc-dd-ee-ff\nSignal\u{fffd}: 87%\n\
                    Channel Utilization\u{fffd}: 12 (4 %)\n";
        assert_eq!(
            WifiGrammar::default().parse(text),
            vec![ap("HomeNet", "aa:bb:cc:dd:ee:ff", "WPA2-Personal", UNKNOWN_VALUE, 87, 0)]
        );
    }

    #[test]
    fn any_line_ending() {
        let text = "SSID 1 : A\r\nBSSID 1 : 00:00:00:00:00:01\rSignal : 70%\n";
        let records = WifiGrammar::default().parse(text);
        assert_eq!(records[0].signal_percent, 70);
    }
}
