//! Neighbor-cache listings: Windows and BSD `arp -a`, and `ip neigh show`.

use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use std::net::Ipv4Addr;

use super::records::{HostRecord, MacAddress};
use crate::enums::{HostOrigin, NeighborFormat};

lazy_static! {
    static ref ARP_ENTRY: Regex = Regex::new(
        r"(?i)(\d{1,3}(?:\.\d{1,3}){3})\s+([0-9a-f]{2}(?:[:-][0-9a-f]{2}){5})\s+(\w+)"
    )
    .expect("valid pattern");
    static ref BSD_ARP_ENTRY: Regex = Regex::new(
        r"(?i)\((\d{1,3}(?:\.\d{1,3}){3})\)\s+at\s+([0-9a-f]{1,2}(?::[0-9a-f]{1,2}){5})\s*(.*)$"
    )
    .expect("valid pattern");
}

pub fn parse_neighbors(text: &str, format: NeighborFormat) -> Vec<HostRecord> {
    let records = text.lines().filter_map(|line| match format {
        NeighborFormat::ArpTable => parse_arp_line(line),
        NeighborFormat::BsdArp => parse_bsd_arp_line(line),
        NeighborFormat::IpNeigh => parse_ip_neigh_line(line),
    });
    records.unique_by(|r| r.address).collect()
}

/// `  192.168.1.5           aa-bb-cc-dd-ee-ff     dynamic`
fn parse_arp_line(line: &str) -> Option<HostRecord> {
    let caps = ARP_ENTRY.captures(line)?;
    let address: Ipv4Addr = caps[1].parse().ok()?;
    let hardware_id: MacAddress = caps[2].parse().ok()?;
    Some(HostRecord::new(
        address,
        hardware_id,
        HostOrigin::from_word(&caps[3]),
    ))
}

/// `? (192.168.1.40) at 0:1a:2b:3c:4d:5e on en0 ifscope [ethernet]`
///
/// BSD drops leading zeros from each octet. Entries marked `permanent` are static, the rest are
/// dynamic; `(incomplete)` entries never match.
fn parse_bsd_arp_line(line: &str) -> Option<HostRecord> {
    let caps = BSD_ARP_ENTRY.captures(line)?;
    let address: Ipv4Addr = caps[1].parse().ok()?;
    let hardware_id = unpadded_mac(&caps[2])?;
    let origin = caps[3]
        .split_whitespace()
        .map(HostOrigin::from_word)
        .find(|origin| *origin == HostOrigin::Static)
        .unwrap_or(HostOrigin::Dynamic);
    Some(HostRecord::new(address, hardware_id, origin))
}

fn unpadded_mac(text: &str) -> Option<MacAddress> {
    let mut octets = [0u8; 6];
    let mut parts = text.split(':');
    for octet in octets.iter_mut() {
        *octet = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    parts.next().is_none().then_some(MacAddress(octets))
}

/// `192.168.1.1 dev wlp2s0 lladdr a4:91:b1:12:34:56 router REACHABLE`
///
/// Entries without a link-layer address (FAILED, INCOMPLETE) and IPv6 neighbors are skipped.
fn parse_ip_neigh_line(line: &str) -> Option<HostRecord> {
    let mut tokens = line.split_whitespace();
    let address: Ipv4Addr = tokens.next()?.parse().ok()?;
    let rest: Vec<&str> = tokens.collect();
    let lladdr = rest.iter().position(|t| *t == "lladdr")?;
    let hardware_id: MacAddress = rest.get(lladdr + 1)?.parse().ok()?;
    let state = rest.last().copied().unwrap_or_default();
    Some(HostRecord::new(
        address,
        hardware_id,
        HostOrigin::from_word(state),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::codepage::CodePage;
    use crate::scan::process::decode;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn summary(records: &[HostRecord]) -> Vec<(String, String, String)> {
        records
            .iter()
            .map(|r| {
                (
                    r.address.to_string(),
                    r.hardware_id.to_string(),
                    r.origin.to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn arp_line_scenario() {
        let records = parse_neighbors(
            "192.168.1.5 aa:bb:cc:dd:ee:ff dynamic",
            NeighborFormat::ArpTable,
        );
        assert_eq!(
            records,
            vec![HostRecord::new(
                Ipv4Addr::new(192, 168, 1, 5),
                "aa:bb:cc:dd:ee:ff".parse().unwrap(),
                HostOrigin::Dynamic,
            )]
        );
        assert_eq!(records[0].origin.to_string(), "dynamic");
    }

    #[test]
    fn windows_arp_table() {
        let text = fs::read_to_string("tests/fixtures/neighbors/arp_en.txt").unwrap();
        let records = parse_neighbors(&text, NeighborFormat::ArpTable);
        assert_eq!(
            summary(&records),
            vec![
                ("192.168.1.1".into(), "a4:91:b1:12:34:56".into(), "dynamic".into()),
                ("192.168.1.5".into(), "aa:bb:cc:dd:ee:ff".into(), "dynamic".into()),
                ("192.168.1.40".into(), "00:1a:2b:3c:4d:5e".into(), "dynamic".into()),
                ("192.168.1.255".into(), "ff:ff:ff:ff:ff:ff".into(), "static".into()),
                ("224.0.0.22".into(), "01:00:5e:00:00:16".into(), "static".into()),
            ]
        );
    }

    #[test]
    fn localized_arp_table() {
        let bytes = fs::read("tests/fixtures/neighbors/arp_fr_cp850.txt").unwrap();
        let text = decode(&bytes, CodePage::Cp850).unwrap();
        let records = parse_neighbors(&text, NeighborFormat::ArpTable);
        let origins: Vec<_> = records.iter().map(|r| r.origin).collect();
        assert_eq!(
            origins,
            vec![HostOrigin::Dynamic, HostOrigin::Dynamic, HostOrigin::Static]
        );
    }

    #[test]
    fn bsd_arp_table() {
        let text = fs::read_to_string("tests/fixtures/neighbors/arp_bsd.txt").unwrap();
        let records = parse_neighbors(&text, NeighborFormat::BsdArp);
        assert_eq!(
            summary(&records),
            vec![
                ("192.168.1.1".into(), "a4:91:b1:12:34:56".into(), "dynamic".into()),
                ("192.168.1.40".into(), "00:1a:2b:3c:4d:5e".into(), "dynamic".into()),
                ("192.168.1.2".into(), "00:1a:2b:3c:4d:60".into(), "static".into()),
                ("192.168.1.255".into(), "ff:ff:ff:ff:ff:ff".into(), "dynamic".into()),
                ("224.0.0.251".into(), "01:00:5e:00:00:fb".into(), "static".into()),
            ]
        );
    }

    #[test]
    fn bsd_lines_are_not_windows_columns() {
        let line = "? (192.168.1.1) at a4:91:b1:12:34:56 on en0 ifscope [ethernet]";
        assert!(parse_neighbors(line, NeighborFormat::ArpTable).is_empty());
        assert_eq!(parse_neighbors(line, NeighborFormat::BsdArp).len(), 1);
        assert!(unpadded_mac("0:1a:2b:3c:4d").is_none());
        assert!(unpadded_mac("0:1a:2b:3c:4d:5e:6f").is_none());
    }

    #[test]
    fn linux_neighbor_table() {
        let text = fs::read_to_string("tests/fixtures/neighbors/ip_neigh.txt").unwrap();
        let records = parse_neighbors(&text, NeighborFormat::IpNeigh);
        assert_eq!(
            summary(&records),
            vec![
                ("192.168.1.1".into(), "a4:91:b1:12:34:56".into(), "dynamic".into()),
                ("192.168.1.40".into(), "00:1a:2b:3c:4d:5e".into(), "dynamic".into()),
                ("192.168.1.50".into(), "00:1a:2b:3c:4d:60".into(), "dynamic".into()),
                ("192.168.1.60".into(), "00:1a:2b:3c:4d:61".into(), "static".into()),
            ]
        );
    }

    #[test]
    fn unknown_type_words_are_kept() {
        let records = parse_neighbors("10.0.0.3  00-11-22-33-44-55  other", NeighborFormat::ArpTable);
        assert_eq!(records[0].origin, HostOrigin::Unknown);
    }

    #[test]
    fn out_of_range_addresses_are_dropped() {
        let records = parse_neighbors("300.1.1.1 00-11-22-33-44-55 dynamic", NeighborFormat::ArpTable);
        assert!(records.is_empty());
    }
}
