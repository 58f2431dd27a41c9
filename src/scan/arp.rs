//! Active ARP sweep over the local /24.

use async_trait::async_trait;
use cidr::Ipv4Cidr;
use ipnetwork::IpNetwork;
use pnet::datalink::{self, Channel, DataLinkReceiver, DataLinkSender, NetworkInterface};
use pnet::packet::{
    arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket},
    ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket},
    MutablePacket, Packet,
};
use pnet::util::MacAddr;
use std::io;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::discovery::HostProbe;
use super::error::ScanError;
use super::records::HostRecord;
use crate::enums::HostOrigin;
use crate::privilege;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(2);

const FRAME_LEN: usize = 42;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Broadcasts one ARP request per target address, then collects replies until the window closes.
#[derive(Debug, Clone)]
pub struct ArpProbe {
    window: Duration,
}

impl ArpProbe {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

impl Default for ArpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[async_trait]
impl HostProbe for ArpProbe {
    fn name(&self) -> &'static str {
        "arp"
    }

    async fn probe(
        &self,
        target: Ipv4Cidr,
        local: Ipv4Addr,
        cancel: &CancellationToken,
    ) -> Result<Vec<HostRecord>, ScanError> {
        let window = self.window;
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || sweep(target, local, window, &cancel))
            .await
            .map_err(|e| ScanError::Task(e.to_string()))?
    }
}

/// The interface that carries `local`.
fn interface_for(local: Ipv4Addr) -> Option<NetworkInterface> {
    datalink::interfaces().into_iter().find(|iface| {
        iface.is_up()
            && !iface.is_loopback()
            && iface
                .ips
                .iter()
                .any(|net| matches!(net, IpNetwork::V4(v4) if v4.ip() == local))
    })
}

fn open_channel(
    iface: &NetworkInterface,
) -> Result<(Box<dyn DataLinkSender>, Box<dyn DataLinkReceiver>), ScanError> {
    let config = datalink::Config {
        read_timeout: Some(POLL_INTERVAL),
        ..Default::default()
    };
    match datalink::channel(iface, config) {
        Ok(Channel::Ethernet(tx, rx)) => Ok((tx, rx)),
        Ok(_) => Err(ScanError::Probe(format!(
            "unsupported channel type on {}",
            iface.name
        ))),
        Err(e) => {
            let message = privilege::datalink_error_message(&e, &iface.name);
            if privilege::is_permission_error(&e) {
                tracing::warn!("{message}");
            }
            Err(ScanError::Probe(message))
        }
    }
}

fn sweep(
    target: Ipv4Cidr,
    local: Ipv4Addr,
    window: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<HostRecord>, ScanError> {
    let iface = interface_for(local)
        .ok_or_else(|| ScanError::Probe(format!("no interface carries {local}")))?;
    let source_mac = iface
        .mac
        .ok_or_else(|| ScanError::Probe(format!("{} has no hardware address", iface.name)))?;
    let (mut sender, mut receiver) = open_channel(&iface)?;

    let network = target.first_address();
    let broadcast = target.last_address();
    let mut sent = 0usize;
    for address in target.iter().map(|inet| inet.address()) {
        if address == local || address == network || address == broadcast {
            continue;
        }
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        let frame = request_frame(source_mac, local, address);
        match sender.send_to(&frame, None) {
            Some(Ok(())) => sent += 1,
            Some(Err(e)) => tracing::debug!(%address, error = %e, "ARP request not sent"),
            None => {}
        }
    }
    tracing::debug!(interface = %iface.name, sent, %target, "ARP requests sent");

    let deadline = Instant::now() + window;
    let mut records: Vec<HostRecord> = Vec::new();
    while Instant::now() < deadline {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        match receiver.next() {
            Ok(frame) => {
                let Some((address, mac)) = parse_reply(frame, source_mac, &target) else {
                    continue;
                };
                if records.iter().all(|r| r.address != address) {
                    records.push(HostRecord::new(address, mac.into(), HostOrigin::Dynamic));
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Err(e) => {
                tracing::warn!(error = %e, "ARP receive failed, keeping {} replies", records.len());
                break;
            }
        }
    }
    Ok(records)
}

fn request_frame(source_mac: MacAddr, source_ip: Ipv4Addr, target_ip: Ipv4Addr) -> [u8; FRAME_LEN] {
    let mut ethernet_buffer = [0u8; FRAME_LEN];
    let mut arp_buffer = [0u8; FRAME_LEN - 14];

    if let Some(mut arp_packet) = MutableArpPacket::new(&mut arp_buffer) {
        arp_packet.set_hardware_type(ArpHardwareTypes::Ethernet);
        arp_packet.set_protocol_type(EtherTypes::Ipv4);
        arp_packet.set_hw_addr_len(6);
        arp_packet.set_proto_addr_len(4);
        arp_packet.set_operation(ArpOperations::Request);
        arp_packet.set_sender_hw_addr(source_mac);
        arp_packet.set_sender_proto_addr(source_ip);
        arp_packet.set_target_hw_addr(MacAddr::zero());
        arp_packet.set_target_proto_addr(target_ip);

        if let Some(mut ethernet_packet) = MutableEthernetPacket::new(&mut ethernet_buffer) {
            ethernet_packet.set_destination(MacAddr::broadcast());
            ethernet_packet.set_source(source_mac);
            ethernet_packet.set_ethertype(EtherTypes::Arp);
            ethernet_packet.set_payload(arp_packet.packet_mut());
        }
    }
    ethernet_buffer
}

/// Sender of an ARP reply addressed to us from inside `target`.
fn parse_reply(frame: &[u8], own_mac: MacAddr, target: &Ipv4Cidr) -> Option<(Ipv4Addr, MacAddr)> {
    let ethernet = EthernetPacket::new(frame)?;
    if ethernet.get_ethertype() != EtherTypes::Arp {
        return None;
    }
    let arp = ArpPacket::new(ethernet.payload())?;
    let sender = arp.get_sender_proto_addr();
    (arp.get_operation() == ArpOperations::Reply
        && arp.get_target_hw_addr() == own_mac
        && target.contains(&sender))
    .then(|| (sender, arp.get_sender_hw_addr()))
}
