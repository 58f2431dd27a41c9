//! Host discovery: ARP sweep of the local /24 with a neighbor-cache fallback.

use async_trait::async_trait;
use cidr::Ipv4Cidr;
use itertools::Itertools;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use super::error::ScanError;
use super::neighbor_parser::parse_neighbors;
use super::process::{CommandRunner, CommandSpec};
use super::records::HostRecord;
use super::resolver::ResolutionPool;
use super::session::Strategy;
use super::vendor::VendorLookup;
use super::ScanOutcome;
use crate::enums::{NeighborFormat, ScanKind};

pub const DEFAULT_PROBE_TARGET: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 80);

/// Source of the host's own IPv4 address.
#[async_trait]
pub trait LocalAddress: Send + Sync {
    async fn local_ipv4(&self) -> Option<Ipv4Addr>;
}

/// Finds the address of the interface that routes toward `target`.
///
/// Connecting a UDP socket sends nothing; it only makes the OS pick a route and a source address.
#[derive(Debug, Clone)]
pub struct UdpRoute {
    target: SocketAddr,
}

impl UdpRoute {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }
}

impl Default for UdpRoute {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TARGET)
    }
}

#[async_trait]
impl LocalAddress for UdpRoute {
    async fn local_ipv4(&self) -> Option<Ipv4Addr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
        if let Err(e) = socket.connect(self.target).await {
            tracing::debug!(target = %self.target, error = %e, "no route");
            return None;
        }
        match socket.local_addr().ok()?.ip() {
            IpAddr::V4(address) if !address.is_loopback() && !address.is_unspecified() => {
                Some(address)
            }
            _ => None,
        }
    }
}

/// One way of listing live hosts in a subnet.
#[async_trait]
pub trait HostProbe: Send + Sync {
    fn name(&self) -> &'static str;

    async fn probe(
        &self,
        target: Ipv4Cidr,
        local: Ipv4Addr,
        cancel: &CancellationToken,
    ) -> Result<Vec<HostRecord>, ScanError>;
}

/// Reads the OS neighbor cache (`arp -a`, `ip neigh show`).
#[derive(Clone)]
pub struct NeighborCacheProbe {
    runner: Arc<dyn CommandRunner>,
    command: CommandSpec,
    format: NeighborFormat,
}

impl NeighborCacheProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, command: CommandSpec, format: NeighborFormat) -> Self {
        Self {
            runner,
            command,
            format,
        }
    }
}

#[async_trait]
impl HostProbe for NeighborCacheProbe {
    fn name(&self) -> &'static str {
        "neighbor cache"
    }

    async fn probe(
        &self,
        _target: Ipv4Cidr,
        _local: Ipv4Addr,
        cancel: &CancellationToken,
    ) -> Result<Vec<HostRecord>, ScanError> {
        let text = self.runner.run(&self.command, cancel).await?;
        Ok(parse_neighbors(&text, self.format))
    }
}

/// The /24 containing `address`.
pub fn subnet_of(address: Ipv4Addr) -> Ipv4Cidr {
    let [a, b, c, _] = address.octets();
    // a /24 network address with a zeroed host octet is always valid
    Ipv4Cidr::new(Ipv4Addr::new(a, b, c, 0), 24).expect("host bits are zero")
}

pub struct HostDiscovery {
    local: Arc<dyn LocalAddress>,
    primary: Arc<dyn HostProbe>,
    fallback: Arc<dyn HostProbe>,
    pool: ResolutionPool,
    vendors: Option<VendorLookup>,
}

impl HostDiscovery {
    pub fn new(
        local: Arc<dyn LocalAddress>,
        primary: Arc<dyn HostProbe>,
        fallback: Arc<dyn HostProbe>,
        pool: ResolutionPool,
    ) -> Self {
        Self {
            local,
            primary,
            fallback,
            pool,
            vendors: None,
        }
    }

    pub fn with_vendors(mut self, vendors: Option<VendorLookup>) -> Self {
        self.vendors = vendors;
        self
    }

    /// One discovery pass. Never fails; problems travel in [`ScanOutcome::fault`].
    pub async fn discover(&self, cancel: &CancellationToken) -> ScanOutcome<HostRecord> {
        let Some(local) = self.local.local_ipv4().await else {
            tracing::info!("no local IPv4 address, skipping host discovery");
            return ScanOutcome::failed(ScanError::NoLocalAddress);
        };
        let target = subnet_of(local);
        tracing::info!(%local, %target, "discovering hosts");

        let mut fault = None;
        let mut records = match self.primary.probe(target, local, cancel).await {
            Ok(records) => records,
            Err(ScanError::Cancelled) => return ScanOutcome::failed(ScanError::Cancelled),
            Err(e) => {
                tracing::warn!(probe = self.primary.name(), error = %e, "primary probe failed");
                fault = Some(e);
                Vec::new()
            }
        };

        if records.is_empty() {
            if cancel.is_cancelled() {
                return ScanOutcome::failed(ScanError::Cancelled);
            }
            tracing::info!(probe = self.fallback.name(), "no replies, trying fallback");
            match self.fallback.probe(target, local, cancel).await {
                Ok(found) => records = found,
                Err(e) => {
                    tracing::warn!(probe = self.fallback.name(), error = %e, "fallback probe failed");
                    fault = Some(e);
                }
            }
        }

        let mut records: Vec<HostRecord> = records.into_iter().unique_by(|r| r.address).collect();
        if let Some(vendors) = &self.vendors {
            vendors.annotate(&mut records);
        }
        self.pool.resolve(&mut records, cancel).await;
        if cancel.is_cancelled() {
            fault = Some(ScanError::Cancelled);
        }

        tracing::info!(hosts = records.len(), "host discovery finished");
        ScanOutcome { records, fault }
    }
}

#[async_trait]
impl Strategy for HostDiscovery {
    type Record = HostRecord;

    fn kind(&self) -> ScanKind {
        ScanKind::Hosts
    }

    async fn discover(&self, cancel: &CancellationToken) -> ScanOutcome<HostRecord> {
        HostDiscovery::discover(self, cancel).await
    }
}
