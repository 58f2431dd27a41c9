//! Reverse name lookups for discovered hosts.
//!
//! [`DnsResolver`] wraps the system resolver (`getnameinfo` through `dns_lookup`) with a small
//! cache so that repeated passes over the same network do not wait on a slow DNS server again.
//! [`ResolutionPool`] drives lookups for a whole record list with bounded concurrency.

use async_trait::async_trait;
use dns_lookup::lookup_addr;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::records::{HostRecord, UNKNOWN_NAME};

/// Maximum number of cached names before the oldest entry is evicted.
const CACHE_SIZE: usize = 1000;

/// Cached names are re-queried after 5 minutes.
const CACHE_TTL: Duration = Duration::from_secs(300);

pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Name registered for `address`, or `None` when there is none.
    async fn reverse(&self, address: Ipv4Addr) -> Option<String>;
}

#[derive(Clone, Debug)]
struct CacheEntry {
    name: Option<String>,
    timestamp: Instant,
}

type Cache = Arc<Mutex<HashMap<Ipv4Addr, CacheEntry>>>;

/// System resolver with a TTL cache.
///
/// Cloning is cheap; clones share the cache.
#[derive(Clone, Default)]
pub struct DnsResolver {
    cache: Cache,
}

impl DnsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn cached(&self, address: &Ipv4Addr) -> Option<Option<String>> {
        let cache = self.cache.lock().ok()?;
        cache
            .get(address)
            .filter(|entry| entry.timestamp.elapsed() < CACHE_TTL)
            .map(|entry| entry.name.clone())
    }

    fn store(cache: &Cache, address: Ipv4Addr, name: Option<String>) {
        let Ok(mut cache) = cache.lock() else {
            return;
        };
        if cache.len() >= CACHE_SIZE && !cache.contains_key(&address) {
            if let Some(oldest) = cache
                .iter()
                .min_by_key(|(_, entry)| entry.timestamp)
                .map(|(ip, _)| *ip)
            {
                cache.remove(&oldest);
            }
        }
        cache.insert(
            address,
            CacheEntry {
                name,
                timestamp: Instant::now(),
            },
        );
    }
}

#[async_trait]
impl NameResolver for DnsResolver {
    async fn reverse(&self, address: Ipv4Addr) -> Option<String> {
        if let Some(name) = self.cached(&address) {
            return name;
        }
        // The blocking lookup caches its own result, so a lookup abandoned by a caller's timeout
        // still serves the next pass.
        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || {
            let name = lookup_addr(&IpAddr::V4(address))
                .ok()
                .filter(|name| !name.is_empty() && name.parse::<IpAddr>().is_err());
            Self::store(&cache, address, name.clone());
            name
        })
        .await
        .ok()
        .flatten()
    }
}

/// Bounded-concurrency reverse lookups over a record list.
#[derive(Clone)]
pub struct ResolutionPool {
    resolver: Arc<dyn NameResolver>,
    concurrency: usize,
    timeout: Duration,
}

impl ResolutionPool {
    pub fn new(resolver: Arc<dyn NameResolver>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            resolver,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Fills in `name` for every record that has none yet.
    ///
    /// Failed and timed-out lookups record [`UNKNOWN_NAME`]. On cancellation pending lookups are
    /// abandoned and their records keep `name == None`.
    pub async fn resolve(&self, records: &mut [HostRecord], cancel: &CancellationToken) {
        let pending = records.iter().filter(|r| r.name.is_none()).count();
        if pending == 0 {
            return;
        }
        tracing::debug!(pending, concurrency = self.concurrency, "resolving host names");

        let resolver = &self.resolver;
        let timeout = self.timeout;
        stream::iter(records.iter_mut().filter(|r| r.name.is_none()))
            .for_each_concurrent(self.concurrency, |record| async move {
                let lookup = tokio::time::timeout(timeout, resolver.reverse(record.address));
                let name = tokio::select! {
                    result = lookup => result.ok().flatten(),
                    _ = cancel.cancelled() => return,
                };
                if name.is_none() {
                    tracing::trace!(address = %record.address, "no name");
                }
                record.name = Some(name.unwrap_or_else(|| UNKNOWN_NAME.to_string()));
            })
            .await;
    }
}

impl std::fmt::Debug for ResolutionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionPool")
            .field("concurrency", &self.concurrency)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::HostOrigin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TableResolver {
        delay_for_first: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl TableResolver {
        fn new(delay_for_first: Duration) -> Self {
            Self {
                delay_for_first,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl NameResolver for TableResolver {
        async fn reverse(&self, address: Ipv4Addr) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let last = address.octets()[3];
            if last == 1 {
                tokio::time::sleep(self.delay_for_first).await;
            } else {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            (last % 2 == 1).then(|| format!("host-{last}.lan"))
        }
    }

    struct Stuck;

    #[async_trait]
    impl NameResolver for Stuck {
        async fn reverse(&self, _address: Ipv4Addr) -> Option<String> {
            std::future::pending().await
        }
    }

    fn hosts(count: u8) -> Vec<HostRecord> {
        (1..=count)
            .map(|i| {
                HostRecord::new(
                    Ipv4Addr::new(10, 0, 0, i),
                    crate::scan::records::MacAddress([0, 0, 0, 0, 0, i]),
                    HostOrigin::Dynamic,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn every_record_gets_a_name() {
        let resolver = Arc::new(TableResolver::new(Duration::from_millis(50)));
        let pool = ResolutionPool::new(resolver.clone(), 4, Duration::from_secs(1));
        let mut records = hosts(6);
        pool.resolve(&mut records, &CancellationToken::new()).await;

        let names: Vec<_> = records.iter().map(|r| r.name.clone().unwrap()).collect();
        assert_eq!(
            names,
            vec!["host-1.lan", "Unknown", "host-3.lan", "Unknown", "host-5.lan", "Unknown"]
        );
        assert!(resolver.peak.load(Ordering::SeqCst) <= 4);
        assert!(resolver.peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn a_slow_lookup_does_not_block_the_rest() {
        let resolver = Arc::new(TableResolver::new(Duration::from_millis(300)));
        let pool = ResolutionPool::new(resolver, 2, Duration::from_secs(1));
        let mut records = hosts(8);
        let started = Instant::now();
        pool.resolve(&mut records, &CancellationToken::new()).await;
        // the remaining seven lookups share the second slot while the first one sleeps
        assert!(started.elapsed() < Duration::from_millis(600));
        assert!(records.iter().all(|r| r.name.is_some()));
    }

    #[tokio::test]
    async fn timed_out_lookups_become_unknown() {
        let pool = ResolutionPool::new(Arc::new(Stuck), 20, Duration::from_millis(50));
        let mut records = hosts(3);
        pool.resolve(&mut records, &CancellationToken::new()).await;
        assert!(records.iter().all(|r| r.name.as_deref() == Some(UNKNOWN_NAME)));
    }

    #[tokio::test]
    async fn named_records_are_not_looked_up_again() {
        let resolver = Arc::new(TableResolver::new(Duration::from_millis(1)));
        let pool = ResolutionPool::new(resolver.clone(), 20, Duration::from_secs(1));
        let mut records = hosts(3);
        records[1].name = Some("printer".to_string());
        pool.resolve(&mut records, &CancellationToken::new()).await;
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
        assert_eq!(records[1].name.as_deref(), Some("printer"));
    }

    #[tokio::test]
    async fn cancellation_leaves_names_unset() {
        let pool = ResolutionPool::new(Arc::new(Stuck), 20, Duration::from_secs(10));
        let mut records = hosts(2);
        let cancel = CancellationToken::new();
        cancel.cancel();
        pool.resolve(&mut records, &cancel).await;
        assert!(records.iter().all(|r| r.name.is_none()));
    }

    #[test]
    fn cache_evicts_the_oldest_entry() {
        let resolver = DnsResolver::new();
        for i in 0..CACHE_SIZE {
            let address = Ipv4Addr::from(i as u32);
            DnsResolver::store(&resolver.cache, address, None);
        }
        let newest = Ipv4Addr::new(192, 168, 0, 1);
        DnsResolver::store(&resolver.cache, newest, Some("router".into()));
        let cache = resolver.cache.lock().unwrap();
        assert_eq!(cache.len(), CACHE_SIZE);
        assert!(cache.contains_key(&newest));
    }

    #[test]
    fn cached_names_are_served() {
        let resolver = DnsResolver::new();
        let address = Ipv4Addr::new(10, 1, 1, 1);
        DnsResolver::store(&resolver.cache, address, Some("nas".into()));
        assert_eq!(resolver.cached(&address), Some(Some("nas".to_string())));
        assert_eq!(resolver.cached(&Ipv4Addr::new(10, 1, 1, 2)), None);
    }
}
