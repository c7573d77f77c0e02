//! Test doubles and common utilities for contract tests
//!
//! The provider double keeps its own record table and applies every
//! mutation to it, so a second cycle sees the result of the first.

#![allow(dead_code)]

use cloudflaere_core::config::{CloudflaereConfig, ProviderConfig, TraefikConfig};
use cloudflaere_core::error::{Error, Result};
use cloudflaere_core::record::{Hostname, NewRecord, OwnershipMarker, Record, RecordType, Zone};
use cloudflaere_core::traits::{AddressResolver, Addresses, DnsProvider, RouteDiscovery};
use std::collections::{BTreeSet, HashSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const INSTANCE: &str = "test-instance";

pub fn marker() -> OwnershipMarker {
    OwnershipMarker::new(INSTANCE)
}

pub fn host(name: &str) -> Hostname {
    Hostname::new(name).unwrap()
}

pub fn hosts(names: &[&str]) -> BTreeSet<Hostname> {
    names.iter().map(|n| host(n)).collect()
}

pub fn owned(id: &str, record_type: RecordType, name: &str, address: &str) -> Record {
    Record {
        id: id.to_string(),
        record_type,
        name: host(name),
        address: address.to_string(),
        comment: marker().to_string(),
        proxied: false,
    }
}

pub fn foreign(id: &str, record_type: RecordType, name: &str, address: &str) -> Record {
    Record {
        comment: "created by hand".to_string(),
        ..owned(id, record_type, name, address)
    }
}

/// A provider call, as recorded by [`RecordingProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create {
        zone_id: String,
        record_type: RecordType,
        name: String,
        address: IpAddr,
        comment: String,
        proxied: bool,
    },
    Update {
        zone_id: String,
        record_id: String,
        address: IpAddr,
    },
    Delete {
        zone_id: String,
        record_id: String,
    },
}

#[derive(Default)]
struct ProviderState {
    zones: Vec<Zone>,
    /// (zone id, record)
    records: Vec<(String, Record)>,
    calls: Vec<Call>,
    next_id: usize,
    fail_hostnames: HashSet<String>,
    fail_list_zones: bool,
    fail_list_records: HashSet<String>,
}

/// An in-memory DnsProvider that records and applies every mutation
#[derive(Clone, Default)]
pub struct RecordingProvider {
    state: Arc<Mutex<ProviderState>>,
    list_zones_calls: Arc<AtomicUsize>,
    list_records_calls: Arc<AtomicUsize>,
    list_delay: Option<Duration>,
}

impl RecordingProvider {
    pub fn new(zones: &[(&str, &str)]) -> Self {
        let provider = Self::default();
        provider.state.lock().unwrap().zones = zones
            .iter()
            .map(|(name, id)| Zone::new(*name, *id))
            .collect();
        provider
    }

    /// Create a new provider that shares state and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        other.clone()
    }

    /// Seed a record into a zone
    pub fn with_record(self, zone_id: &str, record: Record) -> Self {
        self.state
            .lock()
            .unwrap()
            .records
            .push((zone_id.to_string(), record));
        self
    }

    /// Make every mutation for this hostname fail
    pub fn failing_for(self, hostname: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_hostnames
            .insert(hostname.to_string());
        self
    }

    pub fn failing_list_zones(self) -> Self {
        self.state.lock().unwrap().fail_list_zones = true;
        self
    }

    pub fn failing_list_records(self, zone_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_list_records
            .insert(zone_id.to_string());
        self
    }

    /// Delay every list call
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn records(&self, zone_id: &str) -> Vec<Record> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|(z, _)| z == zone_id)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn list_zones_calls(&self) -> usize {
        self.list_zones_calls.load(Ordering::SeqCst)
    }

    pub fn list_records_calls(&self) -> usize {
        self.list_records_calls.load(Ordering::SeqCst)
    }

    fn fails_for(state: &ProviderState, name: &str) -> bool {
        state.fail_hostnames.contains(name)
    }
}

#[async_trait::async_trait]
impl DnsProvider for RecordingProvider {
    async fn list_zones(&self) -> Result<Vec<Zone>> {
        self.list_zones_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock().unwrap();
        if state.fail_list_zones {
            return Err(Error::provider(Some(503), "zones unavailable"));
        }
        Ok(state.zones.clone())
    }

    async fn list_records(
        &self,
        zone_id: &str,
        record_type: Option<RecordType>,
    ) -> Result<Vec<Record>> {
        self.list_records_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock().unwrap();
        if state.fail_list_records.contains(zone_id) {
            return Err(Error::provider(Some(500), "records unavailable"));
        }
        Ok(state
            .records
            .iter()
            .filter(|(z, r)| z == zone_id && record_type.is_none_or(|t| r.record_type == t))
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn create_record(&self, zone_id: &str, record: &NewRecord) -> Result<Record> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create {
            zone_id: zone_id.to_string(),
            record_type: record.record_type,
            name: record.name.to_string(),
            address: record.address,
            comment: record.comment.clone(),
            proxied: record.proxied,
        });
        if Self::fails_for(&state, record.name.as_str()) {
            return Err(Error::provider(Some(500), "create failed"));
        }

        state.next_id += 1;
        let created = Record {
            id: format!("created-{}", state.next_id),
            record_type: record.record_type,
            name: record.name.clone(),
            address: record.address.to_string(),
            comment: record.comment.clone(),
            proxied: record.proxied,
        };
        state.records.push((zone_id.to_string(), created.clone()));
        Ok(created)
    }

    async fn update_record_address(
        &self,
        zone_id: &str,
        record_id: &str,
        address: IpAddr,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Update {
            zone_id: zone_id.to_string(),
            record_id: record_id.to_string(),
            address,
        });

        let name = state
            .records
            .iter()
            .find(|(z, r)| z == zone_id && r.id == record_id)
            .map(|(_, r)| r.name.to_string())
            .ok_or_else(|| Error::provider(Some(404), "record not found"))?;
        if Self::fails_for(&state, &name) {
            return Err(Error::provider(Some(500), "update failed"));
        }

        if let Some((_, record)) = state
            .records
            .iter_mut()
            .find(|(z, r)| z == zone_id && r.id == record_id)
        {
            record.address = address.to_string();
        }
        Ok(())
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete {
            zone_id: zone_id.to_string(),
            record_id: record_id.to_string(),
        });

        let name = state
            .records
            .iter()
            .find(|(z, r)| z == zone_id && r.id == record_id)
            .map(|(_, r)| r.name.to_string())
            .ok_or_else(|| Error::provider(Some(404), "record not found"))?;
        if Self::fails_for(&state, &name) {
            return Err(Error::provider(Some(500), "delete failed"));
        }

        state
            .records
            .retain(|(z, r)| !(z == zone_id && r.id == record_id));
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// A resolver that always returns the same addresses
pub struct FixedResolver {
    v4: Option<Ipv4Addr>,
    v6: Option<Ipv6Addr>,
    calls: Arc<AtomicUsize>,
}

impl FixedResolver {
    pub fn new(v4: Option<&str>, v6: Option<&str>) -> Self {
        Self {
            v4: v4.map(|a| a.parse().unwrap()),
            v6: v6.map(|a| a.parse().unwrap()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn v4(addr: &str) -> Self {
        Self::new(Some(addr), None)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            v4: other.v4,
            v6: other.v6,
            calls: Arc::clone(&other.calls),
        }
    }
}

#[async_trait::async_trait]
impl AddressResolver for FixedResolver {
    async fn resolve(&self, want_ipv4: bool, want_ipv6: bool) -> Result<Addresses> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Addresses {
            a: if want_ipv4 { self.v4 } else { None },
            aaaa: if want_ipv6 { self.v6 } else { None },
        })
    }

    fn resolver_name(&self) -> &'static str {
        "fixed"
    }
}

/// A resolver whose lookups always fail
pub struct FailingResolver;

#[async_trait::async_trait]
impl AddressResolver for FailingResolver {
    async fn resolve(&self, _want_ipv4: bool, _want_ipv6: bool) -> Result<Addresses> {
        Err(Error::lookup("lookup service unreachable"))
    }

    fn resolver_name(&self) -> &'static str {
        "failing"
    }
}

/// Route discovery returning a hostname set the test can change
#[derive(Clone, Default)]
pub struct FixedDiscovery {
    hostnames: Arc<Mutex<BTreeSet<Hostname>>>,
    calls: Arc<AtomicUsize>,
}

impl FixedDiscovery {
    pub fn new(names: &[&str]) -> Self {
        let discovery = Self::default();
        discovery.set(names);
        discovery
    }

    /// Replace the routed hostnames
    pub fn set(&self, names: &[&str]) {
        *self.hostnames.lock().unwrap() = hosts(names);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        other.clone()
    }
}

#[async_trait::async_trait]
impl RouteDiscovery for FixedDiscovery {
    async fn active_hostnames(&self) -> Result<BTreeSet<Hostname>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hostnames.lock().unwrap().clone())
    }

    fn source_name(&self) -> &'static str {
        "fixed"
    }
}

/// Route discovery that cannot reach the proxy
pub struct FailingDiscovery;

#[async_trait::async_trait]
impl RouteDiscovery for FailingDiscovery {
    async fn active_hostnames(&self) -> Result<BTreeSet<Hostname>> {
        Err(Error::discovery("proxy unreachable"))
    }

    fn source_name(&self) -> &'static str {
        "failing"
    }
}

/// Helper to create a minimal config publishing A records
pub fn minimal_config() -> CloudflaereConfig {
    let mut config = CloudflaereConfig::new(
        ProviderConfig::Cloudflare {
            zone_token: "zone-token".to_string(),
            dns_token: "dns-token".to_string(),
        },
        TraefikConfig::new("http://traefik:8080"),
    );
    config.instance = Some(INSTANCE.to_string());
    config.ddns.ipv4 = true;
    config
}
