//! Domain-to-zone mapping
//!
//! Groups discovered hostnames under the provider zone that owns their
//! registrable root domain. Root domains come from the Public Suffix List,
//! so `foo.bar.example.co.uk` lands in `example.co.uk`, never `co.uk`.
//!
//! A hostname whose root cannot be determined, or whose root is not a known
//! zone, is discarded with a diagnostic. Root-to-zone is a function, so a
//! hostname appears in at most one bucket.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::error::Error;
use crate::record::{Hostname, Zone};

/// Hostnames that belong to one zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneBucket {
    pub zone: Zone,
    pub hostnames: BTreeSet<Hostname>,
}

/// Result of mapping hostnames onto zones
#[derive(Debug, Default)]
pub struct ZoneMapping {
    /// Buckets keyed by zone id
    pub buckets: BTreeMap<String, ZoneBucket>,
    /// One `Error::Mapping` per discarded hostname
    pub discarded: Vec<Error>,
}

impl ZoneMapping {
    /// Number of hostnames that were placed in a zone
    pub fn mapped_count(&self) -> usize {
        self.buckets.values().map(|b| b.hostnames.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Registrable root domain of a hostname, per the Public Suffix List
pub fn root_domain(hostname: &Hostname) -> Option<&str> {
    psl::domain_str(hostname.as_str())
}

/// Bucket hostnames by the zone that owns their root domain
pub fn map_to_zones<'a, I>(hostnames: I, zones: &[Zone]) -> ZoneMapping
where
    I: IntoIterator<Item = &'a Hostname>,
{
    let by_name: HashMap<String, &Zone> = zones
        .iter()
        .map(|zone| (zone.name.trim_end_matches('.').to_ascii_lowercase(), zone))
        .collect();

    let mut mapping = ZoneMapping::default();

    for hostname in hostnames {
        let Some(root) = root_domain(hostname) else {
            warn!(hostname = %hostname, "could not parse root domain");
            mapping
                .discarded
                .push(Error::mapping(hostname.clone(), "no registrable root domain"));
            continue;
        };

        let Some(zone) = by_name.get(root) else {
            warn!(hostname = %hostname, root_domain = root, "root domain is not a known zone");
            mapping.discarded.push(Error::mapping(
                hostname.clone(),
                format!("root domain {} is not a known zone", root),
            ));
            continue;
        };

        debug!(hostname = %hostname, zone = %zone.name, "hostname mapped to zone");
        mapping
            .buckets
            .entry(zone.id.clone())
            .or_insert_with(|| ZoneBucket {
                zone: (*zone).clone(),
                hostnames: BTreeSet::new(),
            })
            .hostnames
            .insert(hostname.clone());
    }

    mapping
}
