//! Pure diff between desired hostnames and a zone's record snapshot

use std::collections::BTreeSet;
use std::net::IpAddr;

use crate::record::{Hostname, OwnershipMarker, Record, RecordType, Zone};

/// What the engine decided for one (hostname, record type) or one stale record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// No record exists; create one pointing at `address`
    Create { address: IpAddr },
    /// Our record points elsewhere; repoint it
    Update {
        record_id: String,
        from: String,
        to: IpAddr,
    },
    /// Our record already points at the target
    Unchanged { record_id: String },
    /// A record exists but lacks our ownership marker
    SkipForeign { record_id: String },
    /// Several records exist for the same hostname and type
    Conflict { record_ids: Vec<String> },
    /// Our record's hostname is no longer routed
    Delete { record_id: String, address: String },
}

impl Action {
    /// Whether applying this action calls the provider
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Action::Create { .. } | Action::Update { .. } | Action::Delete { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Create { .. } => "create",
            Action::Update { .. } => "update",
            Action::Unchanged { .. } => "unchanged",
            Action::SkipForeign { .. } => "skip",
            Action::Conflict { .. } => "conflict",
            Action::Delete { .. } => "delete",
        }
    }
}

/// One decision in a zone plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub hostname: Hostname,
    pub record_type: RecordType,
    pub action: Action,
}

/// Ordered decisions for one zone, all derived from a single record snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonePlan {
    pub zone: Zone,
    pub steps: Vec<Step>,
}

impl ZonePlan {
    /// Steps that will call the provider
    pub fn mutations(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.action.is_mutation())
    }

    /// Whether the zone is already converged
    pub fn is_converged(&self) -> bool {
        self.mutations().next().is_none()
    }
}

/// Compute the corrective steps for one zone.
///
/// For every target `(type, address)` and every desired hostname, the
/// records matching both name and type decide the action:
///
/// - none: create
/// - one without the marker: skip, whatever its address
/// - one with the marker: update if the address differs, otherwise nothing
/// - several: conflict, nothing is touched
///
/// Then every marker-owned record whose hostname is not desired is deleted.
/// Records without the marker are never updated or deleted.
///
/// Steps are ordered A before AAAA, hostnames ascending, then deletions in
/// snapshot order.
pub fn plan_zone(
    zone: &Zone,
    hostnames: &BTreeSet<Hostname>,
    targets: &[(RecordType, IpAddr)],
    records: &[Record],
    marker: &OwnershipMarker,
) -> ZonePlan {
    let mut steps = Vec::new();

    for &(record_type, target) in targets {
        for hostname in hostnames {
            let matches: Vec<&Record> = records
                .iter()
                .filter(|r| r.record_type == record_type && &r.name == hostname)
                .collect();

            let action = match matches.as_slice() {
                [] => Action::Create { address: target },
                [record] if !marker.is_present_in(&record.comment) => Action::SkipForeign {
                    record_id: record.id.clone(),
                },
                [record] if record.points_to(target) => Action::Unchanged {
                    record_id: record.id.clone(),
                },
                [record] => Action::Update {
                    record_id: record.id.clone(),
                    from: record.address.clone(),
                    to: target,
                },
                many => Action::Conflict {
                    record_ids: many.iter().map(|r| r.id.clone()).collect(),
                },
            };

            steps.push(Step {
                hostname: hostname.clone(),
                record_type,
                action,
            });
        }
    }

    for record in records {
        if marker.is_present_in(&record.comment) && !hostnames.contains(&record.name) {
            steps.push(Step {
                hostname: record.name.clone(),
                record_type: record.record_type,
                action: Action::Delete {
                    record_id: record.id.clone(),
                    address: record.address.clone(),
                },
            });
        }
    }

    ZonePlan {
        zone: zone.clone(),
        steps,
    }
}
