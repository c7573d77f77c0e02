//! Executes a zone plan against the provider

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::deadline;
use crate::error::Error;
use crate::record::{NewRecord, OwnershipMarker, Zone};
use crate::traits::DnsProvider;

use super::plan::{Action, Step, ZonePlan};

/// Settings shared by every mutation in a cycle
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Written as the comment of every created record
    pub marker: OwnershipMarker,
    /// Proxied flag for created records
    pub proxied: bool,
    /// Deadline for each provider call
    pub call_timeout: Duration,
}

/// How one step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// The provider accepted the mutation
    Applied,
    /// Nothing to send (unchanged, foreign or conflicting records)
    NoOp,
    /// The provider call failed; the rest of the plan still ran
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: Step,
    pub result: StepResult,
}

/// Per-zone counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ZoneSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub conflicts: usize,
    pub failed: usize,
}

impl ZoneSummary {
    /// Number of successful mutations
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    fn record(&mut self, outcome: &StepOutcome) {
        match (&outcome.step.action, &outcome.result) {
            (_, StepResult::Failed(_)) => self.failed += 1,
            (Action::Create { .. }, _) => self.created += 1,
            (Action::Update { .. }, _) => self.updated += 1,
            (Action::Delete { .. }, _) => self.deleted += 1,
            (Action::Unchanged { .. }, _) => self.unchanged += 1,
            (Action::SkipForeign { .. }, _) => self.skipped += 1,
            (Action::Conflict { .. }, _) => self.conflicts += 1,
        }
    }
}

impl std::ops::AddAssign for ZoneSummary {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.conflicts += other.conflicts;
        self.failed += other.failed;
    }
}

/// What happened to one zone during a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneReport {
    pub zone: Zone,
    pub outcomes: Vec<StepOutcome>,
    pub summary: ZoneSummary,
}

/// Apply every step of a plan in order.
///
/// A failed provider call is logged and recorded; later steps still run.
pub async fn apply_plan(
    provider: &dyn DnsProvider,
    plan: ZonePlan,
    options: &ApplyOptions,
) -> ZoneReport {
    let ZonePlan { zone, steps } = plan;
    let mut outcomes = Vec::with_capacity(steps.len());
    let mut summary = ZoneSummary::default();

    for step in steps {
        let result = apply_step(provider, &zone, &step, options).await;
        let outcome = StepOutcome { step, result };
        summary.record(&outcome);
        outcomes.push(outcome);
    }

    ZoneReport {
        zone,
        outcomes,
        summary,
    }
}

async fn apply_step(
    provider: &dyn DnsProvider,
    zone: &Zone,
    step: &Step,
    options: &ApplyOptions,
) -> StepResult {
    let hostname = &step.hostname;
    let record_type = step.record_type;

    match &step.action {
        Action::Unchanged { record_id } => {
            debug!(
                zone = %zone.name,
                hostname = %hostname,
                record_type = %record_type,
                record_id = %record_id,
                "record up to date"
            );
            StepResult::NoOp
        }
        Action::SkipForeign { record_id } => {
            let reason = Error::Authorization {
                hostname: hostname.clone(),
                record_type,
            };
            warn!(
                zone = %zone.name,
                hostname = %hostname,
                record_type = %record_type,
                record_id = %record_id,
                "{}, skipping",
                reason
            );
            StepResult::NoOp
        }
        Action::Conflict { record_ids } => {
            let reason = Error::Conflict {
                hostname: hostname.clone(),
                record_type,
                count: record_ids.len(),
            };
            warn!(
                zone = %zone.name,
                hostname = %hostname,
                record_type = %record_type,
                record_ids = ?record_ids,
                "{}",
                reason
            );
            StepResult::NoOp
        }
        Action::Create { address } => {
            let record = NewRecord {
                record_type,
                name: hostname.clone(),
                address: *address,
                comment: options.marker.to_string(),
                proxied: options.proxied,
            };
            let call = provider.create_record(&zone.id, &record);
            match deadline::within("create record", options.call_timeout, call).await {
                Ok(created) => {
                    info!(
                        zone = %zone.name,
                        hostname = %hostname,
                        record_type = %record_type,
                        record_id = %created.id,
                        address = %address,
                        "created record"
                    );
                    StepResult::Applied
                }
                Err(e) => failed(zone, step, None, "create", e),
            }
        }
        Action::Update {
            record_id,
            from,
            to,
        } => {
            let call = provider.update_record_address(&zone.id, record_id, *to);
            match deadline::within("update record", options.call_timeout, call).await {
                Ok(()) => {
                    info!(
                        zone = %zone.name,
                        hostname = %hostname,
                        record_type = %record_type,
                        record_id = %record_id,
                        from = %from,
                        to = %to,
                        "updated record"
                    );
                    StepResult::Applied
                }
                Err(e) => failed(zone, step, Some(record_id), "update", e),
            }
        }
        Action::Delete { record_id, address } => {
            let call = provider.delete_record(&zone.id, record_id);
            match deadline::within("delete record", options.call_timeout, call).await {
                Ok(()) => {
                    info!(
                        zone = %zone.name,
                        hostname = %hostname,
                        record_type = %record_type,
                        record_id = %record_id,
                        address = %address,
                        "deleted stale record"
                    );
                    StepResult::Applied
                }
                Err(e) => failed(zone, step, Some(record_id), "delete", e),
            }
        }
    }
}

fn failed(zone: &Zone, step: &Step, record_id: Option<&String>, verb: &str, e: Error) -> StepResult {
    error!(
        zone = %zone.name,
        hostname = %step.hostname,
        record_type = %step.record_type,
        record_id = record_id.map(String::as_str).unwrap_or("-"),
        "failed to {} record: {}",
        verb,
        e
    );
    StepResult::Failed(e.to_string())
}
