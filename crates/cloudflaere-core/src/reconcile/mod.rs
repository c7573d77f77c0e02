//! Per-zone record reconciliation
//!
//! Reconciling a zone is two steps:
//!
//! 1. [`plan_zone`] diffs the desired hostnames against one snapshot of the
//!    zone's records. It is pure and deterministic.
//! 2. [`apply_plan`] sends the resulting mutations to the provider, one call
//!    at a time, each under its own deadline.
//!
//! ## Ownership
//!
//! A record is ours only if its comment contains our [`OwnershipMarker`].
//! Records without it are reported and left untouched: never updated, never
//! deleted, and never duplicated by a create.

mod apply;
mod plan;

pub use apply::{apply_plan, ApplyOptions, StepOutcome, StepResult, ZoneReport, ZoneSummary};
pub use plan::{plan_zone, Action, Step, ZonePlan};

use std::collections::BTreeSet;
use std::time::Duration;
use tracing::debug;

use crate::deadline;
use crate::error::Result;
use crate::record::{Hostname, OwnershipMarker, Zone};
use crate::traits::{Addresses, DnsProvider};

/// Reconciles one zone at a time against a provider
#[derive(Debug, Clone)]
pub struct Reconciler {
    options: ApplyOptions,
}

impl Reconciler {
    pub fn new(marker: OwnershipMarker, proxied: bool, call_timeout: Duration) -> Self {
        Self {
            options: ApplyOptions {
                marker,
                proxied,
                call_timeout,
            },
        }
    }

    pub fn marker(&self) -> &OwnershipMarker {
        &self.options.marker
    }

    /// Bring one zone in line with the desired hostnames.
    ///
    /// The zone's A and AAAA records are listed once; every decision in the
    /// zone is made from that snapshot.
    ///
    /// # Returns
    ///
    /// - `Ok(report)`: the plan ran; individual steps may still have failed
    /// - `Err(Error)`: the records could not be listed, nothing was changed
    pub async fn reconcile_zone(
        &self,
        provider: &dyn DnsProvider,
        zone: &Zone,
        hostnames: &BTreeSet<Hostname>,
        addresses: &Addresses,
    ) -> Result<ZoneReport> {
        let records = deadline::within(
            "list records",
            self.options.call_timeout,
            provider.list_records(&zone.id, None),
        )
        .await?;

        debug!(
            zone = %zone.name,
            records = records.len(),
            hostnames = hostnames.len(),
            "planning zone"
        );

        let plan = plan_zone(
            zone,
            hostnames,
            &addresses.targets(),
            &records,
            &self.options.marker,
        );

        Ok(apply_plan(provider, plan, &self.options).await)
    }
}
