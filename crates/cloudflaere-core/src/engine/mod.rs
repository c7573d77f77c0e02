//! Cycle orchestrator
//!
//! The CycleEngine is responsible for:
//! - Resolving the host's public addresses via AddressResolver
//! - Discovering routed hostnames via RouteDiscovery
//! - Listing zones and mapping hostnames onto them
//! - Reconciling each zone's records via DnsProvider
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐  ┌────────────────┐  ┌─────────────┐
//! │ AddressResolver │  │ RouteDiscovery │  │ DnsProvider │
//! └─────────────────┘  └────────────────┘  └─────────────┘
//!          │                   │                  │
//!          └─────────┬─────────┘        zones + records
//!                    ▼                            │
//!            ┌──────────────┐                     │
//!            │ CycleEngine  │◄────────────────────┘
//!            └──────────────┘
//!                    │
//!         ┌──────────┴──────────┐
//!         ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐
//!  │ Reconciler  │       │   Events    │
//!  │ (per zone)  │       │  (notify)   │
//!  └─────────────┘       └─────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Resolve addresses (only when an address family is enabled)
//! 2. Discover hostnames; none is a skipped cycle
//! 3. List zones and apply the allow-list; none is a skipped cycle
//! 4. Map hostnames to zones
//! 5. Reconcile every zone in turn, including zones left with no hostnames
//!    so their stale records get cleaned up
//!
//! A collaborator failure in steps 1-3 aborts the cycle. A failure inside a
//! zone only affects that zone.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::{CloudflaereConfig, DdnsConfig, EngineConfig};
use crate::deadline;
use crate::error::Result;
use crate::mapper::map_to_zones;
use crate::reconcile::{Reconciler, ZoneReport, ZoneSummary};
use crate::record::{OwnershipMarker, Zone};
use crate::traits::{AddressResolver, Addresses, DnsProvider, RouteDiscovery};

/// Events emitted by the CycleEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started { interval_secs: u64, marker: String },

    /// A cycle began
    CycleStarted { cycle: u64 },

    /// A collaborator failed before any zone was touched
    CycleAborted { cycle: u64, reason: String },

    /// Nothing to do this cycle (no hostnames or no zones)
    CycleSkipped { cycle: u64, reason: String },

    /// One zone finished reconciling
    ZoneReconciled {
        cycle: u64,
        zone: String,
        summary: ZoneSummary,
    },

    /// A zone could not be reconciled (its records could not be listed)
    ZoneFailed {
        cycle: u64,
        zone: String,
        error: String,
    },

    /// A cycle finished
    CycleCompleted {
        cycle: u64,
        zones: usize,
        summary: ZoneSummary,
        interrupted: bool,
    },

    /// Engine stopped
    Stopped { reason: String },
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Route discovery returned no hostnames
    NoDomains,

    /// The provider listed no zones (after the allow-list)
    NoZones,

    /// Zones were reconciled
    Reconciled {
        /// Reports of the zones that were reconciled, in processing order
        zones: Vec<ZoneReport>,
        /// Zones whose records could not be listed, with the error
        failed_zones: Vec<(Zone, String)>,
        /// Hostnames that could not be placed in a zone
        unmapped: usize,
        /// Shutdown was requested before every zone was processed
        interrupted: bool,
    },
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    /// Counters summed over every reconciled zone
    pub fn summary(&self) -> ZoneSummary {
        let mut total = ZoneSummary::default();
        if let CycleOutcome::Reconciled { zones, .. } = &self.outcome {
            for report in zones {
                total += report.summary;
            }
        }
        total
    }
}

/// Periodic reconciliation engine
///
/// ## Lifecycle
///
/// 1. Create with [`CycleEngine::new()`]
/// 2. Run with [`CycleEngine::run_with_shutdown()`], or drive single passes
///    with [`CycleEngine::run_cycle()`]
/// 3. The loop ends when the shutdown channel flips to `true` or closes
///
/// ## Concurrency
///
/// Everything runs on the caller's task with sequential awaits, so cycles
/// never overlap and zones are processed one after another.
pub struct CycleEngine {
    resolver: Box<dyn AddressResolver>,
    discovery: Box<dyn RouteDiscovery>,
    provider: Box<dyn DnsProvider>,
    reconciler: Reconciler,
    ddns: DdnsConfig,
    engine: EngineConfig,
    interval: Duration,
    cycles: AtomicU64,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl CycleEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        resolver: Box<dyn AddressResolver>,
        discovery: Box<dyn RouteDiscovery>,
        provider: Box<dyn DnsProvider>,
        config: &CloudflaereConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);
        let marker = OwnershipMarker::for_host(config.instance.as_deref());

        let engine = Self {
            resolver,
            discovery,
            provider,
            reconciler: Reconciler::new(marker, config.proxied, config.engine.call_timeout()),
            ddns: config.ddns,
            engine: config.engine.clone(),
            interval: config.interval(),
            cycles: AtomicU64::new(0),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Ownership marker written to and looked for in record comments
    pub fn marker(&self) -> &OwnershipMarker {
        self.reconciler.marker()
    }

    /// Run a single reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: the pass ran, possibly with per-zone failures
    /// - `Err(Error)`: address lookup, route discovery or zone listing failed
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.cycle(None).await
    }

    /// Run cycles until shutdown is requested
    ///
    /// The first cycle starts immediately; later ones start `interval` after
    /// the previous one finished. Shutdown during the wait stops at once.
    /// Shutdown during a cycle lets the current zone finish and skips the
    /// rest. A dropped sender counts as shutdown.
    pub async fn run_with_shutdown(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            marker = %self.marker(),
            resolver = self.resolver.resolver_name(),
            discovery = self.discovery.source_name(),
            provider = self.provider.provider_name(),
            "engine started"
        );
        self.emit_event(EngineEvent::Started {
            interval_secs: self.interval.as_secs(),
            marker: self.marker().to_string(),
        });

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.cycle(Some(&shutdown)).await {
                Ok(report) => {
                    if let CycleOutcome::Reconciled {
                        interrupted: true, ..
                    } = report.outcome
                    {
                        break;
                    }
                }
                Err(e) => {
                    // Already logged and reported; retry next interval
                    debug!(error = %e, "cycle aborted");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Shutdown signal received, engine stopped");
        self.emit_event(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        Ok(())
    }

    async fn cycle(&self, shutdown: Option<&watch::Receiver<bool>>) -> Result<CycleReport> {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let started_at = Utc::now();

        debug!(cycle, "cycle started");
        self.emit_event(EngineEvent::CycleStarted { cycle });

        let outcome = match self.cycle_inner(cycle, shutdown).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(cycle, error = %e, "cycle aborted");
                self.emit_event(EngineEvent::CycleAborted {
                    cycle,
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        let report = CycleReport {
            cycle,
            started_at,
            finished_at: Utc::now(),
            outcome,
        };

        match &report.outcome {
            CycleOutcome::NoDomains => {
                warn!(cycle, "no hostnames discovered, skipping cycle");
                self.emit_event(EngineEvent::CycleSkipped {
                    cycle,
                    reason: "no hostnames discovered".to_string(),
                });
            }
            CycleOutcome::NoZones => {
                warn!(cycle, "no zones available, skipping cycle");
                self.emit_event(EngineEvent::CycleSkipped {
                    cycle,
                    reason: "no zones available".to_string(),
                });
            }
            CycleOutcome::Reconciled {
                zones,
                failed_zones,
                unmapped,
                interrupted,
            } => {
                let summary = report.summary();
                info!(
                    cycle,
                    zones = zones.len(),
                    failed_zones = failed_zones.len(),
                    unmapped,
                    created = summary.created,
                    updated = summary.updated,
                    deleted = summary.deleted,
                    failed = summary.failed,
                    "cycle completed"
                );
                self.emit_event(EngineEvent::CycleCompleted {
                    cycle,
                    zones: zones.len(),
                    summary,
                    interrupted: *interrupted,
                });
            }
        }

        Ok(report)
    }

    async fn cycle_inner(
        &self,
        cycle: u64,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<CycleOutcome> {
        let call_timeout = self.engine.call_timeout();

        let addresses = if self.ddns.any() {
            let addresses = deadline::within(
                "resolve addresses",
                call_timeout,
                self.resolver.resolve(self.ddns.ipv4, self.ddns.ipv6),
            )
            .await?;
            debug!(cycle, a = ?addresses.a, aaaa = ?addresses.aaaa, "resolved addresses");
            addresses
        } else {
            Addresses::default()
        };

        let hostnames = deadline::within(
            "discover hostnames",
            call_timeout,
            self.discovery.active_hostnames(),
        )
        .await?;
        if hostnames.is_empty() {
            return Ok(CycleOutcome::NoDomains);
        }
        debug!(cycle, count = hostnames.len(), "discovered hostnames");

        let zones: Vec<Zone> =
            deadline::within("list zones", call_timeout, self.provider.list_zones())
                .await?
                .into_iter()
                .filter(|zone| {
                    let allowed = self.engine.allows_zone(&zone.name);
                    if !allowed {
                        debug!(zone = %zone.name, "zone not in allow-list, ignoring");
                    }
                    allowed
                })
                .collect();
        if zones.is_empty() {
            return Ok(CycleOutcome::NoZones);
        }

        let mut mapping = map_to_zones(&hostnames, &zones);
        let unmapped = mapping.discarded.len();

        let mut reports = Vec::with_capacity(zones.len());
        let mut failed_zones = Vec::new();
        let mut interrupted = false;

        for zone in &zones {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                info!(cycle, zone = %zone.name, "shutdown requested, stopping before zone");
                interrupted = true;
                break;
            }

            let desired = mapping
                .buckets
                .remove(&zone.id)
                .map(|bucket| bucket.hostnames)
                .unwrap_or_default();

            match self
                .reconciler
                .reconcile_zone(self.provider.as_ref(), zone, &desired, &addresses)
                .await
            {
                Ok(report) => {
                    self.emit_event(EngineEvent::ZoneReconciled {
                        cycle,
                        zone: zone.name.clone(),
                        summary: report.summary,
                    });
                    reports.push(report);
                }
                Err(e) => {
                    error!(cycle, zone = %zone.name, error = %e, "failed to reconcile zone");
                    self.emit_event(EngineEvent::ZoneFailed {
                        cycle,
                        zone: zone.name.clone(),
                        error: e.to_string(),
                    });
                    failed_zones.push((zone.clone(), e.to_string()));
                }
            }
        }

        Ok(CycleOutcome::Reconciled {
            zones: reports,
            failed_zones,
            unmapped,
            interrupted,
        })
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
