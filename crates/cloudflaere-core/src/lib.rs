// # cloudflaere-core
//
// Core library for publishing reverse-proxy routes as DNS address records.
//
// ## Architecture Overview
//
// - **AddressResolver**: Trait for looking up the host's public addresses
// - **RouteDiscovery**: Trait for listing hostnames the reverse proxy serves
// - **DnsProvider**: Trait for listing zones and mutating address records
// - **mapper**: Places hostnames in the zone owning their registrable domain
// - **reconcile**: Diffs one zone against the desired state and applies it
// - **CycleEngine**: Runs discovery → mapping → reconciliation on an interval
//
// ## Design Principles
//
// 1. **Ownership first**: Only records carrying this instance's marker are
//    ever updated or deleted
// 2. **Fresh data**: Everything is fetched right before deciding; nothing is
//    cached between cycles
// 3. **Partial progress**: One failed record or zone never stops the others
// 4. **Library-First**: All core functionality can be used as a library

pub mod config;
mod deadline;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod reconcile;
pub mod record;
pub mod traits;

// Re-export core types for convenience
pub use config::{CloudflaereConfig, DdnsConfig, EngineConfig, ProviderConfig, TraefikConfig};
pub use engine::{CycleEngine, CycleOutcome, CycleReport, EngineEvent};
pub use error::{Error, Result};
pub use reconcile::{Reconciler, ZoneReport, ZoneSummary};
pub use record::{Hostname, NewRecord, OwnershipMarker, Record, RecordType, Zone};
pub use traits::{AddressResolver, Addresses, DnsProvider, RouteDiscovery};
