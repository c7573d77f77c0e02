// # DNS Provider Trait
//
// Defines the interface for reading and mutating address records via a
// provider API.
//
// ## Implementations
//
// - Cloudflare: `cloudflaere-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cloudflaere_core::{DnsProvider, RecordType};
//
// let zones = provider.list_zones().await?;
// for zone in &zones {
//     let records = provider.list_records(&zone.id, Some(RecordType::A)).await?;
//     println!("{}: {} A records", zone.name, records.len());
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

use crate::record::{NewRecord, Record, RecordType, Zone};

/// Trait for DNS provider implementations
///
/// # Trust Level: Untrusted
///
/// Providers are stateless and single-shot:
///
/// - One API operation per call; errors are returned, never retried
/// - No caching of zones or records between calls
/// - No spawned tasks
/// - No decisions about whether a mutation is needed (owned by the engine)
///
/// Failures are reported as `Error::Provider` carrying the HTTP status when
/// one is available.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List every zone visible to the credentials
    async fn list_zones(&self) -> Result<Vec<Zone>, crate::Error>;

    /// List address records in a zone
    ///
    /// With `record_type = None` both A and AAAA records are returned. Other
    /// record types are never returned.
    async fn list_records(
        &self,
        zone_id: &str,
        record_type: Option<RecordType>,
    ) -> Result<Vec<Record>, crate::Error>;

    /// Create a record and return it as stored by the provider
    async fn create_record(&self, zone_id: &str, record: &NewRecord)
    -> Result<Record, crate::Error>;

    /// Point an existing record at a new address
    ///
    /// Only the address changes; comment and proxied flag are left alone.
    async fn update_record_address(
        &self,
        zone_id: &str,
        record_id: &str,
        address: IpAddr,
    ) -> Result<(), crate::Error>;

    /// Delete a record
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
