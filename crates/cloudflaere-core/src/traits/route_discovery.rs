// # Route Discovery Trait
//
// Defines the interface for asking a reverse proxy which hostnames it
// currently routes for.
//
// ## Implementations
//
// - Traefik API: `cloudflaere-routes-traefik` crate

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::record::Hostname;

/// Trait for reverse-proxy route discovery
///
/// Implementations query the proxy on every call and never cache results
/// between calls.
#[async_trait]
pub trait RouteDiscovery: Send + Sync {
    /// Hostnames of all currently active routes
    ///
    /// # Returns
    ///
    /// - `Ok(set)`: deduplicated, normalized hostnames (may be empty)
    /// - `Err(Error::Discovery)`: proxy unreachable or rules malformed
    async fn active_hostnames(&self) -> Result<BTreeSet<Hostname>, crate::Error>;

    /// Get the discovery source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
