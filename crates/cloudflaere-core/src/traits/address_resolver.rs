// # Address Resolver Trait
//
// Defines the interface for looking up the host's public IP addresses.
//
// ## Implementations
//
// - HTTP lookup services: `cloudflaere-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use cloudflaere_core::AddressResolver;
//
// let addresses = resolver.resolve(true, false).await?;
// if let Some(v4) = addresses.a {
//     println!("public IPv4: {}", v4);
// }
// ```

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::record::RecordType;

/// Public addresses of the host, one per enabled family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Addresses {
    /// Target of A records
    pub a: Option<Ipv4Addr>,
    /// Target of AAAA records
    pub aaaa: Option<Ipv6Addr>,
}

impl Addresses {
    /// Address targets in reconciliation order: A first, then AAAA
    pub fn targets(&self) -> Vec<(RecordType, IpAddr)> {
        let mut targets = Vec::with_capacity(2);
        if let Some(v4) = self.a {
            targets.push((RecordType::A, IpAddr::V4(v4)));
        }
        if let Some(v6) = self.aaaa {
            targets.push((RecordType::Aaaa, IpAddr::V6(v6)));
        }
        targets
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_none() && self.aaaa.is_none()
    }
}

/// Trait for public address lookups
///
/// A pure query: no state, no caching, no background tasks. Each call looks
/// the addresses up afresh so the engine always decides on current data.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve the requested address families
    ///
    /// # Returns
    ///
    /// - `Ok(Addresses)`: every requested family is present
    /// - `Err(Error::Lookup)`: network failure, unparseable response, or a
    ///   requested family could not be resolved
    async fn resolve(&self, want_ipv4: bool, want_ipv6: bool)
    -> Result<Addresses, crate::Error>;

    /// Get the resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}
