//! Collaborator traits
//!
//! The engine only talks to the outside world through these interfaces.
//!
//! - [`AddressResolver`]: Look up the host's public addresses
//! - [`RouteDiscovery`]: List hostnames the reverse proxy routes for
//! - [`DnsProvider`]: List zones and records, mutate records

pub mod address_resolver;
pub mod dns_provider;
pub mod route_discovery;

pub use address_resolver::{AddressResolver, Addresses};
pub use dns_provider::DnsProvider;
pub use route_discovery::RouteDiscovery;
