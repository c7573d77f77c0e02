// # HTTP Address Resolver
//
// Looks up the host's public addresses by asking an HTTP "what is my IP"
// service, one endpoint per address family.
//
// ## Architecture
//
// Each `resolve` call fetches the enabled families afresh. The response
// body is expected to be the bare address as text; surrounding whitespace
// is ignored. Nothing is cached and no background polling happens.

use async_trait::async_trait;
use cloudflaere_core::traits::{AddressResolver, Addresses};
use cloudflaere_core::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use tracing::debug;

/// IPv4-only lookup endpoint
pub const DEFAULT_IPV4_URL: &str = "https://ipv4.wtfismyip.com/text";

/// IPv6-only lookup endpoint
pub const DEFAULT_IPV6_URL: &str = "https://ipv6.wtfismyip.com/text";

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based public address resolver
#[derive(Debug, Clone)]
pub struct HttpAddressResolver {
    ipv4_url: String,
    ipv6_url: String,
    client: reqwest::Client,
}

impl HttpAddressResolver {
    /// Create a resolver using the default lookup services
    pub fn new() -> Result<Self> {
        Self::with_urls(DEFAULT_IPV4_URL, DEFAULT_IPV6_URL)
    }

    /// Create a resolver with custom per-family lookup URLs
    pub fn with_urls(ipv4_url: impl Into<String>, ipv6_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            ipv4_url: ipv4_url.into(),
            ipv6_url: ipv6_url.into(),
            client,
        })
    }

    /// Fetch and parse one address
    async fn fetch(&self, url: &str) -> Result<IpAddr> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::lookup(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::lookup(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::lookup(format!("Failed to read response from {}: {}", url, e)))?;
        let text = text.trim();

        text.parse()
            .map_err(|_| Error::lookup(format!("Invalid IP address from {}: {:?}", url, text)))
    }

    async fn fetch_v4(&self) -> Result<Ipv4Addr> {
        match self.fetch(&self.ipv4_url).await? {
            IpAddr::V4(v4) => Ok(v4),
            other => Err(Error::lookup(format!("Expected IPv4, got: {}", other))),
        }
    }

    async fn fetch_v6(&self) -> Result<Ipv6Addr> {
        match self.fetch(&self.ipv6_url).await? {
            IpAddr::V6(v6) => Ok(v6),
            other => Err(Error::lookup(format!("Expected IPv6, got: {}", other))),
        }
    }
}

#[async_trait]
impl AddressResolver for HttpAddressResolver {
    async fn resolve(&self, want_ipv4: bool, want_ipv6: bool) -> Result<Addresses> {
        let mut addresses = Addresses::default();

        if want_ipv4 {
            let v4 = self.fetch_v4().await?;
            debug!(address = %v4, "resolved public IPv4 address");
            addresses.a = Some(v4);
        }

        if want_ipv6 {
            let v6 = self.fetch_v6().await?;
            debug!(address = %v6, "resolved public IPv6 address");
            addresses.aaaa = Some(v6);
        }

        Ok(addresses)
    }

    fn resolver_name(&self) -> &'static str {
        "http"
    }
}
