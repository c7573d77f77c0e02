//! Configuration types for cloudflaere
//!
//! The configuration is built once at startup and passed by reference into
//! the engine and its collaborators. Nothing reads configuration from global
//! state after that.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Main cloudflaere configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudflaereConfig {
    /// Seconds to wait between reconciliation cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Identity written into the ownership marker (defaults to the host name)
    #[serde(default)]
    pub instance: Option<String>,

    /// Proxied flag applied to newly created records
    #[serde(default)]
    pub proxied: bool,

    /// Which address families to publish
    #[serde(default)]
    pub ddns: DdnsConfig,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Reverse proxy configuration
    pub traefik: TraefikConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl CloudflaereConfig {
    /// Create a configuration with defaults for everything but the endpoints
    pub fn new(provider: ProviderConfig, traefik: TraefikConfig) -> Self {
        Self {
            interval_secs: default_interval_secs(),
            instance: None,
            proxied: false,
            ddns: DdnsConfig::default(),
            provider,
            traefik,
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("interval must be > 0 seconds"));
        }

        if let Some(instance) = &self.instance
            && instance.contains('#')
        {
            return Err(crate::Error::config(
                "instance name cannot contain '#' (it would break the ownership marker)",
            ));
        }

        self.provider.validate()?;
        self.traefik.validate()?;
        self.engine.validate()?;

        Ok(())
    }

    /// Poll period between cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Address families to resolve and publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Publish A records with the host's public IPv4 address
    #[serde(default)]
    pub ipv4: bool,
    /// Publish AAAA records with the host's public IPv6 address
    #[serde(default)]
    pub ipv6: bool,
}

impl DdnsConfig {
    /// Whether any address family is enabled
    pub fn any(&self) -> bool {
        self.ipv4 || self.ipv6
    }
}

/// DNS provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Token with Zone:Read permission, used to list zones
        zone_token: String,
        /// Token with Zone:DNS:Edit permission, used for record operations
        dns_token: String,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare {
                zone_token,
                dns_token,
            } => {
                if zone_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare zone token cannot be empty"));
                }
                if dns_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare DNS token cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
        }
    }
}

// Tokens must never reach the logs
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::Cloudflare { .. } => f
                .debug_struct("Cloudflare")
                .field("zone_token", &"<REDACTED>")
                .field("dns_token", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Traefik API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraefikConfig {
    /// Base URL of the Traefik API, e.g. `https://traefik.example.com`
    pub url: String,

    /// Accept invalid TLS certificates from the Traefik endpoint
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

impl TraefikConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            insecure_skip_verify: false,
        }
    }

    /// Validate the Traefik configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.url.is_empty() {
            return Err(crate::Error::config("Traefik URL cannot be empty"));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Traefik URL must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        Ok(())
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline for each individual collaborator call (in seconds)
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Zone allow-list; empty means every zone the provider lists
    #[serde(default)]
    pub zones: Vec<String>,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.call_timeout_secs == 0 {
            return Err(crate::Error::config("call timeout must be > 0 seconds"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Whether a zone passes the allow-list
    pub fn allows_zone(&self, name: &str) -> bool {
        self.zones.is_empty() || self.zones.iter().any(|z| z.eq_ignore_ascii_case(name))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_call_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            zones: Vec::new(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    100
}
