//! Layered daemon settings
//!
//! Precedence, lowest first: built-in defaults, the YAML config file, then
//! environment variables and flags (merged by clap in [`crate::cli`]).
//!
//! ```yaml
//! interval: 60          # seconds
//! instance: edge-1
//! verbose: false
//! traefik:
//!   url: https://traefik.example.com
//!   insecure: false
//! cloudflare:
//!   zone: <Zone:Read token>
//!   dns: <Zone:DNS:Edit token>
//!   proxied: false
//! ddns:
//!   ipv4: true
//!   ipv6: false
//! ```

use anyhow::{Context, Result};
use cloudflaere_core::config::{CloudflaereConfig, ProviderConfig, TraefikConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::Level;

use crate::cli::{LogLevel, Mode, Overrides};

/// File names looked for in each search directory
const CONFIG_FILE_NAMES: [&str; 2] = ["cloudflaere.yaml", "cloudflaere.yml"];

/// Contents of the config file; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub interval: Option<u64>,
    pub instance: Option<String>,
    pub verbose: Option<bool>,
    pub log_level: Option<LogLevel>,
    pub mode: Option<Mode>,
    pub call_timeout: Option<u64>,
    pub zones: Vec<String>,
    pub traefik: TraefikSection,
    pub cloudflare: CloudflareSection,
    pub ddns: DdnsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TraefikSection {
    pub url: Option<String>,
    pub insecure: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CloudflareSection {
    pub zone: Option<String>,
    pub dns: Option<String>,
    pub proxied: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DdnsSection {
    pub ipv4: Option<bool>,
    pub ipv6: Option<bool>,
}

impl FileSettings {
    /// Read a YAML config file
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .build()
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Directories searched for a config file, in order
pub fn search_dirs(home: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(".")];
    if let Some(home) = home {
        dirs.push(home.join(".cloudflaere"));
    }
    dirs.push(PathBuf::from("/etc/cloudflaere"));
    if let Some(home) = home {
        dirs.push(home.join(".config").join("cloudflaere"));
    }
    dirs
}

/// First config file found in `dirs`
pub fn locate(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

/// Fully resolved daemon settings
#[derive(Debug)]
pub struct Settings {
    pub config: CloudflaereConfig,
    pub log_level: Level,
    pub dry_run: bool,
    /// Config file the settings were read from, if any
    pub source: Option<PathBuf>,
}

impl Settings {
    /// Load the config file (explicit or searched) and layer `overrides` on top
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let source = match &overrides.config {
            Some(path) => Some(path.clone()),
            None => locate(&search_dirs(dirs::home_dir().as_deref())),
        };
        let file = match &source {
            Some(path) => FileSettings::load(path)?,
            None => FileSettings::default(),
        };

        let mut settings = Self::resolve(overrides, file)?;
        settings.source = source;
        Ok(settings)
    }

    /// Merge overrides with file values and defaults, then validate
    pub fn resolve(overrides: &Overrides, file: FileSettings) -> Result<Self> {
        let zone_token = non_empty(overrides.cf_zone.clone())
            .or(non_empty(file.cloudflare.zone))
            .context(
                "a Cloudflare zone token is required. \
                Set it via --cf-zone, CLOUDFLAERE_CF_ZONE_TOKEN or cloudflare.zone",
            )?;
        let dns_token = non_empty(overrides.cf_dns.clone())
            .or(non_empty(file.cloudflare.dns))
            .unwrap_or_else(|| zone_token.clone());

        let traefik_url = non_empty(overrides.tr_url.clone())
            .or(non_empty(file.traefik.url))
            .context(
                "a Traefik URL is required. \
                Set it via --tr-url, CLOUDFLAERE_TRAEFIK_URL or traefik.url",
            )?;

        let mut config = CloudflaereConfig::new(
            ProviderConfig::Cloudflare {
                zone_token,
                dns_token,
            },
            TraefikConfig {
                url: traefik_url,
                insecure_skip_verify: overrides
                    .tr_insecure
                    .or(file.traefik.insecure)
                    .unwrap_or(false),
            },
        );

        if let Some(interval) = overrides.interval.or(file.interval) {
            config.interval_secs = interval;
        }
        config.instance = non_empty(overrides.instance.clone()).or(non_empty(file.instance));
        config.proxied = overrides
            .cf_proxied
            .or(file.cloudflare.proxied)
            .unwrap_or(false);
        config.ddns.ipv4 = overrides.ipv4.or(file.ddns.ipv4).unwrap_or(false);
        config.ddns.ipv6 = overrides.ipv6.or(file.ddns.ipv6).unwrap_or(false);
        if let Some(timeout) = overrides.call_timeout.or(file.call_timeout) {
            config.engine.call_timeout_secs = timeout;
        }
        let zones = if overrides.zones.is_empty() {
            file.zones
        } else {
            overrides.zones.clone()
        };
        config.engine.zones = zones
            .into_iter()
            .map(|z| z.trim().to_string())
            .filter(|z| !z.is_empty())
            .collect();

        config.validate()?;

        let log_level = match overrides.log_level.or(file.log_level) {
            Some(level) => level.into(),
            None if overrides.verbose.or(file.verbose).unwrap_or(false) => Level::DEBUG,
            None => Level::INFO,
        };
        let dry_run = overrides.mode.or(file.mode).unwrap_or_default() == Mode::DryRun;

        Ok(Self {
            config,
            log_level,
            dry_run,
            source: None,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
