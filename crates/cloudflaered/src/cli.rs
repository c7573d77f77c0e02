//! Command line interface
//!
//! Every option can also be given through its `CLOUDFLAERE_*` environment
//! variable; a flag wins over the variable. Both win over the config file.

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "cloudflaered",
    version,
    about = "Keeps Cloudflare DNS records in line with Traefik routes",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the reconciliation loop (the default)
    Run,
    /// Dump the effective configuration to the log and exit
    Config,
}

/// Options layered over the config file
///
/// `None` (or an empty list) means "not given", so the file value or the
/// built-in default applies.
#[derive(Debug, Default, Args)]
pub struct Overrides {
    /// Config file path [default: cloudflaere.yaml in ., $HOME/.cloudflaere,
    /// /etc/cloudflaere or $HOME/.config/cloudflaere]
    #[arg(long, env = "CLOUDFLAERE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output debug logs
    #[arg(
        short,
        long,
        env = "CLOUDFLAERE_VERBOSE",
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub verbose: Option<bool>,

    /// Log level
    #[arg(long, env = "CLOUDFLAERE_LOG_LEVEL", global = true, value_enum, ignore_case = true)]
    pub log_level: Option<LogLevel>,

    /// Seconds between reconciliation cycles [default: 60]
    #[arg(
        long,
        env = "CLOUDFLAERE_INTERVAL",
        global = true,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval: Option<u64>,

    /// Unique name of this instance, written into the ownership marker [default: host name]
    #[arg(long, env = "CLOUDFLAERE_INSTANCE", global = true)]
    pub instance: Option<String>,

    /// Target Traefik API URL (e.g. https://traefik.example.com)
    #[arg(long, env = "CLOUDFLAERE_TRAEFIK_URL", global = true)]
    pub tr_url: Option<String>,

    /// Accept invalid TLS certificates from Traefik
    #[arg(
        long,
        env = "CLOUDFLAERE_TRAEFIK_INSECURE",
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub tr_insecure: Option<bool>,

    /// Create new records proxied by Cloudflare
    #[arg(
        long,
        env = "CLOUDFLAERE_PROXIED",
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub cf_proxied: Option<bool>,

    /// Cloudflare API token with Zone:Read
    #[arg(long, env = "CLOUDFLAERE_CF_ZONE_TOKEN", global = true, hide_env_values = true)]
    pub cf_zone: Option<String>,

    /// Cloudflare API token with Zone:DNS:Edit [default: the zone token]
    #[arg(long, env = "CLOUDFLAERE_CF_DNS_TOKEN", global = true, hide_env_values = true)]
    pub cf_dns: Option<String>,

    /// Publish A records with the public IPv4 address
    #[arg(
        short = '4',
        long,
        env = "CLOUDFLAERE_DDNS_IPV4",
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub ipv4: Option<bool>,

    /// Publish AAAA records with the public IPv6 address
    #[arg(
        short = '6',
        long,
        env = "CLOUDFLAERE_DDNS_IPV6",
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub ipv6: Option<bool>,

    /// Only manage these zones (comma-separated) [default: every zone]
    #[arg(long, env = "CLOUDFLAERE_ZONES", global = true, value_delimiter = ',')]
    pub zones: Vec<String>,

    /// Deadline for each API call, in seconds [default: 30]
    #[arg(
        long,
        env = "CLOUDFLAERE_CALL_TIMEOUT",
        global = true,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub call_timeout: Option<u64>,

    /// live, or dry-run to log mutations without sending them [default: live]
    #[arg(long, env = "CLOUDFLAERE_MODE", global = true, value_enum, ignore_case = true)]
    pub mode: Option<Mode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    Live,
    DryRun,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("cloudflaered").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_arguments_runs_with_nothing_overridden() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.command, None);
        assert!(cli.overrides.cf_zone.is_none());
        assert!(cli.overrides.interval.is_none());
        assert!(cli.overrides.ipv4.is_none());
        assert!(cli.overrides.zones.is_empty());

        assert_eq!(parse(&["run"]).unwrap().command, Some(Command::Run));
    }

    #[test]
    fn all_flags_are_read() {
        let cli = parse(&[
            "config",
            "--config",
            "/tmp/cloudflaere.yaml",
            "--cf-zone",
            "zone-token",
            "--cf-dns",
            "dns-token",
            "--tr-url",
            "http://traefik:8080",
            "--tr-insecure",
            "--interval",
            "300",
            "--instance",
            "edge-1",
            "--cf-proxied=false",
            "-4",
            "--ipv6=yes",
            "--zones",
            "example.com,example.org",
            "--call-timeout",
            "10",
            "--log-level",
            "DEBUG",
            "--mode",
            "dry-run",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.command, Some(Command::Config));
        let o = cli.overrides;
        assert_eq!(o.config, Some(PathBuf::from("/tmp/cloudflaere.yaml")));
        assert_eq!(o.cf_zone.as_deref(), Some("zone-token"));
        assert_eq!(o.cf_dns.as_deref(), Some("dns-token"));
        assert_eq!(o.tr_url.as_deref(), Some("http://traefik:8080"));
        assert_eq!(o.tr_insecure, Some(true));
        assert_eq!(o.interval, Some(300));
        assert_eq!(o.instance.as_deref(), Some("edge-1"));
        assert_eq!(o.cf_proxied, Some(false));
        assert_eq!(o.ipv4, Some(true));
        assert_eq!(o.ipv6, Some(true));
        assert_eq!(o.zones, vec!["example.com", "example.org"]);
        assert_eq!(o.call_timeout, Some(10));
        assert_eq!(o.log_level, Some(LogLevel::Debug));
        assert_eq!(o.mode, Some(Mode::DryRun));
        assert_eq!(o.verbose, Some(true));
    }

    #[test]
    fn bare_switch_does_not_swallow_the_subcommand() {
        let cli = parse(&["-4", "config"]).unwrap();
        assert_eq!(cli.overrides.ipv4, Some(true));
        assert_eq!(cli.command, Some(Command::Config));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases: [&[&str]; 7] = [
            &["--interval", "soon"],
            &["--interval", "0"],
            &["--call-timeout", "0"],
            &["--cf-proxied=maybe"],
            &["--log-level", "loud"],
            &["--mode", "yolo"],
            &["serve"],
        ];
        for args in cases {
            assert!(parse(args).is_err(), "{:?} should be rejected", args);
        }
    }

    #[test]
    fn help_and_version_are_not_errors() {
        assert_eq!(parse(&["--help"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
        assert_eq!(parse(&["--version"]).unwrap_err().kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn log_levels_map_to_tracing() {
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }
}
