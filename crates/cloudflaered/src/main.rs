// # cloudflaered - Cloudflare DNS for Traefik routes
//
// This daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from the config file, environment and flags
// 2. Initializing logging and the runtime
// 3. Building the Traefik, address lookup and Cloudflare collaborators
// 4. Running the cycle engine until SIGTERM/SIGINT
//
// All reconciliation logic lives in cloudflaere-core.
//
// ## Configuration
//
// Settings come from `cloudflaere.yaml` (see [`settings`]), then from
// `CLOUDFLAERE_*` environment variables, then from flags; later sources win.
// `cloudflaered --help` lists every option with its variable.
//
// ### Required
// - `--cf-zone` / `CLOUDFLAERE_CF_ZONE_TOKEN`: Cloudflare token with Zone:Read
// - `--tr-url` / `CLOUDFLAERE_TRAEFIK_URL`: Traefik API base URL
//
// ## Usage
//
// ```bash
// export CLOUDFLAERE_CF_ZONE_TOKEN=...
// export CLOUDFLAERE_TRAEFIK_URL=http://traefik:8080
//
// cloudflaered -4                  # run, publishing A records
// cloudflaered --config ./cf.yaml  # run with an explicit config file
// cloudflaered config              # print the effective configuration and exit
// ```

mod cli;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use cloudflaere_core::{CycleEngine, EngineEvent};
use cloudflaere_ip_http::HttpAddressResolver;
use cloudflaere_provider_cloudflare::CloudflareProvider;
use cloudflaere_routes_traefik::TraefikRouteDiscovery;
use std::process::ExitCode;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Command};
use settings::Settings;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum CloudflaeredExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<CloudflaeredExitCode> for ExitCode {
    fn from(code: CloudflaeredExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version land here too
            let code = if e.use_stderr() {
                CloudflaeredExitCode::ConfigError
            } else {
                CloudflaeredExitCode::CleanShutdown
            };
            let _ = e.print();
            return code.into();
        }
    };

    let settings = match Settings::load(&cli.overrides) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return CloudflaeredExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CloudflaeredExitCode::ConfigError.into();
    }

    match &settings.source {
        Some(path) => info!(path = %path.display(), "loaded config file"),
        None => debug!("no config file found, using environment and flags only"),
    }

    if cli.command == Some(Command::Config) {
        // ProviderConfig's Debug output redacts the tokens
        info!("Effective configuration:\n{:#?}", settings.config);
        info!("Mode: {}", if settings.dry_run { "dry-run" } else { "live" });
        return CloudflaeredExitCode::CleanShutdown.into();
    }

    info!("Starting cloudflaered");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CloudflaeredExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(settings).await {
            Ok(()) => CloudflaeredExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                match e.downcast_ref::<cloudflaere_core::Error>() {
                    Some(cloudflaere_core::Error::Config(_)) => CloudflaeredExitCode::ConfigError,
                    _ => CloudflaeredExitCode::RuntimeError,
                }
            }
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(settings: Settings) -> Result<()> {
    let dry_run = settings.dry_run;
    let settings = &settings.config;

    let resolver = HttpAddressResolver::new()?;
    let discovery = TraefikRouteDiscovery::from_config(&settings.traefik)?;
    let provider = CloudflareProvider::from_config(&settings.provider, dry_run)?;

    // Reachability probe; an unreachable Traefik is retried every cycle
    match discovery.version().await {
        Ok(version) => info!(
            url = %settings.traefik.url,
            version = %version.version,
            codename = %version.codename,
            "connected to Traefik"
        ),
        Err(e) => warn!(url = %settings.traefik.url, error = %e, "Traefik version probe failed"),
    }

    let (engine, events) = CycleEngine::new(
        Box::new(resolver),
        Box::new(discovery),
        Box::new(provider),
        settings,
    )?;

    info!(
        marker = %engine.marker(),
        interval_secs = settings.interval_secs,
        ipv4 = settings.ddns.ipv4,
        ipv6 = settings.ddns.ipv6,
        proxied = settings.proxied,
        dry_run,
        "engine configured"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(log_events(events));
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling failed, shutting down: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    engine.run_with_shutdown(shutdown_rx).await?;

    info!("Shutting down daemon");
    Ok(())
}

/// Trace engine events; ends when the engine drops its sender
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        debug!(?event, "engine event");
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
