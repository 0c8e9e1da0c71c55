//! Photo Hydrator - command-line front end
//!
//! Eagerly hydrates the photo URLs of the slugs given on the command line
//! and prints a JSON report.

use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photo_hydrator::models::HydrationReport;
use photo_hydrator::{Config, HttpResolver, HydrationMode, SchedulerContext};

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the scheduler context with an HTTP resolver
/// 4. Hydrate the requested slugs
/// 5. Print the report once every lookup settles, or on Ctrl+C/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photo_hydrator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let slugs: Vec<String> = std::env::args().skip(1).collect();
    if slugs.is_empty() {
        bail!("usage: photo_hydrator <slug>...");
    }

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_concurrent={}, max_hydrate_limit={}, api_base_url={}",
        config.max_concurrent, config.max_hydrate_limit, config.api_base_url
    );

    let resolver = HttpResolver::from_config(&config).context("building HTTP resolver")?;
    let fallback = config.fallback_photo.clone();
    let ctx = SchedulerContext::create(config, Arc::new(resolver))
        .context("creating scheduler context")?;

    let hydration = ctx.hydrate(&slugs, HydrationMode::Eager);
    info!(items = slugs.len(), "Hydration started");

    tokio::select! {
        _ = hydration.idle() => {
            info!("All lookups settled");
        }
        _ = shutdown_signal() => {
            warn!("Interrupted, reporting partial results");
        }
    }

    let report = HydrationReport::new(&hydration, &ctx, &fallback);
    ctx.dispose();

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serializing report")?
    );
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
