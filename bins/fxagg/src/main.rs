//! FxAgg CLI and pipeline binary
//!
//! `fxagg start` connects every enabled platform and publishes cross rates
//! until Ctrl+C. `validate` and `init` work on the configuration file only.

use anyhow::{Context, Result};
use cli::{Cli, Commands};
use config::{generate_default_config, load_config, save_config, validate_config, MasterConfig, ValidationReport};
use coordinator::{load_providers, Coordinator, ShutdownController};
use observability::{init_logging, init_metrics, LogFormat};
use provider::ProviderRegistry;
use publisher::default_sink_factory;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use storage::spawn_retention;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Start {
            config,
            log_format,
            metrics_port,
        } => start_pipeline(config, log_format, metrics_port).await,
        Commands::Validate { config } => {
            init_logging("fxagg", LogFormat::Compact)?;
            validate_command(config)
        }
        Commands::Init { output } => {
            init_logging("fxagg", LogFormat::Compact)?;
            init_command(output)
        }
    }
}

fn log_report(report: &ValidationReport) {
    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }
    for err in &report.errors {
        error!("{}", err);
    }
}

async fn start_pipeline(config_path: PathBuf, log_format: Option<String>, metrics_port: Option<u16>) -> Result<()> {
    let config = load_config(&config_path)?;

    let format = log_format.as_deref().unwrap_or(&config.logging.format);
    let format = LogFormat::parse(format).unwrap_or_default();
    init_logging("fxagg", format)?;
    info!(path = ?config_path, application = %config.application.name, "FxAgg starting");

    let report = validate_config(&config);
    log_report(&report);
    if !report.is_valid() {
        error!(error_count = report.errors.len(), "Configuration validation failed");
        anyhow::bail!("Cannot start due to configuration errors");
    }

    let metrics_port = metrics_port.or(config
        .metrics
        .as_ref()
        .filter(|m| m.enabled)
        .map(|m| m.port));
    if let Some(port) = metrics_port {
        init_metrics(port)?;
    }

    run(config).await
}

async fn run(config: MasterConfig) -> Result<()> {
    let shutdown = ShutdownController::with_ctrl_c();

    let coordinator = Arc::new(
        Coordinator::from_config(&config, default_sink_factory())
            .await
            .context("Failed to assemble the pipeline")?,
    );

    let retention = spawn_retention(
        coordinator.store().clone(),
        Duration::from_secs(config.store.retention_interval_seconds.max(1)),
        shutdown.child_token(),
    );
    let health = coordinator.producer().spawn_health_check(shutdown.child_token());

    let providers = load_providers(coordinator.clone(), &config.platforms, &ProviderRegistry::with_defaults()).await;
    if providers.is_empty() {
        warn!("No provider started; waiting for shutdown");
    }
    info!(platforms = ?providers.platforms(), "FxAgg running, press Ctrl+C to stop");

    shutdown.wait_for_shutdown().await;

    providers.disconnect_all().await;
    for (name, task) in [("retention", retention), ("health check", health)] {
        if let Err(e) = task.await {
            warn!(task = name, error = %e, "Background task ended abnormally");
        }
    }
    info!("FxAgg stopped");
    Ok(())
}

fn validate_command<P: AsRef<Path>>(config_path: P) -> Result<()> {
    info!(path = ?config_path.as_ref(), "Validating configuration");

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Application: {}", config.application.name);
    println!("Platforms: {}", config.enabled_platforms().count());
    for platform in config.enabled_platforms() {
        println!(
            "  - {} ({}, {} subscription(s))",
            platform.name,
            platform.kind,
            platform.subscriptions.len()
        );
    }
    println!("Filters: {}", config.filters.iter().filter(|f| f.enabled).count());
    println!("Targets: {}", config.calculation.targets.join(", "));
    println!("Topic: {}", config.kafka.topic);

    Ok(())
}

fn init_command<P: AsRef<Path>>(output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&config, output_path)?;
    debug!(platforms = config.platforms.len(), "Default configuration written");

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("This configuration includes:");
    println!("  - 2 platforms (PF1 over TCP, PF2 over REST)");
    println!("  - jump threshold and moving average filters");
    println!("  - USDTRY, EURUSD and GBPUSD targets");
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file to point at your feeds and broker");
    println!("  2. Set required environment variables (PF2_API_KEY)");
    println!("  3. Run 'fxagg validate --config {:?}' to check configuration", output_path);
    println!("  4. Run 'fxagg start --config {:?}' to start the pipeline", output_path);

    Ok(())
}
