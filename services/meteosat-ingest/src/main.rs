//! Meteosat ingest service.
//!
//! Polls the EUMETSAT Data Store for the next SEVIRI scene and exports it with:
//! - A persisted cursor that advances one scene per successful cycle
//! - Commit-after-export so failed cycles are retried from scratch
//! - A non-overlapping fixed-interval scheduler
//! - HTTP status API and Prometheus metrics for monitoring

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use eumdac_client::{Catalog, Credentials, EumdacClient};
use meteosat_ingest::server::{self, ServerState};
use meteosat_ingest::{CycleTracker, Dataset, IngestConfig, MeteosatSource, Scheduler};
use raster_tools::Toolchain;

#[derive(Parser, Debug)]
#[command(name = "meteosat-ingest")]
#[command(about = "Keeps clipped Meteosat SEVIRI rasters in step with the EUMETSAT archive")]
struct Args {
    /// Run a single update cycle and exit
    #[arg(long)]
    once: bool,

    /// Minutes between update cycles
    #[arg(long, env = "MINUTES_UPDATE_INTERVAL", default_value = "15")]
    interval_minutes: u64,

    /// EUMETSAT API consumer key
    #[arg(long, env = "EUMETSAT_CONSUMER_KEY")]
    consumer_key: String,

    /// EUMETSAT API consumer secret
    #[arg(long, env = "EUMETSAT_CONSUMER_SECRET", hide_env_values = true)]
    consumer_secret: String,

    /// Data Store base URL
    #[arg(long, env = "EUMETSAT_API_URL", default_value = eumdac_client::DEFAULT_API_URL)]
    api_url: String,

    /// Directory for the cursor state file
    #[arg(long, env = "STATE_DIR", default_value = "/data/state")]
    state_dir: PathBuf,

    /// Root directory for exported rasters
    #[arg(long, env = "OUTPUT_DIR", default_value = "/data/output")]
    output_dir: PathBuf,

    /// Parent directory for per-cycle working areas (default: system temp)
    #[arg(long, env = "TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Program that decodes and resamples native scenes
    #[arg(long, env = "RESAMPLE_COMMAND", default_value = "msg-resample")]
    resample_command: PathBuf,

    /// gdal_translate binary used for clipping and band export
    #[arg(long, env = "GDAL_TRANSLATE", default_value = "gdal_translate")]
    gdal_translate: PathBuf,

    /// HTTP timeout for catalog requests, in seconds
    #[arg(long, default_value = "600")]
    request_timeout_secs: u64,

    /// Log level
    #[arg(long, env = "LOG", default_value = "info")]
    log_level: String,

    /// Port for status HTTP server
    #[arg(long, env = "STATUS_PORT", default_value = "8081")]
    status_port: u16,

    /// Disable status HTTP server
    #[arg(long)]
    no_status_server: bool,
}

impl Args {
    fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            update_interval: Duration::from_secs(self.interval_minutes * 60),
            credentials: Credentials::new(&self.consumer_key, &self.consumer_secret),
            api_url: self.api_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            state_dir: self.state_dir.clone(),
            output_dir: self.output_dir.clone(),
            temp_dir: self.temp_dir.clone(),
            resample_command: self.resample_command.clone(),
            gdal_translate: self.gdal_translate.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!("Starting meteosat ingest");

    let config = args.ingest_config();
    config.validate().context("Invalid configuration")?;

    tokio::fs::create_dir_all(&config.output_dir).await?;
    if let Some(temp_dir) = &config.temp_dir {
        tokio::fs::create_dir_all(temp_dir).await?;
    }

    // Authenticate up front so bad credentials fail at start-up
    let client = EumdacClient::connect(config.client_config())
        .await
        .context("Failed to authenticate with the Data Store")?;
    let catalog: Arc<dyn Catalog> = Arc::new(client);

    let dataset = Dataset::meteosat();
    let toolchain = Toolchain::from_commands(
        config.resample_command.clone(),
        dataset.grid.clone(),
        config.gdal_translate.clone(),
    );

    let source = Arc::new(MeteosatSource::new(
        &config,
        dataset.clone(),
        catalog,
        toolchain,
    )?);

    let tracker = Arc::new(CycleTracker::new());
    let scheduler = Scheduler::new(source.clone(), config.update_interval, tracker.clone());

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start status server (unless disabled or in --once mode)
    if !args.no_status_server && !args.once {
        let server_state = Arc::new(ServerState {
            store: source.store(),
            tracker: tracker.clone(),
            dataset,
            metrics: Some(prometheus_handle),
        });
        let status_port = args.status_port;
        tokio::spawn(async move {
            if let Err(e) = server::run_server(server_state, status_port).await {
                tracing::error!(error = %e, "Status server failed");
            }
        });
    }

    if args.once {
        info!("Running single update cycle");
        scheduler.run_once().await?;
    } else {
        info!(
            interval_minutes = args.interval_minutes,
            "Starting continuous updates"
        );

        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("Received shutdown signal");
            shutdown_tx_clone.send(()).ok();
        });

        scheduler.run_forever(shutdown_tx.subscribe()).await;
    }

    let report = tracker.snapshot();
    info!(
        cycles = report.cycles_run,
        processed = report.processed,
        not_available = report.not_available,
        failures = report.failures,
        "Ingest session complete"
    );

    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
