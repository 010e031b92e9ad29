//! Daemon orchestration -- assembly and lifecycle management.
//!
//! The [`Orchestrator`] loads configuration, installs the optional metrics
//! endpoint, builds the log pipeline, and runs it until a shutdown signal
//! arrives.
//!
//! # Lifecycle
//!
//! 1. Load `spikewatch.toml` (or legacy JSON), apply environment overrides, validate
//! 2. Build the log pipeline (column schema, file pattern, alert sink)
//! 3. Start: take the baseline snapshot, run the startup scan, begin polling
//! 4. Wait for SIGTERM / SIGINT
//! 5. Stop: let the in-flight file finish, tear down the watcher

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use spikewatch_core::config::SpikewatchConfig;
use spikewatch_core::pipeline::{HealthStatus, Pipeline};
use spikewatch_log_pipeline::alert::{AlertSink, TracingSink};
use spikewatch_log_pipeline::{
    AlertPipeline, FileAnalysis, LogPipeline, LogPipelineBuilder, PipelineConfig,
};

use crate::metrics_server;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: SpikewatchConfig,
    /// The directory-watching alert pipeline.
    pipeline: LogPipeline,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read, parsed
    /// or validated, or if the pipeline fails to build.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = SpikewatchConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration, reporting through `tracing`.
    pub async fn build_from_config(config: SpikewatchConfig) -> Result<Self> {
        Self::build_with_sink(config, Arc::new(TracingSink)).await
    }

    /// Build from an already-loaded configuration with a custom alert sink.
    pub async fn build_with_sink(
        config: SpikewatchConfig,
        sink: Arc<dyn AlertSink>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_daemon_metrics();
        }

        let pipeline = LogPipelineBuilder::new()
            .config(PipelineConfig::from_core(&config))
            .sink(sink)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

        tracing::info!(
            directory = %config.watcher.directory,
            pattern = %config.watcher.pattern,
            recursive = config.watcher.recursive,
            scan_filter = %config.watcher.scan_filter,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline,
            start_time: Instant::now(),
        })
    }

    /// Start the pipeline and run until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start the pipeline and run until `shutdown` resolves.
    ///
    /// `shutdown` yields the name of the trigger for logging.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start log pipeline: {}", e))?;

        tracing::info!("spikewatch-daemon running");
        let waited = shutdown.await;

        match &waited {
            Ok(signal) => tracing::info!(signal = *signal, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "shutdown signal handling failed"),
        }

        self.pipeline
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop log pipeline: {}", e))?;

        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "spikewatch-daemon shut down"
        );
        waited.map(|_| ())
    }

    /// Current pipeline health.
    pub async fn health(&self) -> HealthStatus {
        self.pipeline.health_check().await
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &SpikewatchConfig {
        &self.config
    }
}

/// Run the alert pipeline once on a single file.
///
/// Both reports are handed to `sink`. Per-file errors are returned.
pub async fn analyze_file(
    config: &SpikewatchConfig,
    path: &Path,
    sink: Arc<dyn AlertSink>,
) -> Result<FileAnalysis> {
    let pipeline_config = PipelineConfig::from_core(config);
    let schema = pipeline_config
        .column_schema()
        .map_err(|e| anyhow::anyhow!("invalid column schema: {}", e))?;
    let pipeline = AlertPipeline::new(schema, sink);

    let path = path.to_path_buf();
    let analysis = tokio::task::spawn_blocking(move || pipeline.run_file(&path)).await??;
    Ok(analysis)
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for Ctrl+C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl+C handler: {}", e))?;
    Ok("CTRL_C")
}

/// Record daemon-level metrics (build info).
fn record_daemon_metrics() {
    use spikewatch_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}
