use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use spikewatch_core::config::SpikewatchConfig;
use spikewatch_daemon::cli::DaemonCli;
use spikewatch_daemon::logging;
use spikewatch_daemon::orchestrator::{self, Orchestrator};
use spikewatch_log_pipeline::{PipelineConfig, TracingSink};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = SpikewatchConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;

    // CLI flags take precedence over file and environment
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        PipelineConfig::from_core(&config)
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
        println!("configuration OK: {}", cli.config.display());
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    logging::init_tracing(&config.general)?;

    if let Some(path) = cli.analyze {
        tracing::info!(path = %path.display(), "analyzing single file");
        let analysis = orchestrator::analyze_file(&config, &path, Arc::new(TracingSink)).await?;
        tracing::info!(
            records = analysis.records,
            error_records = analysis.error_records,
            alerts = analysis.total_alerts(),
            "analysis complete"
        );
        return Ok(());
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "spikewatch-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await
}
