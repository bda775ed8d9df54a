//! Highlight reel worker binary.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_media::{check_ffmpeg, check_ffprobe, ReelAssembler};
use reel_ranking::RankingClient;
use reel_storage::{BlobRouter, BlobStore, LocalBlobStore, R2Client, R2Config};
use reel_worker::{
    metrics, HighlightJob, KeywordMarkerValidator, LoggingStatusHook, ReelJobRunner,
    SelectionPipeline, WorkerConfig,
};

#[derive(Debug, Parser)]
#[command(name = "reel-worker", version, about = "Select and assemble highlight reels")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one job described by a JSON file
    Run {
        /// Path to the job JSON
        #[arg(long)]
        job: PathBuf,
        /// Also write the outcome to this file
        #[arg(long)]
        output_json: Option<PathBuf>,
    },
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn blob_store() -> anyhow::Result<Arc<dyn BlobStore>> {
    let router = BlobRouter::new(Arc::new(LocalBlobStore::new()));
    if R2Config::is_configured_in_env() {
        let r2 = R2Client::from_env().context("configuring R2 client")?;
        info!(bucket = r2.bucket(), "Object storage enabled");
        Ok(Arc::new(router.with_object_store(Arc::new(r2))))
    } else {
        Ok(Arc::new(router))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Required by reqwest and the AWS SDK for TLS
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = WorkerConfig::from_env();
    info!(?config, "Starting reel-worker");

    if let Some(port) = config.metrics_port {
        metrics::install_exporter(port)?;
        info!(port, "Metrics exporter listening");
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling FFmpeg");
            let _ = cancel_tx.send(true);
        }
    });

    match cli.command {
        Command::Run { job, output_json } => {
            let ffmpeg = check_ffmpeg().context("ffmpeg preflight")?;
            let ffprobe = check_ffprobe().context("ffprobe preflight")?;
            info!(ffmpeg = %ffmpeg.display(), ffprobe = %ffprobe.display(), "Media tools found");

            let job = HighlightJob::from_path(&job)
                .await
                .with_context(|| format!("reading job {}", job.display()))?;

            let status = Arc::new(LoggingStatusHook);
            let pipeline = SelectionPipeline::new(
                config.selection.clone(),
                Arc::new(KeywordMarkerValidator::with_defaults()?),
                Arc::new(RankingClient::from_env()?),
            );
            let assembler = ReelAssembler::new(config.assembly()).with_cancel(cancel_rx);
            let runner = ReelJobRunner::new(config, blob_store()?, pipeline, assembler)
                .with_status_hook(status);

            let outcome = runner.run(job).await;
            let rendered = serde_json::to_string_pretty(&outcome)?;

            if let Some(path) = output_json {
                tokio::fs::write(&path, &rendered)
                    .await
                    .with_context(|| format!("writing outcome to {}", path.display()))?;
            }
            println!("{rendered}");

            Ok(if outcome.is_completed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            })
        }
    }
}
