//! One-shot pipeline runner.
//!
//! Takes a source video locator as its single argument, runs the full
//! pipeline against it and exits non-zero if the job does not reach a
//! terminal success status.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vodpipe_models::{Job, JobStatus, SourceVideo};
use vodpipe_publish::ResumableUploadClient;
use vodpipe_storage::StorageGateway;
use vodpipe_worker::{
    FfmpegExtractor, LogSink, PipelineOrchestrator, RemoteContentGenerator, WorkerConfig,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vodpipe=info".parse().unwrap());

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

    let Some(source) = std::env::args().nth(1) else {
        eprintln!("usage: vodpipe-worker <source-locator>");
        std::process::exit(2);
    };

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let storage = match StorageGateway::from_env(config.storage_retry()) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("Failed to create storage gateway: {}", e);
            std::process::exit(1);
        }
    };

    let extractor = match FfmpegExtractor::discover() {
        Ok(extractor) => extractor.with_timeout(config.call_timeout),
        Err(e) => {
            error!("FFmpeg toolkit not available: {}", e);
            std::process::exit(1);
        }
    };

    let generator = match RemoteContentGenerator::from_env() {
        Ok(generator) => generator,
        Err(e) => {
            error!("Content service not configured: {}", e);
            std::process::exit(1);
        }
    };

    let publisher = if config.publish_enabled {
        match ResumableUploadClient::from_env() {
            Ok(client) => Some(client),
            Err(e) => {
                error!("Publishing enabled but platform not configured: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    // Best effort; remote sources report their own size server-side.
    let size_bytes = tokio::fs::metadata(&source)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    let job = Job::new(SourceVideo::new(source, size_bytes, "video/mp4"));
    let job_id = job.id.clone();

    let orchestrator = PipelineOrchestrator::new(
        storage,
        Arc::new(extractor),
        Arc::new(generator),
        Arc::new(LogSink),
        publisher,
        config,
    );

    match orchestrator.run(job).await {
        Ok(job) => match job.status {
            JobStatus::Completed => {
                info!(job_id = %job_id, "Job completed");
            }
            JobStatus::Partial => {
                warn!(
                    job_id = %job_id,
                    "Job completed partially: {}",
                    job.error_message.as_deref().unwrap_or("unknown")
                );
            }
            _ => {
                error!(
                    job_id = %job_id,
                    "Job failed: {}",
                    job.error_message.as_deref().unwrap_or("unknown")
                );
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!(job_id = %job_id, "Pipeline did not run: {}", e);
            std::process::exit(1);
        }
    }
}
