//! Briefing worker binary.

use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use brief_lifecycle::{JobController, LifecycleConfig};
use brief_registry::RegistryConfig;
use brief_synthesis::SynthesisClient;
use brief_worker::{BriefingRunner, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("brief=info".parse()?);

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

    info!("Starting brief-worker");

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    info!(
        requester_id = %config.requester_id,
        resume_pending = config.resume_pending,
        submit = config.submit.is_some(),
        "Worker config loaded"
    );

    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics listening on {}", addr);
    }

    let registry = RegistryConfig::from_env()
        .context("Invalid registry configuration")?
        .build_registry()
        .await
        .context("Failed to create job registry")?;
    let client = SynthesisClient::from_env(registry.clone()).context("Failed to create synthesis client")?;
    let controller = JobController::new(Arc::new(client), registry.clone(), LifecycleConfig::from_env());

    // Setup signal handler
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        trigger.cancel();
    });

    let runner = BriefingRunner::new(controller, registry, config);
    let summary = runner.run(shutdown).await?;

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        interrupted = summary.interrupted,
        rejected = summary.rejected,
        "Worker shutdown complete"
    );

    if summary.rejected > 0 {
        anyhow::bail!("briefing submission was rejected");
    }
    Ok(())
}
