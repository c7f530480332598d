use std::sync::Arc;

use secrecy::ExposeSecret;

use crate::config::Config;
use crate::controller::{BatchController, ControllerSettings};
use crate::messaging::{build_pool, RabbitQueue};
use crate::metrics::Metrics;
use crate::schedule;
use crate::storage::BlobStorage;
use crate::transcription::SpeechBatchClient;

// ── Error type ─────────────────────────────────────────────────────────────────

/// Top-level application error, surfaced only at startup.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("rabbitmq error: {0}")]
    Queue(#[from] crate::messaging::QueueError),
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
    #[error("transcription client error: {0}")]
    Transcription(#[from] crate::transcription::SubmitError),
    #[error("trigger loop error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

// ── Entry point ────────────────────────────────────────────────────────────────

/// Full application lifecycle.
///
/// # Startup sequence
/// 1. Load and validate configuration from environment variables.
/// 2. Build the RabbitMQ pool and open the start and fetch queues.
/// 3. Build the blob storage and transcription clients.
/// 4. Run the drain cycle on a fixed interval until SIGINT / SIGTERM.
pub async fn run() -> Result<(), AppError> {
    // ── 1. Configuration ──────────────────────────────────────────────────────
    let cfg = Config::load()?;
    cfg.log_summary();

    let metrics = Arc::new(Metrics::new());
    let (shutdown_handle, shutdown_signal) = schedule::shutdown_pair();

    // ── 2. RabbitMQ ───────────────────────────────────────────────────────────
    // One connection per queue handle.
    tracing::info!("🔌 connecting to RabbitMQ...");
    let pool = build_pool(&cfg.rabbitmq_url, 2).await?;
    let start_queue = RabbitQueue::open(&pool, &cfg.start_queue, cfg.queue_lease).await?;
    let fetch_queue = RabbitQueue::open(&pool, &cfg.fetch_queue, cfg.queue_lease).await?;
    tracing::info!("🔌 RabbitMQ connected");

    // ── 3. Storage + transcription service ────────────────────────────────────
    let storage = BlobStorage::from_connection_string(cfg.storage_connection_string.expose_secret())?;
    let service = SpeechBatchClient::new(
        &cfg.speech_endpoint,
        cfg.speech_key.clone(),
        cfg.http_timeout,
    )?;

    let controller = Arc::new(BatchController::new(
        Arc::new(start_queue),
        Arc::new(fetch_queue),
        Arc::new(storage),
        Arc::new(service),
        ControllerSettings::from_config(&cfg),
    ));

    tracing::info!(
        interval = ?cfg.start_interval,
        "✅ ready, draining '{}' on a timer",
        cfg.start_queue
    );

    // ── 4. Trigger loop + OS-signal wait ──────────────────────────────────────
    let trigger_task = tokio::spawn(schedule::run_every(
        controller,
        cfg.start_interval,
        Arc::clone(&metrics),
        shutdown_signal,
    ));

    schedule::wait_for_os_signal().await;
    tracing::info!("🛑 signal received, finishing the current cycle...");

    shutdown_handle.trigger();
    trigger_task.await?;

    metrics.log_summary();
    tracing::info!("✅ shutdown complete");
    Ok(())
}
