#[tokio::main]
async fn main() {
    // ── Tracing / structured logging ──────────────────────────────────────────
    // Default level = INFO for this crate, WARN for everything else (lapin and
    // reqwest are chatty at INFO).
    // Override at runtime via the RUST_LOG environment variable:
    //   RUST_LOG=transcribe_intake=debug,lapin=warn cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("transcribe_intake=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)        // omit module path from each log line
        .with_thread_ids(false)    // cycles run on one task; ids add noise
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "transcribe-intake starting");

    // ── Run ───────────────────────────────────────────────────────────────────
    if let Err(e) = transcribe_intake::app::run().await {
        tracing::error!("❌ fatal: {e}");
        std::process::exit(1);
    }
}
