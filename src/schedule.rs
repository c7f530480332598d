use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::controller::BatchController;
use crate::metrics::Metrics;

// ── Shutdown ───────────────────────────────────────────────────────────────────

/// Sender side held by the application orchestrator.
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Receiver side handed to the trigger loop.
/// Clone freely; each clone independently observes the signal.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Construct a linked handle/signal pair.
pub fn shutdown_pair() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

impl ShutdownHandle {
    pub fn trigger(self) {
        // Errors only if every receiver is gone.
        let _ = self.tx.send(true);
    }
}

impl ShutdownSignal {
    /// Resolves once shutdown is triggered, immediately if it already was.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|&v| v).await;
    }
}

/// Wait for `SIGINT` (Ctrl-C) or `SIGTERM` (container stop).
///
/// If a handler cannot be registered the error is logged and only the other
/// signal is awaited.
pub async fn wait_for_os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| tracing::error!("cannot register SIGINT handler: {e}"))
        .ok();
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| tracing::error!("cannot register SIGTERM handler: {e}"))
        .ok();

    let interrupt = async {
        match sigint.as_mut() {
            Some(s) => s.recv().await,
            None => std::future::pending().await,
        }
    };
    let terminate = async {
        match sigterm.as_mut() {
            Some(s) => s.recv().await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = interrupt => tracing::info!("🔔 SIGINT received"),
        _ = terminate => tracing::info!("🔔 SIGTERM received"),
    }
}

// ── Trigger loop ───────────────────────────────────────────────────────────────

/// Invoke [`BatchController::run_once`] every `interval` until shutdown.
///
/// The first cycle starts immediately. A cycle in progress always runs to
/// completion; shutdown is only observed between cycles. Cycles never
/// overlap: a tick missed while a long cycle runs is skipped.
pub async fn run_every(
    controller: Arc<BatchController>,
    interval: Duration,
    metrics: Arc<Metrics>,
    mut shutdown: ShutdownSignal,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            _ = ticker.tick() => {}
        }

        match controller.run_once(Utc::now()).await {
            Ok(report) => {
                if report.received > 0 {
                    report.log();
                }
                metrics.record_cycle(&report);
            }
            Err(e) => {
                tracing::error!(error = %e, "❌ drain cycle aborted");
                metrics.inc_cycle_failed();
            }
        }
    }

    tracing::info!("trigger loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_observed_after_trigger() {
        let (handle, mut signal) = shutdown_pair();
        let mut other = signal.clone();
        handle.trigger();

        signal.wait().await;
        other.wait().await;
    }
}
