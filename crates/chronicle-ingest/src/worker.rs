//! Background worker that runs registered sources on a periodic tick.
//!
//! Runs of different sources proceed in parallel; runs of one source
//! serialize inside the engine. Shutdown is cooperative: in-flight runs
//! are dropped at their next suspension point (between source items), and
//! their watermarks stay untouched, so the next tick replays the window.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{info, instrument};

use chronicle_core::defaults;

use crate::engine::IngestEngine;

/// Configuration for the ingest worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Interval between scheduler ticks.
    pub poll_interval: Duration,
    /// Whether the worker runs at all.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(defaults::INGEST_POLL_INTERVAL_SECS),
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `INGEST_ENABLED` | `true` | Enable/disable background ingestion |
    /// | `INGEST_POLL_INTERVAL_SECS` | `3600` | Seconds between ticks |
    pub fn from_env() -> Self {
        let enabled = std::env::var("INGEST_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);
        let poll_interval = std::env::var("INGEST_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(defaults::INGEST_POLL_INTERVAL_SECS));
        Self {
            poll_interval,
            enabled,
        }
    }
}

/// Event emitted by the ingest worker.
#[derive(Debug, Clone)]
pub enum IngestEvent {
    /// A scheduler tick began running sources.
    TickStarted { sources: usize },
    /// One source run completed.
    RunCompleted {
        source: String,
        inserted: u64,
        updated: u64,
    },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<IngestEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> chronicle_core::Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| chronicle_core::Error::Internal("worker already stopped".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<IngestEvent> {
        self.event_rx.resubscribe()
    }
}

/// Periodic scheduler over an [`IngestEngine`].
pub struct IngestWorker {
    engine: Arc<IngestEngine>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<IngestEvent>,
}

impl IngestWorker {
    /// Create a new worker over the engine.
    pub fn new(engine: Arc<IngestEngine>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            engine,
            config,
            event_tx,
        }
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!(
                subsystem = "ingest",
                component = "worker",
                "Ingest worker disabled"
            );
            return;
        }

        info!(
            subsystem = "ingest",
            component = "worker",
            poll_interval_secs = self.config.poll_interval.as_secs(),
            sources = self.engine.sources().len(),
            "Ingest worker started"
        );
        let _ = self.event_tx.send(IngestEvent::WorkerStarted);

        let mut tick = interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.run_due_sources().await;
                }
                _ = shutdown_rx.recv() => {
                    info!(
                        subsystem = "ingest",
                        component = "worker",
                        "Ingest worker stopping"
                    );
                    let _ = self.event_tx.send(IngestEvent::WorkerStopped);
                    return;
                }
            }
        }
    }

    async fn run_due_sources(&self) {
        let sources = self.engine.sources();
        if sources.is_empty() {
            return;
        }
        let _ = self.event_tx.send(IngestEvent::TickStarted {
            sources: sources.len(),
        });

        // run_all contains per-source failures; they are logged by the
        // engine and the remaining sources are unaffected.
        let reports = Arc::clone(&self.engine).run_all().await;
        for report in reports {
            let _ = self.event_tx.send(IngestEvent::RunCompleted {
                source: report.source.clone(),
                inserted: report.inserted,
                updated: report.updated,
            });
        }
    }
}

impl std::fmt::Debug for IngestWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestWorker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = WorkerConfig::default();
        assert!(config.enabled);
        assert_eq!(
            config.poll_interval,
            Duration::from_secs(defaults::INGEST_POLL_INTERVAL_SECS)
        );
    }
}
