//! Periodic due-task sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

use colloquy_core::defaults::{
    EVENT_BUS_CAPACITY, SWEEP_BATCH_SIZE, SWEEP_INTERVAL_SECS, SWEEP_TIMEOUT_SECS,
};
use colloquy_core::Result;

use crate::scheduler::{SweepReport, TaskScheduler};

/// Configuration for the sweep worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// A sweep running longer than this is abandoned.
    pub sweep_timeout: Duration,
    /// Maximum due tasks fired per sweep.
    pub batch_size: i64,
    /// Whether to run sweeps at all.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(SWEEP_INTERVAL_SECS),
            sweep_timeout: Duration::from_secs(SWEEP_TIMEOUT_SECS),
            batch_size: SWEEP_BATCH_SIZE,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SWEEP_ENABLED` | `true` | Enable/disable the sweep |
    /// | `SWEEP_INTERVAL_SECS` | `60` | Seconds between sweeps |
    /// | `SWEEP_TIMEOUT_SECS` | `30` | Upper bound on one sweep |
    /// | `SWEEP_BATCH_SIZE` | `500` | Due tasks fired per sweep |
    pub fn from_env() -> Self {
        let enabled = std::env::var("SWEEP_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let interval_secs = std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(SWEEP_INTERVAL_SECS)
            .max(1);

        let timeout_secs = std::env::var("SWEEP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(SWEEP_TIMEOUT_SECS)
            .max(1);

        let batch_size = std::env::var("SWEEP_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(SWEEP_BATCH_SIZE)
            .max(1);

        Self {
            interval: Duration::from_secs(interval_secs),
            sweep_timeout: Duration::from_secs(timeout_secs),
            batch_size,
            enabled,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, sweep_timeout: Duration) -> Self {
        self.sweep_timeout = sweep_timeout;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the sweep worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    WorkerStarted,
    /// A sweep finished.
    SweepCompleted(SweepReport),
    /// A sweep errored or timed out. The next tick retries.
    SweepFailed { error: String },
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to stop after the current sweep.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx.send(()).await.map_err(|_| {
            colloquy_core::Error::Internal("Failed to send shutdown signal".into())
        })?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Fires due tasks on a fixed interval.
pub struct SweepWorker {
    scheduler: TaskScheduler,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl SweepWorker {
    pub fn new(scheduler: TaskScheduler, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            scheduler: scheduler.with_batch_size(config.batch_size),
            config,
            event_tx,
        }
    }

    /// Subscribe to events before the worker starts.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let worker = Arc::new(self);
        tokio::spawn(async move {
            worker.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!(subsystem = "jobs", component = "sweep", "Sweep worker is disabled, not starting");
            return;
        }

        info!(
            subsystem = "jobs",
            component = "sweep",
            interval_secs = self.config.interval.as_secs_f64(),
            batch_size = self.config.batch_size,
            "Sweep worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        loop {
            self.sweep_once().await;

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(subsystem = "jobs", component = "sweep", "Sweep worker received shutdown signal");
                    break;
                }
                _ = sleep(self.config.interval) => {}
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!(subsystem = "jobs", component = "sweep", "Sweep worker stopped");
    }

    async fn sweep_once(&self) {
        let event = match timeout(
            self.config.sweep_timeout,
            self.scheduler.process_due_tasks(Utc::now()),
        )
        .await
        {
            Ok(Ok(report)) => {
                if report.due > 0 {
                    info!(
                        subsystem = "jobs",
                        component = "sweep",
                        due = report.due,
                        notified = report.notified,
                        followups = report.followups,
                        failed = report.failed,
                        "Sweep completed"
                    );
                } else {
                    debug!(subsystem = "jobs", component = "sweep", "Nothing due");
                }
                WorkerEvent::SweepCompleted(report)
            }
            Ok(Err(e)) => {
                error!(subsystem = "jobs", component = "sweep", error = %e, "Sweep failed");
                WorkerEvent::SweepFailed {
                    error: e.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    subsystem = "jobs",
                    component = "sweep",
                    timeout_secs = self.config.sweep_timeout.as_secs_f64(),
                    "Sweep timed out"
                );
                WorkerEvent::SweepFailed {
                    error: "sweep timed out".to_string(),
                }
            }
        };
        let _ = self.event_tx.send(event);
    }
}
