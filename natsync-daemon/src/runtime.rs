use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, Span};

use natsync_core::{IdentitySource, Settings};
use natsync_sync::{Pipeline, SweepReport, SyncError};

use crate::error::{io_err, DaemonError};
use crate::reload::{ReloadOutcome, ReloadSignaler};

/// Everything one reconciliation cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub role_count: usize,
    pub user_count: usize,
    pub excluded: usize,
    pub changed: bool,
    pub published: bool,
    /// `None` when no reload was needed.
    pub reload: Option<ReloadOutcome>,
    /// `None` when the sweep itself failed.
    pub sweep: Option<SweepReport>,
    pub duration: Duration,
}

/// Totals for a whole `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub failed: u64,
}

/// Periodic fetch → generate → publish → reload loop.
pub struct Orchestrator {
    pipeline: Arc<Mutex<Pipeline>>,
    signaler: ReloadSignaler,
    interval: Duration,
    retention: Duration,
    reload_pending: bool,
    span: Span,
}

impl Orchestrator {
    pub fn new(
        pipeline: Pipeline,
        signaler: ReloadSignaler,
        interval: Duration,
        retention: Duration,
    ) -> Self {
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            signaler,
            interval,
            retention,
            reload_pending: false,
            span: tracing::info_span!("orchestrator", component = "orchestrator"),
        }
    }

    pub fn from_settings(
        source: Box<dyn IdentitySource>,
        settings: &Settings,
    ) -> Result<Self, DaemonError> {
        Ok(Self::new(
            Pipeline::from_settings(source, settings)?,
            ReloadSignaler::from_settings(settings),
            settings.sync_interval(),
            settings.backup_retention(),
        ))
    }

    /// `true` after a reload failed or was skipped following a publish.
    pub fn reload_pending(&self) -> bool {
        self.reload_pending
    }

    /// One full cycle. The backup sweep runs whether or not the cycle failed.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, DaemonError> {
        let span = self.span.clone();
        async move {
            let started = Instant::now();
            tracing::info!("starting sync cycle");
            let result = self.reconcile_and_reload().await;
            let sweep = self.sweep().await;

            let mut report = result?;
            report.sweep = sweep;
            report.duration = started.elapsed();
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn reconcile_and_reload(&mut self) -> Result<CycleReport, DaemonError> {
        let pass = self.with_pipeline(|p| p.reconcile()).await?;
        let published = pass.published.is_some();

        let reload = if published || self.reload_pending {
            if !published {
                tracing::info!("retrying reload left pending by an earlier cycle");
            }
            match self.signaler.signal().await {
                Ok(outcome) => {
                    // A debounced reload has not applied the new artifact yet.
                    self.reload_pending = outcome == ReloadOutcome::Debounced;
                    Some(outcome)
                }
                Err(err) => {
                    self.reload_pending = true;
                    return Err(err.into());
                }
            }
        } else {
            None
        };

        if published {
            tracing::info!(
                roles = pass.role_count,
                users = pass.user_count,
                "sync completed with configuration changes",
            );
        } else {
            tracing::info!("sync completed, no configuration changes detected");
        }

        Ok(CycleReport {
            role_count: pass.role_count,
            user_count: pass.user_count,
            excluded: pass.excluded,
            changed: pass.changed,
            published,
            reload,
            sweep: None,
            duration: Duration::ZERO,
        })
    }

    async fn sweep(&self) -> Option<SweepReport> {
        let retention = self.retention;
        match self.with_pipeline(move |p| p.sweep(retention)).await {
            Ok(report) => Some(report),
            Err(err) => {
                tracing::warn!(error = %err, "failed to clean up old backups");
                None
            }
        }
    }

    async fn with_pipeline<T, F>(&self, f: F) -> Result<T, DaemonError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Pipeline) -> Result<T, SyncError> + Send + 'static,
    {
        let pipeline = Arc::clone(&self.pipeline);
        let span = Span::current();
        let result = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let mut guard = pipeline.lock().unwrap_or_else(|p| p.into_inner());
            f(&mut guard)
        })
        .await
        .map_err(|err| DaemonError::Join {
            task: "pipeline",
            message: err.to_string(),
        })?;
        Ok(result?)
    }

    /// Run one cycle now, then one per interval until `shutdown` fires.
    ///
    /// A cycle in progress always completes; shutdown is observed at the next
    /// wait and takes priority over a due tick.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> RunSummary {
        let mut summary = RunSummary::default();
        tracing::info!(
            parent: &self.span,
            interval_secs = self.interval.as_secs(),
            "entering main loop",
        );

        let first = self.run_cycle().await;
        self.record(&mut summary, first);

        let mut interval = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!(parent: &self.span, "shutting down gracefully");
                    break;
                }
                _ = interval.tick() => {
                    let result = self.run_cycle().await;
                    self.record(&mut summary, result);
                }
            }
        }
        summary
    }

    fn record(&self, summary: &mut RunSummary, result: Result<CycleReport, DaemonError>) {
        summary.cycles += 1;
        match result {
            Ok(report) => tracing::debug!(
                parent: &self.span,
                changed = report.changed,
                duration_ms = report.duration.as_millis() as u64,
                "cycle finished",
            ),
            Err(err) => {
                summary.failed += 1;
                tracing::error!(parent: &self.span, error = %err, "sync failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Process entry points
// ---------------------------------------------------------------------------

/// Run the service until SIGINT/SIGTERM, blocking the current thread.
pub fn start_blocking(
    settings: &Settings,
    source: Box<dyn IdentitySource>,
) -> Result<RunSummary, DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let orchestrator = Orchestrator::from_settings(source, settings)?;
    runtime.block_on(run_until_signal(orchestrator))
}

/// Run a single cycle on a throwaway runtime.
pub fn run_once_blocking(
    settings: &Settings,
    source: Box<dyn IdentitySource>,
) -> Result<CycleReport, DaemonError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let mut orchestrator = Orchestrator::from_settings(source, settings)?;
    runtime.block_on(orchestrator.run_cycle())
}

async fn run_until_signal(orchestrator: Orchestrator) -> Result<RunSummary, DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(signal_task(shutdown).instrument(tracing::info_span!("signals")))
    };

    let summary = orchestrator.run(shutdown_tx.subscribe()).await;
    let _ = shutdown_tx.send(());

    match signal_handle.await {
        Ok(inner) => inner?,
        Err(err) => {
            return Err(DaemonError::Join {
                task: "signal_handler",
                message: err.to_string(),
            })
        }
    }
    tracing::info!(cycles = summary.cycles, failed = summary.failed, "stopped");
    Ok(summary)
}

async fn signal_task(shutdown: broadcast::Sender<()>) -> Result<(), DaemonError> {
    let mut shutdown_rx = shutdown.subscribe();
    tokio::select! {
        _ = shutdown_rx.recv() => Ok(()),
        received = wait_for_signal() => {
            let name = received.map_err(|e| io_err("signal-handler", e))?;
            tracing::info!(signal = name, "received shutdown signal");
            let _ = shutdown.send(());
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT"),
        _ = term.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}
