//! The collect and schedule pipeline and its lifecycle.
//!
//! A [`Monitor`] runs three tasks once started:
//! * collect: every `collect_interval`, scans the next confirmed window and stores its logs
//! * schedule: every `schedule_interval`, turns stored logs into jobs
//! * error sink: receives the transport and configuration failures of collect, and resets the
//!   chain connections after a transport failure
//!
//! Each periodic task awaits its cycle before waiting for the next tick, so a task never runs
//! two cycles at once. Collect and schedule may overlap with each other.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;

use crate::{MonitorError, chain::ChainClient, job::JobQueue, store::Store, types::Role};

mod builder;
mod checkpoint;
mod collector;
mod producer;
mod queries;
mod range;
mod scheduler;

pub use builder::{
    DEFAULT_COLLECT_INTERVAL, DEFAULT_CYCLE_TIMEOUT, DEFAULT_ERROR_SINK_CAPACITY,
    DEFAULT_RATE_AFTER, DEFAULT_SCHEDULE_INTERVAL, MonitorBuilder,
};
pub use checkpoint::Checkpoint;
pub use collector::{CollectOutcome, Collector};
pub use producer::{Producer, job_type_for, open_block_number};
pub use queries::build_queries;
pub use range::range_of_interest;
pub use scheduler::{ScheduleReport, Scheduler};

/// A configured, not yet running monitor.
///
/// Built with [`MonitorBuilder`]. Single cycles can be driven by hand with
/// [`Monitor::collect_once`] and [`Monitor::schedule_once`]; [`Monitor::start`] runs them
/// periodically.
pub struct Monitor<C, S, Q> {
    pub(crate) role: Role,
    pub(crate) chain: Arc<C>,
    pub(crate) collector: Arc<Collector<C, S>>,
    pub(crate) scheduler: Arc<Scheduler<S, Q>>,
    pub(crate) collect_interval: Duration,
    pub(crate) schedule_interval: Duration,
    pub(crate) error_sink_capacity: usize,
    pub(crate) cancel: CancellationToken,
}

impl<C: ChainClient, S: Store, Q: JobQueue> Monitor<C, S, Q> {
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Token that stops the monitor when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs one collect cycle now.
    ///
    /// # Errors
    ///
    /// See [`Collector::collect_once`].
    pub async fn collect_once(&self) -> Result<CollectOutcome, MonitorError> {
        self.collector.collect_once().await
    }

    /// Runs one schedule sweep now.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::schedule_once`].
    pub async fn schedule_once(&self) -> Result<ScheduleReport, MonitorError> {
        self.scheduler.schedule_once().await
    }

    /// Spawns the collect, schedule and error-sink tasks on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn start(self) -> MonitorHandle {
        let (errors_tx, errors_rx) = mpsc::channel(self.error_sink_capacity);

        info!(role = %self.role, "Monitor started");

        let tasks = vec![
            tokio::spawn(run_collect(
                Arc::clone(&self.collector),
                self.collect_interval,
                self.cancel.clone(),
                errors_tx,
            )),
            tokio::spawn(run_schedule(
                Arc::clone(&self.scheduler),
                self.schedule_interval,
                self.cancel.clone(),
            )),
            tokio::spawn(run_error_sink(Arc::clone(&self.chain), errors_rx, self.cancel.clone())),
        ];

        MonitorHandle { cancel: self.cancel, tasks }
    }
}

/// Handle to a running monitor.
///
/// Dropping the handle does not stop the monitor; call [`MonitorHandle::stop`] or cancel the
/// token.
#[derive(Debug)]
pub struct MonitorHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl MonitorHandle {
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// True once every monitor task has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(JoinHandle::is_finished)
    }

    /// Cancels the monitor and waits for its tasks to return.
    ///
    /// In-flight chain calls are abandoned. A store write in progress completes first.
    pub async fn stop(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Monitor task panicked");
            }
        }
        info!("Monitor stopped");
    }
}

/// Waits for the next tick, `false` once the monitor is cancelled.
async fn next_tick(ticker: &mut tokio::time::Interval, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        _ = ticker.tick() => true,
    }
}

async fn run_collect<C: ChainClient, S: Store>(
    collector: Arc<Collector<C, S>>,
    period: Duration,
    cancel: CancellationToken,
    errors: mpsc::Sender<MonitorError>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while next_tick(&mut ticker, &cancel).await {
        match collector.collect_once().await {
            Ok(_) | Err(MonitorError::Cancelled) => {}
            Err(e) => {
                error!(error = %e, "Collect cycle failed");
                if (e.is_transport() || e.is_configuration()) && errors.try_send(e).is_err() {
                    debug!("Error sink busy, dropping error");
                }
            }
        }
    }

    debug!("Collect task stopped");
}

async fn run_schedule<S: Store, Q: JobQueue>(
    scheduler: Arc<Scheduler<S, Q>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while next_tick(&mut ticker, &cancel).await {
        match scheduler.schedule_once().await {
            Ok(_) | Err(MonitorError::Cancelled) => {}
            Err(e) => error!(error = %e, "Schedule sweep failed"),
        }
    }

    debug!("Schedule task stopped");
}

async fn run_error_sink<C: ChainClient>(
    chain: Arc<C>,
    mut errors: mpsc::Receiver<MonitorError>,
    cancel: CancellationToken,
) {
    loop {
        let error = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = errors.recv() => match received {
                Some(error) => error,
                None => break,
            },
        };

        if !error.is_transport() {
            warn!(error = %error, "Collect is misconfigured");
            continue;
        }

        warn!(error = %error, "Resetting chain connections");
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = chain.reset_connections() => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to reset chain connections");
                }
            }
        }
    }

    debug!("Error sink stopped");
}
