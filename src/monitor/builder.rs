use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    MonitorError,
    chain::ChainClient,
    contracts::Contracts,
    job::JobQueue,
    monitor::{
        Monitor, checkpoint::Checkpoint, collector::Collector, producer::Producer,
        scheduler::Scheduler,
    },
    store::Store,
    types::Role,
};

/// Default period between two collect cycles.
pub const DEFAULT_COLLECT_INTERVAL: Duration = Duration::from_secs(10);
/// Default period between two schedule sweeps.
pub const DEFAULT_SCHEDULE_INTERVAL: Duration = Duration::from_secs(10);
/// Default bound on one collect cycle or schedule sweep.
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(60);
/// Default number of errors buffered for the error sink.
pub const DEFAULT_ERROR_SINK_CAPACITY: usize = 16;
/// Default number of closings between two ratings updates.
pub const DEFAULT_RATE_AFTER: u32 = 10;

/// Builder for a [`Monitor`].
#[derive(Clone, Debug)]
pub struct MonitorBuilder {
    role: Role,
    contracts: Contracts,
    collect_interval: Duration,
    schedule_interval: Duration,
    cycle_timeout: Duration,
    error_sink_capacity: usize,
    rate_after: u32,
    parent_token: Option<CancellationToken>,
}

impl MonitorBuilder {
    /// Creates a builder for a node acting as `role` on the given contracts.
    #[must_use]
    pub fn new(role: Role, contracts: Contracts) -> Self {
        Self {
            role,
            contracts,
            collect_interval: DEFAULT_COLLECT_INTERVAL,
            schedule_interval: DEFAULT_SCHEDULE_INTERVAL,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
            error_sink_capacity: DEFAULT_ERROR_SINK_CAPACITY,
            rate_after: DEFAULT_RATE_AFTER,
            parent_token: None,
        }
    }

    /// Sets the period between collect cycles. Must be greater than 0.
    #[must_use]
    pub fn collect_interval(mut self, interval: Duration) -> Self {
        self.collect_interval = interval;
        self
    }

    /// Sets the period between schedule sweeps. Must be greater than 0.
    #[must_use]
    pub fn schedule_interval(mut self, interval: Duration) -> Self {
        self.schedule_interval = interval;
        self
    }

    /// Sets the deadline for one collect cycle or schedule sweep.
    ///
    /// Individual RPC calls are additionally bounded by the chain client, see
    /// [`RobustProviderBuilder::call_timeout`](crate::robust_provider::RobustProviderBuilder::call_timeout).
    #[must_use]
    pub fn cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = timeout;
        self
    }

    /// Sets how many errors may wait for the error sink before new ones are dropped.
    #[must_use]
    pub fn error_sink_capacity(mut self, capacity: usize) -> Self {
        self.error_sink_capacity = capacity;
        self
    }

    /// Requests a ratings update on every `rate_after`-th observed channel closing.
    #[must_use]
    pub fn rate_after(mut self, rate_after: u32) -> Self {
        self.rate_after = rate_after;
        self
    }

    /// Ties the monitor's lifetime to `token`: cancelling it stops the monitor.
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.parent_token = Some(token);
        self
    }

    /// Validates the configuration and assembles the monitor.
    ///
    /// # Errors
    ///
    /// * [`MonitorError::InvalidInterval`] if an interval is zero.
    /// * [`MonitorError::InvalidCycleTimeout`] if the cycle timeout is zero.
    /// * [`MonitorError::InvalidErrorSinkCapacity`] if the error sink capacity is zero.
    /// * [`MonitorError::InvalidRateAfter`] if `rate_after` is zero.
    pub fn build<C: ChainClient, S: Store, Q: JobQueue>(
        self,
        chain: Arc<C>,
        store: Arc<S>,
        queue: Arc<Q>,
    ) -> Result<Monitor<C, S, Q>, MonitorError> {
        if self.collect_interval.is_zero() || self.schedule_interval.is_zero() {
            return Err(MonitorError::InvalidInterval);
        }
        if self.cycle_timeout.is_zero() {
            return Err(MonitorError::InvalidCycleTimeout);
        }
        if self.error_sink_capacity == 0 {
            return Err(MonitorError::InvalidErrorSinkCapacity);
        }
        if self.rate_after == 0 {
            return Err(MonitorError::InvalidRateAfter);
        }

        let cancel =
            self.parent_token.map_or_else(CancellationToken::new, |parent| parent.child_token());

        debug!(
            role = %self.role,
            collect_interval_ms = self.collect_interval.as_millis(),
            schedule_interval_ms = self.schedule_interval.as_millis(),
            cycle_timeout_ms = self.cycle_timeout.as_millis(),
            "Building monitor"
        );

        let collector = Collector {
            role: self.role,
            contracts: self.contracts,
            chain: Arc::clone(&chain),
            store: Arc::clone(&store),
            checkpoint: Checkpoint::new(),
            cycle_timeout: self.cycle_timeout,
            cancel: cancel.clone(),
        };
        let producer = Producer::new(
            self.role,
            self.contracts,
            Arc::clone(&store),
            Arc::clone(&queue),
            self.rate_after,
        );
        let scheduler = Scheduler {
            store,
            queue,
            producer,
            cycle_timeout: self.cycle_timeout,
            cancel: cancel.clone(),
        };

        Ok(Monitor {
            role: self.role,
            chain,
            collector: Arc::new(collector),
            scheduler: Arc::new(scheduler),
            collect_interval: self.collect_interval,
            schedule_interval: self.schedule_interval,
            error_sink_capacity: self.error_sink_capacity,
            cancel,
        })
    }
}
