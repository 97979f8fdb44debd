use std::{sync::Arc, time::Duration};

use alloy::primitives::{Address, BlockNumber};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::{
    MonitorError,
    chain::ChainClient,
    contracts::{Contracts, EventKind},
    monitor::{checkpoint::Checkpoint, queries::build_queries, range::range_of_interest},
    settings::RuntimeSettings,
    store::Store,
    types::{BlockRange, FilterQuery, LogEvent, QueryScope, Role},
};

/// What a collect cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// The window was empty; nothing was queried or written.
    NothingToDo(BlockRange),
    /// The window was scanned and the checkpoint moved to its end.
    Committed {
        range: BlockRange,
        /// Logs kept after filtering, duplicates included.
        fetched: usize,
        /// Logs that were not stored before.
        stored: usize,
    },
}

/// Fetches the logs of the next confirmed window and persists them with the checkpoint.
pub struct Collector<C, S> {
    pub(crate) role: Role,
    pub(crate) contracts: Contracts,
    pub(crate) chain: Arc<C>,
    pub(crate) store: Arc<S>,
    pub(crate) checkpoint: Checkpoint,
    pub(crate) cycle_timeout: Duration,
    pub(crate) cancel: CancellationToken,
}

impl<C: ChainClient, S: Store> Collector<C, S> {
    /// Runs one collect cycle.
    ///
    /// Reading the settings, the checkpoint and the local addresses, and the chain calls that
    /// follow, share `cycle_timeout`. Chain calls are abandoned on cancellation. The store
    /// commit that ends the cycle always runs to completion.
    ///
    /// # Errors
    ///
    /// * [`MonitorError::LatestBlock`] or [`MonitorError::FetchLogs`] when the node fails.
    /// * [`MonitorError::CycleTimeout`] when the cycle takes too long before its commit.
    /// * [`MonitorError::Cancelled`] when the monitor stops mid-cycle.
    /// * Configuration and store errors from reading settings or committing.
    ///
    /// No error leaves partial progress behind.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    pub async fn collect_once(&self) -> Result<CollectOutcome, MonitorError> {
        let (range, events) = timeout(self.cycle_timeout, self.scan())
            .await
            .map_err(|_| MonitorError::CycleTimeout)??;

        if range.is_empty() {
            debug!(first = range.first, last = range.last, "Nothing to collect");
            return Ok(CollectOutcome::NothingToDo(range));
        }

        let fetched = events.len();
        let stored = self.checkpoint.advance(&*self.store, events, range).await?;

        debug!(
            first = range.first,
            last = range.last,
            fetched = fetched,
            stored = stored,
            "Collected logs"
        );

        Ok(CollectOutcome::Committed { range, fetched, stored })
    }

    async fn scan(&self) -> Result<(BlockRange, Vec<LogEvent>), MonitorError> {
        let settings = RuntimeSettings::load(&*self.store).await?;
        let checkpoint = self.checkpoint.current(&*self.store).await?;
        let local = self.store.addresses_in_use().await?;
        self.fetch_window(checkpoint, &settings, &local).await
    }

    async fn fetch_window(
        &self,
        checkpoint: BlockNumber,
        settings: &RuntimeSettings,
        local: &[Address],
    ) -> Result<(BlockRange, Vec<LogEvent>), MonitorError> {
        let head = self
            .until_cancelled(self.chain.latest_block_number())
            .await?
            .map_err(MonitorError::LatestBlock)?;

        let range = range_of_interest(checkpoint, head, settings);
        if range.is_empty() {
            return Ok((range, Vec::new()));
        }

        let mut kept = Vec::new();
        for query in build_queries(self.role, &self.contracts, local, range) {
            if query.matches_nothing() {
                trace!(scope = ?query.scope, "Skipping query without local addresses");
                continue;
            }

            let logs = self
                .until_cancelled(self.chain.fetch_logs(&query))
                .await?
                .map_err(MonitorError::FetchLogs)?;

            kept.extend(logs.into_iter().filter(|event| keep(&query, event, local)));
        }

        Ok((range, kept))
    }

    async fn until_cancelled<T>(&self, call: impl Future<Output = T>) -> Result<T, MonitorError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(MonitorError::Cancelled),
            out = call => Ok(out),
        }
    }
}

/// Drops retracted logs, and offering events of local agents seen through a market-wide query.
fn keep(query: &FilterQuery, event: &LogEvent, local: &[Address]) -> bool {
    if event.removed {
        debug!(tx_hash = %event.tx_hash, "Skipping removed log");
        return false;
    }

    let own_offering = query.scope == QueryScope::Global
        && event.kind().is_some_and(EventKind::is_offering_related)
        && event.topic_address(1).is_some_and(|agent| local.contains(&agent));
    if own_offering {
        trace!(tx_hash = %event.tx_hash, "Skipping own offering event from global query");
        return false;
    }

    true
}
