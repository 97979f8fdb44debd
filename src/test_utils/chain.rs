use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use alloy::transports::TransportErrorKind;

use crate::{
    chain::ChainClient,
    robust_provider::Error,
    types::{FilterQuery, LogEvent},
};

#[derive(Debug, Default)]
struct ChainState {
    head: u64,
    logs: Vec<LogEvent>,
    fail_logs: bool,
    fail_head: bool,
    log_delay: Option<Duration>,
    queries: Vec<FilterQuery>,
    resets: usize,
}

/// A [`ChainClient`] backed by a list of logs.
///
/// `fetch_logs` evaluates each query against the stored logs with [`FilterQuery::matches`], the
/// way a node would.
#[derive(Debug, Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    #[must_use]
    pub fn new(head: u64) -> Self {
        Self { state: Mutex::new(ChainState { head, ..ChainState::default() }) }
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_head(&self, head: u64) {
        self.state().head = head;
    }

    pub fn push_log(&self, log: LogEvent) {
        self.state().logs.push(log);
    }

    /// Makes `fetch_logs` fail until switched back.
    pub fn fail_logs(&self, fail: bool) {
        self.state().fail_logs = fail;
    }

    /// Makes `latest_block_number` fail until switched back.
    pub fn fail_head(&self, fail: bool) {
        self.state().fail_head = fail;
    }

    /// Delays every `fetch_logs` response.
    pub fn delay_logs(&self, delay: Duration) {
        self.state().log_delay = Some(delay);
    }

    /// Every query passed to `fetch_logs` so far.
    #[must_use]
    pub fn queries(&self) -> Vec<FilterQuery> {
        self.state().queries.clone()
    }

    /// How often `reset_connections` was called.
    #[must_use]
    pub fn resets(&self) -> usize {
        self.state().resets
    }
}

impl ChainClient for MockChain {
    async fn fetch_logs(&self, query: &FilterQuery) -> Result<Vec<LogEvent>, Error> {
        let delay = {
            let mut state = self.state();
            state.queries.push(query.clone());
            state.log_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if state.fail_logs {
            return Err(TransportErrorKind::backend_gone().into());
        }
        Ok(state.logs.iter().filter(|log| query.matches(log)).cloned().collect())
    }

    async fn latest_block_number(&self) -> Result<u64, Error> {
        let state = self.state();
        if state.fail_head {
            return Err(TransportErrorKind::backend_gone().into());
        }
        Ok(state.head)
    }

    async fn reset_connections(&self) -> Result<(), Error> {
        self.state().resets += 1;
        Ok(())
    }
}
