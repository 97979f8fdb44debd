use alloy::primitives::BlockNumber;
use tokio::sync::Mutex;

use crate::{
    MonitorError, settings,
    store::Store,
    types::{BlockRange, LogEvent},
};

/// The last collected block, cached in memory.
///
/// Owned by the monitor and shared by reference. The lock is held across the store commit so
/// the cached value and the persisted one never disagree.
#[derive(Debug, Default)]
pub struct Checkpoint {
    cached: Mutex<Option<BlockNumber>>,
}

impl Checkpoint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current checkpoint, loaded from `store` on first use.
    pub async fn current<S: Store>(&self, store: &S) -> Result<BlockNumber, MonitorError> {
        let mut cached = self.cached.lock().await;
        if let Some(block) = *cached {
            return Ok(block);
        }
        let block = settings::load_checkpoint(store).await?;
        *cached = Some(block);
        Ok(block)
    }

    /// Stores `events` and moves the checkpoint to the end of `range` in one transaction.
    ///
    /// Returns the number of newly stored events. On failure neither the store nor the cache
    /// changes.
    pub async fn advance<S: Store>(
        &self,
        store: &S,
        events: Vec<LogEvent>,
        range: BlockRange,
    ) -> Result<usize, MonitorError> {
        let mut cached = self.cached.lock().await;
        let inserted = store.commit_window(events, range.last).await?;
        *cached = Some(range.last);
        Ok(inserted)
    }
}
