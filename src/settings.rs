//! Runtime settings read from the settings store on every cycle.

use crate::{MonitorError, store::Store};

/// Confirmations a block needs before its logs are collected.
pub const MIN_CONFIRMATIONS_KEY: &str = "eth.min.confirmations";
/// How far behind the confirmed head a scan may start.
pub const FRESH_BLOCKS_KEY: &str = "eth.event.freshblocks";
/// Upper bound on the width of one scan window.
pub const BLOCK_LIMIT_KEY: &str = "eth.event.blocklimit";
/// Last block whose logs were durably collected.
pub const LAST_PROCESSED_BLOCK_KEY: &str = "eth.event.lastProcessedBlock";

/// Externally managed knobs consumed by the range calculation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub min_confirmations: u64,
    /// Zero disables the freshness bound.
    pub fresh_blocks: u64,
    /// Zero disables the window cap.
    pub block_limit: u64,
}

impl RuntimeSettings {
    /// Reads the current values from `store`.
    ///
    /// # Errors
    ///
    /// * [`MonitorError::MissingSetting`] if confirmations or fresh blocks are unset.
    /// * [`MonitorError::InvalidSetting`] if any value is not an unsigned integer.
    /// * [`MonitorError::Store`] if the store cannot be read.
    pub async fn load<S: Store>(store: &S) -> Result<Self, MonitorError> {
        let min_confirmations = required(store, MIN_CONFIRMATIONS_KEY).await?;
        let fresh_blocks = required(store, FRESH_BLOCKS_KEY).await?;
        let block_limit = match optional(store, BLOCK_LIMIT_KEY).await? {
            Some(limit) => limit,
            None => {
                warn!(key = BLOCK_LIMIT_KEY, "Setting not set, block window is not capped");
                0
            }
        };

        Ok(Self { min_confirmations, fresh_blocks, block_limit })
    }
}

/// Reads the persisted checkpoint, `0` when nothing was collected yet.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidSetting`] for a malformed value.
pub async fn load_checkpoint<S: Store>(store: &S) -> Result<u64, MonitorError> {
    Ok(optional(store, LAST_PROCESSED_BLOCK_KEY).await?.unwrap_or(0))
}

async fn required<S: Store>(store: &S, key: &'static str) -> Result<u64, MonitorError> {
    optional(store, key).await?.ok_or(MonitorError::MissingSetting(key))
}

async fn optional<S: Store>(store: &S, key: &'static str) -> Result<Option<u64>, MonitorError> {
    match store.get_setting(key).await? {
        Some(value) => parse(key, &value).map(Some),
        None => Ok(None),
    }
}

fn parse(key: &'static str, value: &str) -> Result<u64, MonitorError> {
    value
        .trim()
        .parse()
        .map_err(|_| MonitorError::InvalidSetting { key, value: value.to_owned() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn loads_all_settings() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.set_setting(MIN_CONFIRMATIONS_KEY, "6").await?;
        store.set_setting(FRESH_BLOCKS_KEY, "2").await?;
        store.set_setting(BLOCK_LIMIT_KEY, " 500 ").await?;

        let settings = RuntimeSettings::load(&store).await?;
        assert_eq!(
            settings,
            RuntimeSettings { min_confirmations: 6, fresh_blocks: 2, block_limit: 500 }
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_block_limit_means_no_cap() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.set_setting(MIN_CONFIRMATIONS_KEY, "6").await?;
        store.set_setting(FRESH_BLOCKS_KEY, "0").await?;

        assert_eq!(RuntimeSettings::load(&store).await?.block_limit, 0);
        Ok(())
    }

    #[tokio::test]
    async fn missing_confirmations_is_a_configuration_error() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.set_setting(FRESH_BLOCKS_KEY, "0").await?;

        let result = RuntimeSettings::load(&store).await;
        assert!(matches!(result, Err(MonitorError::MissingSetting(MIN_CONFIRMATIONS_KEY))));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_value_is_rejected() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.set_setting(MIN_CONFIRMATIONS_KEY, "six").await?;
        store.set_setting(FRESH_BLOCKS_KEY, "0").await?;

        let result = RuntimeSettings::load(&store).await;
        assert!(matches!(
            result,
            Err(MonitorError::InvalidSetting { key: MIN_CONFIRMATIONS_KEY, .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn checkpoint_defaults_to_zero() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        assert_eq!(load_checkpoint(&store).await?, 0);

        store.set_setting(LAST_PROCESSED_BLOCK_KEY, "42").await?;
        assert_eq!(load_checkpoint(&store).await?, 42);
        Ok(())
    }
}
