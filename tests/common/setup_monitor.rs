use std::{future::Future, sync::Arc, time::Duration};

use alloy::primitives::{Address, B256, address};
use channel_monitor::{
    Contracts, MemoryStore, Monitor, MonitorBuilder, Role, Store,
    settings::{
        BLOCK_LIMIT_KEY, FRESH_BLOCKS_KEY, LAST_PROCESSED_BLOCK_KEY, MIN_CONFIRMATIONS_KEY,
    },
    test_utils::{LogBuilder, MockChain, RecordingQueue},
};

pub const SERVICE: Address = address!("0x00000000000000000000000000000000000005e1");
pub const TOKEN: Address = address!("0x00000000000000000000000000000000000070c1");
pub const AGENT: Address = address!("0x000000000000000000000000000000000000a9e1");
pub const OTHER_AGENT: Address = address!("0x000000000000000000000000000000000000a9e2");
pub const CLIENT: Address = address!("0x000000000000000000000000000000000000c1e1");
pub const OFFERING: B256 = B256::repeat_byte(0x0f);

pub type TestMonitor = Monitor<MockChain, MemoryStore, RecordingQueue>;

pub struct MonitorSetup {
    pub chain: Arc<MockChain>,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<RecordingQueue>,
    pub monitor: TestMonitor,
}

/// The persisted checkpoint, `None` before the first commit.
pub async fn checkpoint(store: &MemoryStore) -> anyhow::Result<Option<String>> {
    Ok(store.get_setting(LAST_PROCESSED_BLOCK_KEY).await?)
}

/// A monitor for `role` whose local account is [`AGENT`] or [`CLIENT`].
///
/// Settings start with no confirmations, no freshness bound and no window cap.
pub async fn setup_monitor(
    role: Role,
    head: u64,
    configure: impl FnOnce(MonitorBuilder) -> MonitorBuilder,
) -> anyhow::Result<MonitorSetup> {
    let chain = Arc::new(MockChain::new(head));
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(RecordingQueue::new());

    set_settings(&store, 0, 0, 0).await?;
    let local = match role {
        Role::Agent => AGENT,
        Role::Client => CLIENT,
    };
    store.insert_account(local, true).await;

    let builder = configure(MonitorBuilder::new(role, Contracts::new(SERVICE, TOKEN)));
    let monitor = builder.build(Arc::clone(&chain), Arc::clone(&store), Arc::clone(&queue))?;

    Ok(MonitorSetup { chain, store, queue, monitor })
}

pub async fn set_settings(
    store: &MemoryStore,
    min_confirmations: u64,
    fresh_blocks: u64,
    block_limit: u64,
) -> anyhow::Result<()> {
    store.set_setting(MIN_CONFIRMATIONS_KEY, &min_confirmations.to_string()).await?;
    store.set_setting(FRESH_BLOCKS_KEY, &fresh_blocks.to_string()).await?;
    store.set_setting(BLOCK_LIMIT_KEY, &block_limit.to_string()).await?;
    Ok(())
}

pub fn service(block: u64) -> LogBuilder {
    LogBuilder::new(SERVICE).block(block)
}

pub fn token(block: u64) -> LogBuilder {
    LogBuilder::new(TOKEN).block(block)
}

/// Polls `condition` until it holds, failing after five seconds.
pub async fn wait_for<F, Fut>(mut condition: F) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("condition not met in time"))
}

/// A monitor sharing the chain and queue of `setup` but reading its own `store`.
pub fn monitor_with_store(
    setup: &MonitorSetup,
    role: Role,
    store: MemoryStore,
) -> anyhow::Result<TestMonitor> {
    Ok(MonitorBuilder::new(role, Contracts::new(SERVICE, TOKEN)).build(
        Arc::clone(&setup.chain),
        Arc::new(store),
        Arc::clone(&setup.queue),
    )?)
}
