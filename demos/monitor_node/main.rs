//! Runs a monitor against a live node with an in-memory store and a queue that only logs.
//!
//! ```text
//! RPC_URL=ws://localhost:8545 SERVICE_CONTRACT=0x.. TOKEN_CONTRACT=0x.. LOCAL_ACCOUNT=0x.. \
//!     RUST_LOG=channel_monitor=debug cargo run --example monitor_node -- client
//! ```

use std::{env, sync::Arc, time::Duration};

use alloy::{
    network::Ethereum,
    primitives::{Address, B256},
};
use anyhow::Context;
use channel_monitor::{
    Contracts, JobQueue, JobSpec, MemoryStore, MonitorBuilder, QueueError, Role, Store,
    robust_provider::RobustProviderBuilder,
    settings::{BLOCK_LIMIT_KEY, FRESH_BLOCKS_KEY, MIN_CONFIRMATIONS_KEY},
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Prints jobs instead of running them.
struct LoggingQueue;

impl JobQueue for LoggingQueue {
    async fn add(&self, job: JobSpec) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();
        info!(job_id = %id, job_type = %job.job_type, related_id = %job.related_id, "Job added");
        Ok(id)
    }

    async fn offering_job_related_id(&self, _: B256) -> Result<Option<Uuid>, QueueError> {
        Ok(None)
    }
}

fn address_var(name: &str) -> anyhow::Result<Address> {
    env::var(name).with_context(|| format!("{name} is not set"))?.parse().context(name.to_owned())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).try_init();

    let role = match env::args().nth(1).as_deref() {
        Some("agent") => Role::Agent,
        _ => Role::Client,
    };
    let url = env::var("RPC_URL").unwrap_or_else(|_| "ws://localhost:8545".into());
    let contracts =
        Contracts::new(address_var("SERVICE_CONTRACT")?, address_var("TOKEN_CONTRACT")?);

    let store = Arc::new(MemoryStore::new());
    store.set_setting(MIN_CONFIRMATIONS_KEY, "6").await?;
    store.set_setting(FRESH_BLOCKS_KEY, "1000").await?;
    store.set_setting(BLOCK_LIMIT_KEY, "500").await?;
    store.insert_account(address_var("LOCAL_ACCOUNT")?, true).await;

    let provider = RobustProviderBuilder::<Ethereum, _>::new(url)
        .call_timeout(Duration::from_secs(30))
        .max_retries(5)
        .min_delay(Duration::from_millis(500))
        .build()
        .await?;

    let monitor = MonitorBuilder::new(role, contracts)
        .collect_interval(Duration::from_secs(5))
        .schedule_interval(Duration::from_secs(5))
        .build(Arc::new(provider), store, Arc::new(LoggingQueue))?;

    let handle = monitor.start();
    tokio::signal::ctrl_c().await?;
    handle.stop().await;

    Ok(())
}
