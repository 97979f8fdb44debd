use std::time::Duration;

use channel_monitor::{CollectOutcome, MemoryStore, MonitorError, Role, types::BlockRange};

use crate::common::{
    AGENT, CLIENT, OFFERING, OTHER_AGENT, checkpoint, monitor_with_store, service, set_settings,
    setup_monitor, token,
};

#[tokio::test]
async fn collects_confirmed_window_and_advances_checkpoint() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 100, |b| b).await?;
    set_settings(&setup.store, 6, 0, 0).await?;

    setup.chain.push_log(service(50).channel_created(AGENT, CLIENT, OFFERING));
    // Not confirmed yet.
    setup.chain.push_log(service(97).channel_created(AGENT, CLIENT, OFFERING));

    let outcome = setup.monitor.collect_once().await?;

    assert_eq!(
        outcome,
        CollectOutcome::Committed { range: BlockRange::new(1, 94), fetched: 1, stored: 1 }
    );
    assert_eq!(checkpoint(&setup.store).await?, Some("94".into()));
    assert_eq!(setup.store.events().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn cycle_without_new_blocks_does_nothing() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 100, |b| b).await?;
    setup.monitor.collect_once().await?;
    let queries = setup.chain.queries().len();

    let outcome = setup.monitor.collect_once().await?;

    assert_eq!(outcome, CollectOutcome::NothingToDo(BlockRange::new(101, 100)));
    assert_eq!(setup.chain.queries().len(), queries);
    assert_eq!(checkpoint(&setup.store).await?, Some("100".into()));
    Ok(())
}

#[tokio::test]
async fn logs_matched_by_several_queries_are_stored_once() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 20, |b| b).await?;
    // Names the agent in topic 1 and topic 2, so both agent queries return it.
    setup.chain.push_log(token(10).transfer(AGENT, AGENT, 5));

    let outcome = setup.monitor.collect_once().await?;

    assert_eq!(
        outcome,
        CollectOutcome::Committed { range: BlockRange::new(1, 20), fetched: 2, stored: 1 }
    );
    assert_eq!(setup.store.events().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_fetch_keeps_checkpoint() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b).await?;
    setup.chain.push_log(service(10).channel_created(AGENT, CLIENT, OFFERING));
    setup.chain.fail_logs(true);

    let result = setup.monitor.collect_once().await;

    assert!(matches!(&result, Err(MonitorError::FetchLogs(_))));
    assert!(result.is_err_and(|e| e.is_transport()));
    assert_eq!(checkpoint(&setup.store).await?, None);
    assert!(setup.store.events().await.is_empty());

    setup.chain.fail_logs(false);
    setup.monitor.collect_once().await?;

    assert_eq!(checkpoint(&setup.store).await?, Some("30".into()));
    assert_eq!(setup.store.events().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_head_lookup_keeps_checkpoint() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Client, 30, |b| b).await?;
    setup.chain.fail_head(true);

    let result = setup.monitor.collect_once().await;

    assert!(matches!(result, Err(MonitorError::LatestBlock(_))));
    assert!(setup.chain.queries().is_empty());
    assert_eq!(checkpoint(&setup.store).await?, None);
    Ok(())
}

#[tokio::test]
async fn slow_node_times_out_the_cycle() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b.cycle_timeout(Duration::from_millis(50)))
        .await?;
    setup.chain.delay_logs(Duration::from_secs(2));

    let result = setup.monitor.collect_once().await;

    assert!(matches!(result, Err(MonitorError::CycleTimeout)));
    assert_eq!(checkpoint(&setup.store).await?, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slow_store_reads_count_against_the_cycle() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b.cycle_timeout(Duration::from_millis(50)))
        .await?;
    setup.chain.push_log(service(10).channel_created(AGENT, CLIENT, OFFERING));
    setup.store.set_latency(Duration::from_secs(2)).await;

    let result = setup.monitor.collect_once().await;

    assert!(matches!(result, Err(MonitorError::CycleTimeout)));
    assert!(setup.chain.queries().is_empty());
    setup.store.set_latency(Duration::ZERO).await;
    assert_eq!(checkpoint(&setup.store).await?, None);
    assert!(setup.store.events().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn removed_logs_are_not_stored() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b).await?;
    setup.chain.push_log(service(10).removed().channel_created(AGENT, CLIENT, OFFERING));

    let outcome = setup.monitor.collect_once().await?;

    assert_eq!(
        outcome,
        CollectOutcome::Committed { range: BlockRange::new(1, 30), fetched: 0, stored: 0 }
    );
    assert!(setup.store.events().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn node_without_local_accounts_issues_no_self_queries() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b).await?;
    // A fresh store has no accounts in use.
    let store = MemoryStore::new();
    set_settings(&store, 0, 0, 0).await?;
    let monitor = monitor_with_store(&setup, Role::Agent, store)?;
    setup.chain.push_log(service(10).channel_created(OTHER_AGENT, CLIENT, OFFERING));

    let outcome = monitor.collect_once().await?;

    assert_eq!(
        outcome,
        CollectOutcome::Committed { range: BlockRange::new(1, 30), fetched: 0, stored: 0 }
    );
    assert!(setup.chain.queries().is_empty());
    Ok(())
}

#[tokio::test]
async fn block_limit_splits_catch_up_into_windows() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 1000, |b| b).await?;
    set_settings(&setup.store, 0, 0, 100).await?;

    let first = setup.monitor.collect_once().await?;
    let second = setup.monitor.collect_once().await?;

    assert!(matches!(
        first,
        CollectOutcome::Committed { range, .. } if range == BlockRange::new(1, 101)
    ));
    assert!(matches!(
        second,
        CollectOutcome::Committed { range, .. } if range == BlockRange::new(102, 202)
    ));
    assert_eq!(checkpoint(&setup.store).await?, Some("202".into()));
    Ok(())
}

#[tokio::test]
async fn freshness_skips_stale_history() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 1000, |b| b).await?;
    set_settings(&setup.store, 6, 2, 0).await?;
    setup.chain.push_log(service(500).channel_created(AGENT, CLIENT, OFFERING));

    let outcome = setup.monitor.collect_once().await?;

    assert_eq!(
        outcome,
        CollectOutcome::Committed { range: BlockRange::new(992, 994), fetched: 0, stored: 0 }
    );
    Ok(())
}

#[tokio::test]
async fn missing_settings_fail_the_cycle() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b).await?;
    let monitor = monitor_with_store(&setup, Role::Agent, MemoryStore::new())?;

    let result = monitor.collect_once().await;

    assert!(matches!(result, Err(MonitorError::MissingSetting(_))));
    assert!(setup.chain.queries().is_empty());
    Ok(())
}

#[tokio::test]
async fn unavailable_store_fails_the_cycle() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b).await?;
    setup.store.set_available(false).await;

    let result = setup.monitor.collect_once().await;

    assert!(matches!(result, Err(MonitorError::Store(_))));
    setup.store.set_available(true).await;
    assert_eq!(checkpoint(&setup.store).await?, None);
    Ok(())
}
