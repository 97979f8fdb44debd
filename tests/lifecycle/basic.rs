use std::time::Duration;

use channel_monitor::{Role, assert_job_types, job::JobType};
use tokio_util::sync::CancellationToken;

use crate::common::{AGENT, CLIENT, OFFERING, checkpoint, service, setup_monitor, wait_for};

const TICK: Duration = Duration::from_millis(20);

#[tokio::test]
async fn running_monitor_collects_and_schedules() -> anyhow::Result<()> {
    let setup =
        setup_monitor(Role::Agent, 30, |b| b.collect_interval(TICK).schedule_interval(TICK))
            .await?;
    setup.store.insert_offering(OFFERING).await;
    setup.chain.push_log(service(10).channel_created(AGENT, CLIENT, OFFERING));

    let handle = setup.monitor.start();
    let queue = &setup.queue;
    wait_for(move || async move { !queue.jobs().is_empty() }).await?;

    // New blocks are picked up on a later tick.
    setup.chain.push_log(service(35).offering_deleted(AGENT, OFFERING));
    setup.chain.set_head(40);
    wait_for(move || async move { queue.jobs().len() == 2 }).await?;

    handle.stop().await;

    assert_job_types!(
        setup.queue,
        [JobType::AgentAfterChannelCreate, JobType::AgentAfterOfferingDelete]
    );
    Ok(())
}

#[tokio::test]
async fn stopped_monitor_does_no_more_work() -> anyhow::Result<()> {
    let setup =
        setup_monitor(Role::Agent, 30, |b| b.collect_interval(TICK).schedule_interval(TICK))
            .await?;
    let handle = setup.monitor.start();
    let store = &setup.store;
    wait_for(move || async move { checkpoint(store).await.ok().flatten().is_some() }).await?;

    handle.stop().await;

    setup.chain.push_log(service(35).channel_created(AGENT, CLIENT, OFFERING));
    setup.chain.set_head(40);
    tokio::time::sleep(TICK * 5).await;

    assert_eq!(checkpoint(store).await?, Some("30".into()));
    assert!(store.events().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn transport_errors_reset_connections() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b.collect_interval(TICK)).await?;
    setup.chain.fail_head(true);

    let handle = setup.monitor.start();
    let chain = &setup.chain;
    wait_for(move || async move { chain.resets() > 0 }).await?;

    // Collect resumes once the node recovers.
    setup.chain.fail_head(false);
    let store = &setup.store;
    wait_for(move || async move { checkpoint(store).await.ok().flatten().is_some() }).await?;

    handle.stop().await;
    Ok(())
}

#[tokio::test]
async fn store_errors_do_not_reset_connections() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b.collect_interval(TICK)).await?;
    setup.store.set_available(false).await;

    let handle = setup.monitor.start();
    tokio::time::sleep(TICK * 5).await;
    handle.stop().await;

    assert_eq!(setup.chain.resets(), 0);
    Ok(())
}

#[tokio::test]
async fn cancelling_parent_token_stops_monitor() -> anyhow::Result<()> {
    let parent = CancellationToken::new();
    let setup = setup_monitor(Role::Client, 30, |b| {
        b.collect_interval(TICK).schedule_interval(TICK).cancellation_token(parent.clone())
    })
    .await?;

    let handle = setup.monitor.start();
    parent.cancel();

    let running = &handle;
    wait_for(move || async move { running.is_finished() }).await?;
    assert!(handle.cancellation_token().is_cancelled());
    Ok(())
}

#[tokio::test]
async fn stop_abandons_slow_chain_calls() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b.collect_interval(TICK)).await?;
    setup.chain.delay_logs(Duration::from_secs(30));

    let handle = setup.monitor.start();
    let chain = &setup.chain;
    wait_for(move || async move { !chain.queries().is_empty() }).await?;

    tokio::time::timeout(Duration::from_secs(1), handle.stop()).await?;
    assert_eq!(checkpoint(&setup.store).await?, None);
    Ok(())
}
