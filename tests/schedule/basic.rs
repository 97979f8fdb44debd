use channel_monitor::{
    Role, ScheduleReport, assert_event_state, assert_job_types,
    contracts::EventKind,
    job::{JobType, QueueError},
    store::ChannelKey,
};

use crate::common::{AGENT, CLIENT, OFFERING, service, setup_monitor, token};

#[tokio::test]
async fn collected_logs_become_jobs_once() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b).await?;
    setup.store.insert_offering(OFFERING).await;
    let created = service(10).channel_created(AGENT, CLIENT, OFFERING);
    setup.chain.push_log(created.clone());

    setup.monitor.collect_once().await?;
    let report = setup.monitor.schedule_once().await?;

    assert_eq!(report, ScheduleReport { scheduled: 1, ignored: 0, failed: 0 });
    assert_job_types!(setup.queue, [JobType::AgentAfterChannelCreate]);
    assert_event_state!(setup.store, created.tx_hash, scheduled);

    let job = &setup.queue.jobs()[0];
    assert_eq!(job.created_by, "bc_monitor");
    assert_eq!(job.payload()?.ethereum_log, created);

    // Neither phase repeats work on the next tick.
    setup.monitor.collect_once().await?;
    assert_eq!(setup.monitor.schedule_once().await?.swept(), 0);
    assert_job_types!(setup.queue, [JobType::AgentAfterChannelCreate]);
    Ok(())
}

#[tokio::test]
async fn unknown_entities_are_ignored() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b).await?;
    let created = service(10).channel_created(AGENT, CLIENT, OFFERING);
    let topped_up =
        service(11).channel_event(EventKind::ChannelToppedUp, AGENT, CLIENT, OFFERING, 10, 5);
    setup.chain.push_log(created.clone());
    setup.chain.push_log(topped_up.clone());

    setup.monitor.collect_once().await?;
    let report = setup.monitor.schedule_once().await?;

    assert_eq!(report.ignored, 2);
    assert_event_state!(setup.store, created.tx_hash, ignored);
    assert_event_state!(setup.store, topped_up.tx_hash, ignored);
    assert_job_types!(setup.queue, []);
    Ok(())
}

#[tokio::test]
async fn duplicate_job_marks_event_ignored() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b).await?;
    let key = ChannelKey { offering_hash: OFFERING, agent: AGENT, client: CLIENT, open_block: 10 };
    setup.store.insert_channel(key, None).await;
    let topped_up =
        service(11).channel_event(EventKind::ChannelToppedUp, AGENT, CLIENT, OFFERING, 10, 5);
    setup.chain.push_log(topped_up.clone());
    setup.queue.reject(JobType::AgentAfterChannelTopUp, QueueError::Duplicated);

    setup.monitor.collect_once().await?;
    setup.monitor.schedule_once().await?;

    assert_event_state!(setup.store, topped_up.tx_hash, ignored);
    Ok(())
}

#[tokio::test]
async fn rejected_jobs_count_failures_until_accepted() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b).await?;
    let transfer = token(12).transfer(CLIENT, AGENT, 50);
    setup.chain.push_log(transfer.clone());
    setup.queue.reject(JobType::AfterAccountAddBalance, QueueError::Closed);

    setup.monitor.collect_once().await?;
    for _ in 0..3 {
        assert_eq!(setup.monitor.schedule_once().await?.failed, 1);
    }
    assert_event_state!(setup.store, transfer.tx_hash, failures = 3);

    setup.queue.accept(JobType::AfterAccountAddBalance);
    assert_eq!(setup.monitor.schedule_once().await?.scheduled, 1);
    assert_event_state!(setup.store, transfer.tx_hash, scheduled);
    assert_job_types!(setup.queue, [JobType::AfterAccountAddBalance]);
    Ok(())
}

#[tokio::test]
async fn events_are_scheduled_in_block_order() -> anyhow::Result<()> {
    let setup = setup_monitor(Role::Agent, 30, |b| b).await?;
    setup.store.insert_offering(OFFERING).await;
    // Pushed out of order; the topic-1 query returns them as stored.
    setup.chain.push_log(service(20).offering_deleted(AGENT, OFFERING));
    setup.chain.push_log(service(5).offering_created(AGENT, OFFERING));

    setup.monitor.collect_once().await?;
    setup.monitor.schedule_once().await?;

    assert_job_types!(
        setup.queue,
        [JobType::AgentAfterOfferingMsgBCPublish, JobType::AgentAfterOfferingDelete]
    );
    Ok(())
}
