use channel_monitor::{
    Role, assert_event_state, assert_job_types, contracts::EventKind, job::JobType,
    store::ChannelKey,
};

use crate::common::{AGENT, CLIENT, OFFERING, OTHER_AGENT, service, setup_monitor};

#[tokio::test]
async fn same_log_yields_role_specific_jobs() -> anyhow::Result<()> {
    let agent = setup_monitor(Role::Agent, 30, |b| b).await?;
    let client = setup_monitor(Role::Client, 30, |b| b).await?;
    let key = ChannelKey { offering_hash: OFFERING, agent: AGENT, client: CLIENT, open_block: 10 };
    let log =
        service(12).channel_event(EventKind::ChannelToppedUp, AGENT, CLIENT, OFFERING, 10, 25);

    for setup in [&agent, &client] {
        setup.store.insert_channel(key, None).await;
        setup.chain.push_log(log.clone());
        setup.monitor.collect_once().await?;
        setup.monitor.schedule_once().await?;
    }

    assert_job_types!(agent.queue, [JobType::AgentAfterChannelTopUp]);
    assert_job_types!(client.queue, [JobType::ClientAfterChannelTopUp]);
    Ok(())
}

#[tokio::test]
async fn client_sees_foreign_offerings_agent_does_not() -> anyhow::Result<()> {
    let agent = setup_monitor(Role::Agent, 30, |b| b).await?;
    let client = setup_monitor(Role::Client, 30, |b| b).await?;
    let log = service(8).offering_created(OTHER_AGENT, OFFERING);

    for setup in [&agent, &client] {
        setup.chain.push_log(log.clone());
        setup.monitor.collect_once().await?;
        setup.monitor.schedule_once().await?;
    }

    assert!(agent.store.events().await.is_empty());
    assert_event_state!(client.store, log.tx_hash, scheduled);
    assert_job_types!(client.queue, [JobType::ClientAfterOfferingMsgBCPublish]);
    Ok(())
}

#[tokio::test]
async fn client_skips_offerings_of_its_own_addresses() -> anyhow::Result<()> {
    let client = setup_monitor(Role::Client, 30, |b| b).await?;
    client.chain.push_log(service(8).offering_created(CLIENT, OFFERING));

    client.monitor.collect_once().await?;

    assert!(client.store.events().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn client_supply_update_follows_offering_seen_in_same_window() -> anyhow::Result<()> {
    let client = setup_monitor(Role::Client, 30, |b| b).await?;
    let popped = service(20).offering_popped_up(OTHER_AGENT, OFFERING);
    let created = service(21).channel_created(OTHER_AGENT, CLIENT, OFFERING);
    client.chain.push_log(popped);
    client.chain.push_log(created.clone());

    client.monitor.collect_once().await?;
    client.monitor.schedule_once().await?;

    assert_job_types!(
        client.queue,
        [JobType::ClientAfterOfferingPopUp, JobType::DecrementCurrentSupply]
    );
    let jobs = client.queue.jobs();
    assert_eq!(jobs[1].related_id, jobs[0].related_id);
    assert_event_state!(client.store, created.tx_hash, scheduled);
    Ok(())
}

#[tokio::test]
async fn client_closing_is_recorded_for_ratings() -> anyhow::Result<()> {
    let client = setup_monitor(Role::Client, 60, |b| b.rate_after(2)).await?;
    let offering = client.store.insert_offering(OFFERING).await;
    client.queue.allow_duplicates(JobType::IncrementCurrentSupply);
    for open_block in [10, 11] {
        let key = ChannelKey { offering_hash: OFFERING, agent: AGENT, client: CLIENT, open_block };
        client.store.insert_channel(key, None).await;
        client.chain.push_log(service(u64::from(open_block) + 30).channel_event(
            EventKind::UnCooperativeChannelClose,
            AGENT,
            CLIENT,
            OFFERING,
            u32::try_from(open_block)?,
            7,
        ));
    }

    client.monitor.collect_once().await?;
    client.monitor.schedule_once().await?;

    let closings = client.queue.jobs_of(JobType::ClientRecordClosing);
    assert_eq!(closings.len(), 2);
    assert!(!closings[0].payload()?.update_ratings);
    assert!(closings[1].payload()?.update_ratings);

    let releases = client.queue.jobs_of(JobType::IncrementCurrentSupply);
    assert_eq!(releases.len(), 2);
    assert!(releases.iter().all(|job| job.related_id == offering));
    assert_eq!(client.queue.jobs_of(JobType::ClientAfterUncooperativeClose).len(), 2);
    Ok(())
}
