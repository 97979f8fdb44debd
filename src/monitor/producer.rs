use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use alloy::{
    primitives::{Address, B256, BlockNumber, U256},
    sol_types::SolEvent,
};
use uuid::Uuid;

use crate::{
    MonitorError,
    contracts::{
        Contracts, EventKind, LogChannelCloseRequested, LogChannelToppedUp,
        LogCooperativeChannelClose, LogUnCooperativeChannelClose,
    },
    job::{ClosingKind, ClosingRecord, JobPayload, JobQueue, JobSpec, JobType, RelatedType},
    store::{ChannelKey, Store},
    types::{LogEvent, PersistedEvent, Role},
};

/// Job type a role produces for a channel or offering event.
///
/// Token events are not role specific and map to `None`.
#[must_use]
pub const fn job_type_for(role: Role, kind: EventKind) -> Option<JobType> {
    let job_type = match (role, kind) {
        (Role::Agent, EventKind::ChannelCreated) => JobType::AgentAfterChannelCreate,
        (Role::Agent, EventKind::ChannelToppedUp) => JobType::AgentAfterChannelTopUp,
        (Role::Agent, EventKind::ChannelCloseRequested) => {
            JobType::AgentAfterUncooperativeCloseRequest
        }
        (Role::Agent, EventKind::CooperativeChannelClose) => JobType::AgentAfterCooperativeClose,
        (Role::Agent, EventKind::UnCooperativeChannelClose) => {
            JobType::AgentAfterUncooperativeClose
        }
        (Role::Agent, EventKind::OfferingCreated) => JobType::AgentAfterOfferingMsgBCPublish,
        (Role::Agent, EventKind::OfferingPopedUp) => JobType::AgentAfterOfferingPopUp,
        (Role::Agent, EventKind::OfferingDeleted) => JobType::AgentAfterOfferingDelete,
        (Role::Client, EventKind::ChannelCreated) => JobType::ClientAfterChannelCreate,
        (Role::Client, EventKind::ChannelToppedUp) => JobType::ClientAfterChannelTopUp,
        (Role::Client, EventKind::ChannelCloseRequested) => {
            JobType::ClientAfterUncooperativeCloseRequest
        }
        (Role::Client, EventKind::CooperativeChannelClose) => JobType::ClientAfterCooperativeClose,
        (Role::Client, EventKind::UnCooperativeChannelClose) => {
            JobType::ClientAfterUncooperativeClose
        }
        (Role::Client, EventKind::OfferingCreated) => JobType::ClientAfterOfferingMsgBCPublish,
        (Role::Client, EventKind::OfferingPopedUp) => JobType::ClientAfterOfferingPopUp,
        (Role::Client, EventKind::OfferingDeleted) => JobType::ClientAfterOfferingDelete,
        (_, EventKind::TokenApproval | EventKind::TokenTransfer) => return None,
    };
    Some(job_type)
}

/// Open block number carried in the payload of a channel event.
///
/// `None` for events without one, or when the payload does not decode.
#[must_use]
pub fn open_block_number(event: &LogEvent) -> Option<BlockNumber> {
    let topics = event.topics.iter().copied();
    let block = match event.kind()? {
        EventKind::ChannelToppedUp => {
            LogChannelToppedUp::decode_raw_log(topics, &event.data).ok()?._open_block_number
        }
        EventKind::ChannelCloseRequested => {
            LogChannelCloseRequested::decode_raw_log(topics, &event.data).ok()?._open_block_number
        }
        EventKind::CooperativeChannelClose => {
            LogCooperativeChannelClose::decode_raw_log(topics, &event.data)
                .ok()?
                ._open_block_number
        }
        EventKind::UnCooperativeChannelClose => {
            LogUnCooperativeChannelClose::decode_raw_log(topics, &event.data)
                .ok()?
                ._open_block_number
        }
        _ => return None,
    };
    Some(BlockNumber::from(block))
}

/// Maps persisted events to the jobs the node's role requires.
pub struct Producer<S, Q> {
    pub(crate) role: Role,
    pub(crate) contracts: Contracts,
    pub(crate) store: Arc<S>,
    pub(crate) queue: Arc<Q>,
    pub(crate) rate_after: u32,
    pub(crate) closings: AtomicU32,
}

impl<S: Store, Q: JobQueue> Producer<S, Q> {
    pub(crate) fn new(
        role: Role,
        contracts: Contracts,
        store: Arc<S>,
        queue: Arc<Q>,
        rate_after: u32,
    ) -> Self {
        Self { role, contracts, store, queue, rate_after, closings: AtomicU32::new(0) }
    }

    /// Produces the jobs for `event`.
    ///
    /// `batch` holds the jobs the queue accepted or already knew earlier in the same sweep. It is
    /// consulted when a channel event refers to an offering that was announced moments before
    /// and is not stored yet.
    ///
    /// An empty result means the event needs no work, usually because it names an entity this
    /// node does not track.
    ///
    /// # Errors
    ///
    /// Store failures and payload encoding failures.
    pub async fn produce(
        &self,
        event: &PersistedEvent,
        batch: &[JobSpec],
    ) -> Result<Vec<JobSpec>, MonitorError> {
        let Some(kind) = event.event.kind() else {
            debug!(event_id = %event.id, "Unknown event signature");
            return Ok(Vec::new());
        };

        match (self.role, kind) {
            (_, EventKind::TokenApproval) => self.on_token_approval(event).await,
            (_, EventKind::TokenTransfer) => self.on_token_transfer(event).await,
            (Role::Agent, EventKind::ChannelCreated) => self.agent_on_channel_created(event).await,
            (Role::Client, EventKind::ChannelCreated) => {
                self.client_on_channel_created(event, batch).await
            }
            (Role::Client, EventKind::CooperativeChannelClose) => {
                self.client_on_channel_closed(event, kind, ClosingKind::Cooperative, batch).await
            }
            (Role::Client, EventKind::UnCooperativeChannelClose) => {
                self.client_on_channel_closed(event, kind, ClosingKind::Uncooperative, batch).await
            }
            (
                _,
                EventKind::ChannelToppedUp
                | EventKind::ChannelCloseRequested
                | EventKind::CooperativeChannelClose
                | EventKind::UnCooperativeChannelClose,
            ) => self.on_existing_channel(event, kind).await,
            (Role::Client, EventKind::OfferingCreated) => {
                self.client_on_offering_created(event).await
            }
            (Role::Client, EventKind::OfferingPopedUp) => {
                self.client_on_offering_popped_up(event).await
            }
            (
                _,
                EventKind::OfferingCreated | EventKind::OfferingDeleted | EventKind::OfferingPopedUp,
            ) => self.on_existing_offering(event, kind).await,
        }
    }

    async fn agent_on_channel_created(
        &self,
        event: &PersistedEvent,
    ) -> Result<Vec<JobSpec>, MonitorError> {
        let Some(offering_hash) = event.event.topic(3) else {
            return Ok(Vec::new());
        };
        if self.store.offering_by_hash(offering_hash).await?.is_none() {
            debug!(offering_hash = %offering_hash, "Offering not found");
            return Ok(Vec::new());
        }
        // The channel row is created by the job itself.
        self.single(event, JobType::AgentAfterChannelCreate, RelatedType::Channel, Uuid::new_v4())
    }

    async fn client_on_channel_created(
        &self,
        event: &PersistedEvent,
        batch: &[JobSpec],
    ) -> Result<Vec<JobSpec>, MonitorError> {
        let mut jobs = Vec::new();

        match self.find_channel(&event.event, EventKind::ChannelCreated).await? {
            Some(channel) => jobs.push(self.job(
                event,
                JobType::ClientAfterChannelCreate,
                RelatedType::Channel,
                channel,
            )?),
            None => debug!(tx_hash = %event.event.tx_hash, "Created channel is not local"),
        }

        if let Some(offering) = self.supply_offering(event, batch).await? {
            jobs.push(self.job(
                event,
                JobType::DecrementCurrentSupply,
                RelatedType::Offering,
                offering,
            )?);
        }

        Ok(jobs)
    }

    async fn client_on_channel_closed(
        &self,
        event: &PersistedEvent,
        kind: EventKind,
        closing: ClosingKind,
        batch: &[JobSpec],
    ) -> Result<Vec<JobSpec>, MonitorError> {
        let mut jobs = self.on_existing_channel(event, kind).await?;

        match self.record_closing(event, closing)? {
            Some(job) => jobs.push(job),
            None => warn!(event_id = %event.id, "Closing payload does not decode"),
        }

        if let Some(offering) = self.supply_offering(event, batch).await? {
            jobs.push(self.job(
                event,
                JobType::IncrementCurrentSupply,
                RelatedType::Offering,
                offering,
            )?);
        }

        Ok(jobs)
    }

    async fn on_existing_channel(
        &self,
        event: &PersistedEvent,
        kind: EventKind,
    ) -> Result<Vec<JobSpec>, MonitorError> {
        let Some(job_type) = job_type_for(self.role, kind) else {
            return Ok(Vec::new());
        };
        match self.find_channel(&event.event, kind).await? {
            Some(channel) => self.single(event, job_type, RelatedType::Channel, channel),
            None => {
                warn!(
                    event = %kind,
                    tx_hash = %event.event.tx_hash,
                    "Channel not found"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn client_on_offering_created(
        &self,
        event: &PersistedEvent,
    ) -> Result<Vec<JobSpec>, MonitorError> {
        let Some(offering_hash) = event.event.topic(2) else {
            return Ok(Vec::new());
        };
        if self.store.offering_deleted(offering_hash).await? {
            debug!(offering_hash = %offering_hash, "Offering already deleted");
            return Ok(Vec::new());
        }
        self.single(
            event,
            JobType::ClientAfterOfferingMsgBCPublish,
            RelatedType::Offering,
            Uuid::new_v4(),
        )
    }

    async fn client_on_offering_popped_up(
        &self,
        event: &PersistedEvent,
    ) -> Result<Vec<JobSpec>, MonitorError> {
        let Some(offering_hash) = event.event.topic(2) else {
            return Ok(Vec::new());
        };
        let offering = self.store.offering_by_hash(offering_hash).await?.unwrap_or_else(Uuid::new_v4);
        self.single(event, JobType::ClientAfterOfferingPopUp, RelatedType::Offering, offering)
    }

    async fn on_existing_offering(
        &self,
        event: &PersistedEvent,
        kind: EventKind,
    ) -> Result<Vec<JobSpec>, MonitorError> {
        let (Some(job_type), Some(offering_hash)) =
            (job_type_for(self.role, kind), event.event.topic(2))
        else {
            return Ok(Vec::new());
        };
        match self.store.offering_by_hash(offering_hash).await? {
            Some(offering) => self.single(event, job_type, RelatedType::Offering, offering),
            None => {
                debug!(offering_hash = %offering_hash, "Offering not found");
                Ok(Vec::new())
            }
        }
    }

    async fn on_token_approval(&self, event: &PersistedEvent) -> Result<Vec<JobSpec>, MonitorError> {
        let Some(owner) = event.event.topic_address(1) else {
            return Ok(Vec::new());
        };
        match self.store.account_by_addresses(&[owner]).await? {
            Some(account) => {
                self.single(event, JobType::PreAccountAddBalance, RelatedType::Account, account)
            }
            None => {
                debug!(address = %owner, "Account not found");
                Ok(Vec::new())
            }
        }
    }

    async fn on_token_transfer(&self, event: &PersistedEvent) -> Result<Vec<JobSpec>, MonitorError> {
        let (Some(from), Some(to)) = (event.event.topic_address(1), event.event.topic_address(2))
        else {
            return Ok(Vec::new());
        };
        let job_type = if from == self.contracts.service {
            JobType::AfterAccountReturnBalance
        } else {
            JobType::AfterAccountAddBalance
        };
        match self.store.account_by_addresses(&[from, to]).await? {
            Some(account) => self.single(event, job_type, RelatedType::Account, account),
            None => {
                debug!(from = %from, to = %to, "Account not found");
                Ok(Vec::new())
            }
        }
    }

    /// Resolves the local channel an event refers to.
    ///
    /// Channels are looked up by offering, parties and open block. A channel-created event
    /// opens the channel in its own block. When the open block cannot be decoded, or a created
    /// channel is not found by key, the transaction recorded for the channel is tried.
    async fn find_channel(
        &self,
        event: &LogEvent,
        kind: EventKind,
    ) -> Result<Option<Uuid>, MonitorError> {
        let Some((agent, client, offering_hash)) = channel_parties(event) else {
            return Ok(None);
        };

        let created = kind == EventKind::ChannelCreated;
        let open_block = if created { Some(event.block_number) } else { open_block_number(event) };

        if let Some(open_block) = open_block {
            let key = ChannelKey { offering_hash, agent, client, open_block };
            let found = self.store.channel_by_key(key).await?;
            if found.is_some() || !created {
                return Ok(found);
            }
        }

        Ok(self.store.channel_by_tx(event.tx_hash).await?)
    }

    /// Offering whose supply a channel event changes.
    ///
    /// Falls back from the stored offering to a committed announcing job, then to a job
    /// announced earlier in this sweep.
    async fn supply_offering(
        &self,
        event: &PersistedEvent,
        batch: &[JobSpec],
    ) -> Result<Option<Uuid>, MonitorError> {
        let Some(offering_hash) = event.event.topic(3) else {
            return Ok(None);
        };

        if let Some(offering) = self.store.offering_by_hash(offering_hash).await? {
            return Ok(Some(offering));
        }

        match self.queue.offering_job_related_id(offering_hash).await {
            Ok(Some(offering)) => return Ok(Some(offering)),
            Ok(None) => {}
            Err(e) => error!(error = %e, "Failed to look up offering jobs"),
        }

        let pending = batch.iter().find_map(|job| job.announced_offering(offering_hash));
        if pending.is_none() {
            debug!(offering_hash = %offering_hash, "Offering for supply update not found");
        }
        Ok(pending)
    }

    fn record_closing(
        &self,
        event: &PersistedEvent,
        closing: ClosingKind,
    ) -> Result<Option<JobSpec>, MonitorError> {
        let Some((open_block, balance)) = closing_fields(&event.event, closing) else {
            return Ok(None);
        };
        let (Some(agent), Some(client)) =
            (event.event.topic_address(1), event.event.topic_address(2))
        else {
            return Ok(None);
        };

        let payload = JobPayload {
            ethereum_log: event.event.clone(),
            closing: Some(ClosingRecord {
                id: Uuid::new_v4(),
                kind: closing,
                agent,
                client,
                balance,
                open_block,
            }),
            update_ratings: self.update_ratings(),
        };

        Ok(Some(JobSpec::with_payload(
            JobType::ClientRecordClosing,
            RelatedType::Channel,
            Uuid::new_v4(),
            event.id,
            &payload,
        )?))
    }

    /// True when the next recorded closing is the `rate_after`-th one.
    fn update_ratings(&self) -> bool {
        self.closings.load(Ordering::SeqCst) + 1 >= self.rate_after
    }

    /// Counts a closing the job queue accepted.
    pub(crate) fn closing_recorded(&self) {
        let rate_after = self.rate_after;
        // The closure never returns `None`.
        let _ = self.closings.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
            Some(if count + 1 >= rate_after { 0 } else { count + 1 })
        });
    }

    fn job(
        &self,
        event: &PersistedEvent,
        job_type: JobType,
        related_type: RelatedType,
        related_id: Uuid,
    ) -> Result<JobSpec, MonitorError> {
        trace!(job_type = %job_type, related_id = %related_id, "Producing job");
        Ok(JobSpec::for_event(job_type, related_type, related_id, event)?)
    }

    fn single(
        &self,
        event: &PersistedEvent,
        job_type: JobType,
        related_type: RelatedType,
        related_id: Uuid,
    ) -> Result<Vec<JobSpec>, MonitorError> {
        Ok(vec![self.job(event, job_type, related_type, related_id)?])
    }
}

fn closing_fields(event: &LogEvent, closing: ClosingKind) -> Option<(BlockNumber, U256)> {
    let topics = event.topics.iter().copied();
    let (open_block, balance) = match closing {
        ClosingKind::Cooperative => {
            let decoded = LogCooperativeChannelClose::decode_raw_log(topics, &event.data).ok()?;
            (decoded._open_block_number, decoded._balance)
        }
        ClosingKind::Uncooperative => {
            let decoded = LogUnCooperativeChannelClose::decode_raw_log(topics, &event.data).ok()?;
            (decoded._open_block_number, decoded._balance)
        }
    };
    Some((BlockNumber::from(open_block), U256::from(balance)))
}

/// Agent, client and offering hash from the indexed topics of a channel event.
fn channel_parties(event: &LogEvent) -> Option<(Address, Address, B256)> {
    Some((event.topic_address(1)?, event.topic_address(2)?, event.topic(3)?))
}
