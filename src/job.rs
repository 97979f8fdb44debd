//! Work items handed to the job queue collaborator.

use std::fmt;

use alloy::primitives::{Address, B256, BlockNumber, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{LogEvent, PersistedEvent};

/// `createdBy` marker of every job produced by the monitor.
pub const CREATED_BY: &str = "bc_monitor";

/// Job kinds the monitor can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    #[serde(rename = "agentAfterChannelCreate")]
    AgentAfterChannelCreate,
    #[serde(rename = "agentAfterChannelTopUp")]
    AgentAfterChannelTopUp,
    #[serde(rename = "agentAfterUncooperativeCloseRequest")]
    AgentAfterUncooperativeCloseRequest,
    #[serde(rename = "agentAfterCooperativeClose")]
    AgentAfterCooperativeClose,
    #[serde(rename = "agentAfterUncooperativeClose")]
    AgentAfterUncooperativeClose,
    #[serde(rename = "agentAfterOfferingMsgBCPublish")]
    AgentAfterOfferingMsgBCPublish,
    #[serde(rename = "agentAfterOfferingPopUp")]
    AgentAfterOfferingPopUp,
    #[serde(rename = "agentAfterOfferingDelete")]
    AgentAfterOfferingDelete,
    #[serde(rename = "clientAfterChannelCreate")]
    ClientAfterChannelCreate,
    #[serde(rename = "clientAfterChannelTopUp")]
    ClientAfterChannelTopUp,
    #[serde(rename = "clientAfterUncooperativeCloseRequest")]
    ClientAfterUncooperativeCloseRequest,
    #[serde(rename = "clientAfterCooperativeClose")]
    ClientAfterCooperativeClose,
    #[serde(rename = "clientAfterUncooperativeClose")]
    ClientAfterUncooperativeClose,
    #[serde(rename = "clientAfterOfferingMsgBCPublish")]
    ClientAfterOfferingMsgBCPublish,
    #[serde(rename = "clientAfterOfferingPopUp")]
    ClientAfterOfferingPopUp,
    #[serde(rename = "clientAfterOfferingDelete")]
    ClientAfterOfferingDelete,
    #[serde(rename = "clientRecordClosing")]
    ClientRecordClosing,
    #[serde(rename = "preAccountAddBalance")]
    PreAccountAddBalance,
    #[serde(rename = "afterAccountAddBalance")]
    AfterAccountAddBalance,
    #[serde(rename = "afterAccountReturnBalance")]
    AfterAccountReturnBalance,
    #[serde(rename = "decrementCurrentSupply")]
    DecrementCurrentSupply,
    #[serde(rename = "incrementCurrentSupply")]
    IncrementCurrentSupply,
}

impl JobType {
    /// Name of the job type as the queue knows it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            JobType::AgentAfterChannelCreate => "agentAfterChannelCreate",
            JobType::AgentAfterChannelTopUp => "agentAfterChannelTopUp",
            JobType::AgentAfterUncooperativeCloseRequest => "agentAfterUncooperativeCloseRequest",
            JobType::AgentAfterCooperativeClose => "agentAfterCooperativeClose",
            JobType::AgentAfterUncooperativeClose => "agentAfterUncooperativeClose",
            JobType::AgentAfterOfferingMsgBCPublish => "agentAfterOfferingMsgBCPublish",
            JobType::AgentAfterOfferingPopUp => "agentAfterOfferingPopUp",
            JobType::AgentAfterOfferingDelete => "agentAfterOfferingDelete",
            JobType::ClientAfterChannelCreate => "clientAfterChannelCreate",
            JobType::ClientAfterChannelTopUp => "clientAfterChannelTopUp",
            JobType::ClientAfterUncooperativeCloseRequest => "clientAfterUncooperativeCloseRequest",
            JobType::ClientAfterCooperativeClose => "clientAfterCooperativeClose",
            JobType::ClientAfterUncooperativeClose => "clientAfterUncooperativeClose",
            JobType::ClientAfterOfferingMsgBCPublish => "clientAfterOfferingMsgBCPublish",
            JobType::ClientAfterOfferingPopUp => "clientAfterOfferingPopUp",
            JobType::ClientAfterOfferingDelete => "clientAfterOfferingDelete",
            JobType::ClientRecordClosing => "clientRecordClosing",
            JobType::PreAccountAddBalance => "preAccountAddBalance",
            JobType::AfterAccountAddBalance => "afterAccountAddBalance",
            JobType::AfterAccountReturnBalance => "afterAccountReturnBalance",
            JobType::DecrementCurrentSupply => "decrementCurrentSupply",
            JobType::IncrementCurrentSupply => "incrementCurrentSupply",
        }
    }

    /// Client jobs whose related id is the offering that an event announced.
    #[must_use]
    pub const fn announces_offering(self) -> bool {
        matches!(self, JobType::ClientAfterOfferingMsgBCPublish | JobType::ClientAfterOfferingPopUp)
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of entity a job acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelatedType {
    Offering,
    Channel,
    Account,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosingKind {
    Cooperative,
    Uncooperative,
}

/// A channel closing as seen on chain, recorded for rating agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosingRecord {
    pub id: Uuid,
    pub kind: ClosingKind,
    pub agent: Address,
    pub client: Address,
    pub balance: U256,
    pub open_block: BlockNumber,
}

/// Data attached to a job.
///
/// Always carries the originating log so consumers can act without querying the chain again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub ethereum_log: LogEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing: Option<ClosingRecord>,
    #[serde(default)]
    pub update_ratings: bool,
}

impl JobPayload {
    #[must_use]
    pub fn new(ethereum_log: LogEvent) -> Self {
        Self { ethereum_log, closing: None, update_ratings: false }
    }
}

/// The unit submitted to the job queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub related_type: RelatedType,
    pub related_id: Uuid,
    /// Id of the persisted event the job was produced from.
    pub origin_event: Uuid,
    pub created_by: String,
    pub data: serde_json::Value,
}

impl JobSpec {
    /// Builds a job for `event` with the plain log payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn for_event(
        job_type: JobType,
        related_type: RelatedType,
        related_id: Uuid,
        event: &PersistedEvent,
    ) -> Result<Self, serde_json::Error> {
        Self::with_payload(
            job_type,
            related_type,
            related_id,
            event.id,
            &JobPayload::new(event.event.clone()),
        )
    }

    /// Builds a job carrying an explicit payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn with_payload(
        job_type: JobType,
        related_type: RelatedType,
        related_id: Uuid,
        origin_event: Uuid,
        payload: &JobPayload,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            job_type,
            related_type,
            related_id,
            origin_event,
            created_by: CREATED_BY.to_owned(),
            data: serde_json::to_value(payload)?,
        })
    }

    /// Decodes the attached payload.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` is not a [`JobPayload`].
    pub fn payload(&self) -> Result<JobPayload, serde_json::Error> {
        JobPayload::deserialize(&self.data)
    }

    /// Related id of this job if it announces the offering with `offering_hash`.
    #[must_use]
    pub fn announced_offering(&self, offering_hash: B256) -> Option<Uuid> {
        if !self.job_type.announces_offering() {
            return None;
        }
        let payload = self.payload().ok()?;
        (payload.ethereum_log.topic(2) == Some(offering_hash)).then_some(self.related_id)
    }
}

/// Errors reported by [`JobQueue::add`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// An equivalent job was already submitted.
    #[error("duplicated job")]
    Duplicated,

    /// An equivalent job is being processed right now.
    #[error("job is already being processed")]
    AlreadyProcessing,

    /// The queue no longer accepts jobs.
    #[error("job queue is closed")]
    Closed,

    #[error("job queue error: {0}")]
    Other(String),
}

impl QueueError {
    /// The work is already known to the queue; the event can be considered handled.
    #[must_use]
    pub fn is_already_handled(&self) -> bool {
        matches!(self, QueueError::Duplicated | QueueError::AlreadyProcessing)
    }
}

/// The job queue collaborator.
pub trait JobQueue: Send + Sync + 'static {
    /// Submits a job, returning the id the queue assigned to it.
    fn add(&self, job: JobSpec) -> impl Future<Output = Result<Uuid, QueueError>> + Send;

    /// Related id of an already committed client job announcing the offering with
    /// `offering_hash`.
    fn offering_job_related_id(
        &self,
        offering_hash: B256,
    ) -> impl Future<Output = Result<Option<Uuid>, QueueError>> + Send;
}
