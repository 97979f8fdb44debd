use std::{fmt, ops::RangeInclusive};

use alloy::primitives::{Address, B256, BlockNumber, Bytes};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contracts::EventKind;

/// Job reference recorded for events that were deliberately not turned into a job.
pub const IGNORED_JOB_ID: Uuid = Uuid::nil();

/// Which side of the payment network this node acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Agent => f.write_str("agent"),
            Role::Client => f.write_str("client"),
        }
    }
}

/// Inclusive window of block numbers to scan in one collect cycle.
///
/// A range with `first > last` is empty and means there is nothing to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub first: BlockNumber,
    pub last: BlockNumber,
}

impl BlockRange {
    #[must_use]
    pub const fn new(first: BlockNumber, last: BlockNumber) -> Self {
        Self { first, last }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first > self.last
    }
}

impl From<BlockRange> for RangeInclusive<BlockNumber> {
    fn from(range: BlockRange) -> Self {
        range.first..=range.last
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.first, self.last)
    }
}

/// Whether a query only names locally managed identities or sweeps the whole market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    SelfScoped,
    Global,
}

/// A log filter over a block window.
///
/// `topics[i]` constrains topic `i`: `None` is a wildcard, `Some(set)` requires one of the
/// hashes in `set`. An empty set matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterQuery {
    pub addresses: Vec<Address>,
    pub topics: [Option<Vec<B256>>; 4],
    pub from_block: BlockNumber,
    pub to_block: BlockNumber,
    pub scope: QueryScope,
}

impl FilterQuery {
    #[must_use]
    pub fn new(addresses: Vec<Address>, range: BlockRange, scope: QueryScope) -> Self {
        Self {
            addresses,
            topics: [None, None, None, None],
            from_block: range.first,
            to_block: range.last,
            scope,
        }
    }

    /// Restricts `topics[0]` to the signatures of `kinds`.
    #[must_use]
    pub fn events(self, kinds: &[EventKind]) -> Self {
        self.topic(0, kinds.iter().map(|kind| kind.signature()).collect())
    }

    #[must_use]
    pub fn topic(mut self, position: usize, set: Vec<B256>) -> Self {
        self.topics[position] = Some(set);
        self
    }

    /// True when some topic position is constrained to an empty set.
    #[must_use]
    pub fn matches_nothing(&self) -> bool {
        self.topics.iter().flatten().any(Vec::is_empty)
    }

    /// Evaluates the filter against a log locally.
    #[must_use]
    pub fn matches(&self, event: &LogEvent) -> bool {
        if event.block_number < self.from_block || event.block_number > self.to_block {
            return false;
        }
        if !self.addresses.is_empty() && !self.addresses.contains(&event.address) {
            return false;
        }
        self.topics.iter().enumerate().all(|(i, constraint)| match constraint {
            None => true,
            Some(set) => event.topics.get(i).is_some_and(|topic| set.contains(topic)),
        })
    }
}

/// A contract log as returned by the chain node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub address: Address,
    pub block_number: BlockNumber,
    pub tx_hash: B256,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default)]
    pub removed: bool,
}

impl LogEvent {
    /// Decoded `topics[0]`, if it is one of the contract events.
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        self.topics.first().and_then(EventKind::from_signature)
    }

    #[must_use]
    pub fn topic(&self, position: usize) -> Option<B256> {
        self.topics.get(position).copied()
    }

    /// Interprets an indexed topic as a left-padded address.
    #[must_use]
    pub fn topic_address(&self, position: usize) -> Option<Address> {
        self.topic(position).map(Address::from_word)
    }

    /// Fields that identify the same log across overlapping scans.
    #[must_use]
    pub fn identity(&self) -> (B256, &[B256], BlockNumber, Address) {
        (self.tx_hash, &self.topics, self.block_number, self.address)
    }
}

/// A log event once it has been stored, plus its scheduling state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEvent {
    pub id: Uuid,
    #[serde(flatten)]
    pub event: LogEvent,
    pub job_ref: Option<Uuid>,
    pub failures: u32,
}

impl PersistedEvent {
    #[must_use]
    pub fn new(event: LogEvent) -> Self {
        Self { id: Uuid::new_v4(), event, job_ref: None, failures: 0 }
    }

    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.job_ref.is_some()
    }

    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.job_ref == Some(IGNORED_JOB_ID)
    }
}

/// How the scheduler settled a persisted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A job was accepted by the queue.
    Scheduled(Uuid),
    /// Nothing to do, or the queue already had the work.
    Ignored,
    /// Submission failed; try again on the next sweep.
    Failed,
}
