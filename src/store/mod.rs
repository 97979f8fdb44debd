//! The persistence collaborator.
//!
//! The monitor never talks to a database directly. Everything it reads or writes goes through
//! [`Store`], whose multi-row writes must be atomic: either the whole operation is durable or
//! none of it is.

use alloy::primitives::{Address, B256, BlockNumber};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Disposition, LogEvent, PersistedEvent};

mod memory;

pub use memory::MemoryStore;

/// Errors reported by a [`Store`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing database could not be reached or failed mid-operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The row an update refers to does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The write would break a stored invariant and was rolled back.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Identity of a payment channel.
///
/// A channel is not keyed by a single value on chain: the same agent, client and offering can
/// open a new channel later, which then differs in its open block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub offering_hash: B256,
    pub agent: Address,
    pub client: Address,
    pub open_block: BlockNumber,
}

/// Reads and writes the monitor needs from the local database.
pub trait Store: Send + Sync + 'static {
    /// Raw value of a setting, `None` when unset.
    fn get_setting(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    fn set_setting(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Addresses of the accounts currently flagged in use.
    fn addresses_in_use(&self) -> impl Future<Output = Result<Vec<Address>, StoreError>> + Send;

    /// Inserts the events not seen before and moves the checkpoint to `last`, atomically.
    ///
    /// Events are deduplicated on [`LogEvent::identity`], both against stored rows and within
    /// `events`. Returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when `last` is below the stored checkpoint; nothing is
    /// written in that case.
    fn commit_window(
        &self,
        events: Vec<LogEvent>,
        last: BlockNumber,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Stored events without a job reference, in block order.
    fn unscheduled_events(
        &self,
    ) -> impl Future<Output = Result<Vec<PersistedEvent>, StoreError>> + Send;

    /// Records the scheduling outcome of an event.
    ///
    /// [`Disposition::Failed`] increments the failure counter and leaves the job reference
    /// unset.
    fn dispose_event(
        &self,
        id: Uuid,
        disposition: Disposition,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Whether an offering-deleted event for `offering_hash` has been stored.
    fn offering_deleted(
        &self,
        offering_hash: B256,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn channel_by_key(
        &self,
        key: ChannelKey,
    ) -> impl Future<Output = Result<Option<Uuid>, StoreError>> + Send;

    /// Channel whose creation was recorded under `tx_hash`.
    fn channel_by_tx(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = Result<Option<Uuid>, StoreError>> + Send;

    fn offering_by_hash(
        &self,
        offering_hash: B256,
    ) -> impl Future<Output = Result<Option<Uuid>, StoreError>> + Send;

    /// First local account whose address is one of `addresses`.
    fn account_by_addresses(
        &self,
        addresses: &[Address],
    ) -> impl Future<Output = Result<Option<Uuid>, StoreError>> + Send;
}
