use std::{collections::HashMap, time::Duration};

use alloy::primitives::{Address, B256, BlockNumber};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::{
    contracts::EventKind,
    settings::LAST_PROCESSED_BLOCK_KEY,
    store::{ChannelKey, Store, StoreError},
    types::{Disposition, IGNORED_JOB_ID, LogEvent, PersistedEvent},
};

#[derive(Debug)]
struct Account {
    id: Uuid,
    address: Address,
    in_use: bool,
}

#[derive(Debug)]
struct Channel {
    id: Uuid,
    key: ChannelKey,
    tx_hash: Option<B256>,
}

#[derive(Debug, Default)]
struct State {
    available: bool,
    latency: Duration,
    settings: HashMap<String, String>,
    accounts: Vec<Account>,
    offerings: HashMap<B256, Uuid>,
    channels: Vec<Channel>,
    events: Vec<PersistedEvent>,
}

impl State {
    fn check_available(&self) -> Result<(), StoreError> {
        if self.available {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".into()))
        }
    }
}

/// In-process [`Store`].
///
/// One mutex guards all tables, so every trait operation is a transaction. Entity rows
/// (accounts, offerings, channels) are seeded through the inherent methods, the way the
/// account and offering subsystems would populate a real database.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self { state: Mutex::new(State { available: true, ..State::default() }) }
    }

    /// Makes every subsequent operation fail with [`StoreError::Unavailable`] until switched
    /// back on.
    pub async fn set_available(&self, available: bool) {
        self.state.lock().await.available = available;
    }

    /// Makes every subsequent transaction hold the store for `latency` before it runs.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = latency;
    }

    async fn transaction(&self) -> MutexGuard<'_, State> {
        let state = self.state.lock().await;
        if !state.latency.is_zero() {
            tokio::time::sleep(state.latency).await;
        }
        state
    }

    pub async fn insert_account(&self, address: Address, in_use: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.accounts.push(Account { id, address, in_use });
        id
    }

    pub async fn insert_offering(&self, offering_hash: B256) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.offerings.insert(offering_hash, id);
        id
    }

    /// Adds a channel, optionally linked to the transaction that opened it.
    pub async fn insert_channel(&self, key: ChannelKey, tx_hash: Option<B256>) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.channels.push(Channel { id, key, tx_hash });
        id
    }

    /// Snapshot of every stored event, in insertion order.
    pub async fn events(&self) -> Vec<PersistedEvent> {
        self.state.lock().await.events.clone()
    }
}

impl Store for MemoryStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let state = self.transaction().await;
        state.check_available()?;
        Ok(state.settings.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut state = self.transaction().await;
        state.check_available()?;
        state.settings.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn addresses_in_use(&self) -> Result<Vec<Address>, StoreError> {
        let state = self.transaction().await;
        state.check_available()?;
        Ok(state.accounts.iter().filter(|acc| acc.in_use).map(|acc| acc.address).collect())
    }

    async fn commit_window(
        &self,
        events: Vec<LogEvent>,
        last: BlockNumber,
    ) -> Result<usize, StoreError> {
        let mut state = self.transaction().await;
        state.check_available()?;

        let checkpoint = match state.settings.get(LAST_PROCESSED_BLOCK_KEY) {
            Some(value) => value.trim().parse::<BlockNumber>().map_err(|_| {
                StoreError::Conflict(format!("stored checkpoint {value:?} is not a number"))
            })?,
            None => 0,
        };
        if last < checkpoint {
            return Err(StoreError::Conflict(format!(
                "checkpoint {checkpoint} cannot move back to {last}"
            )));
        }

        let mut inserted = 0;
        for event in events {
            let seen = state.events.iter().any(|stored| stored.event.identity() == event.identity());
            if !seen {
                state.events.push(PersistedEvent::new(event));
                inserted += 1;
            }
        }
        state.settings.insert(LAST_PROCESSED_BLOCK_KEY.to_owned(), last.to_string());

        Ok(inserted)
    }

    async fn unscheduled_events(&self) -> Result<Vec<PersistedEvent>, StoreError> {
        let state = self.transaction().await;
        state.check_available()?;
        let mut events: Vec<_> =
            state.events.iter().filter(|stored| !stored.is_scheduled()).cloned().collect();
        events.sort_by_key(|stored| stored.event.block_number);
        Ok(events)
    }

    async fn dispose_event(&self, id: Uuid, disposition: Disposition) -> Result<(), StoreError> {
        let mut state = self.transaction().await;
        state.check_available()?;
        let stored = state
            .events
            .iter_mut()
            .find(|stored| stored.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("event {id}")))?;

        match disposition {
            Disposition::Scheduled(job_id) => stored.job_ref = Some(job_id),
            Disposition::Ignored => stored.job_ref = Some(IGNORED_JOB_ID),
            Disposition::Failed => stored.failures += 1,
        }
        Ok(())
    }

    async fn offering_deleted(&self, offering_hash: B256) -> Result<bool, StoreError> {
        let state = self.transaction().await;
        state.check_available()?;
        Ok(state.events.iter().any(|stored| {
            stored.event.kind() == Some(EventKind::OfferingDeleted)
                && stored.event.topic(2) == Some(offering_hash)
        }))
    }

    async fn channel_by_key(&self, key: ChannelKey) -> Result<Option<Uuid>, StoreError> {
        let state = self.transaction().await;
        state.check_available()?;
        Ok(state.channels.iter().find(|channel| channel.key == key).map(|channel| channel.id))
    }

    async fn channel_by_tx(&self, tx_hash: B256) -> Result<Option<Uuid>, StoreError> {
        let state = self.transaction().await;
        state.check_available()?;
        Ok(state
            .channels
            .iter()
            .find(|channel| channel.tx_hash == Some(tx_hash))
            .map(|channel| channel.id))
    }

    async fn offering_by_hash(&self, offering_hash: B256) -> Result<Option<Uuid>, StoreError> {
        let state = self.transaction().await;
        state.check_available()?;
        Ok(state.offerings.get(&offering_hash).copied())
    }

    async fn account_by_addresses(&self, addresses: &[Address]) -> Result<Option<Uuid>, StoreError> {
        let state = self.transaction().await;
        state.check_available()?;
        Ok(state
            .accounts
            .iter()
            .find(|acc| addresses.contains(&acc.address))
            .map(|acc| acc.id))
    }
}
