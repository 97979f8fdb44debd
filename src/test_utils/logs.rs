use alloy::{
    primitives::{Address, B256, BlockNumber, U256, aliases::U192, keccak256},
    sol_types::SolEvent,
};

use crate::{
    contracts::{
        Approval, EventKind, LogChannelCloseRequested, LogChannelCreated, LogChannelToppedUp,
        LogCooperativeChannelClose, LogOfferingCreated, LogOfferingDeleted, LogOfferingPopedUp,
        LogUnCooperativeChannelClose, Transfer,
    },
    types::LogEvent,
};

/// Builds logs as a node would return them for one emitting contract.
///
/// Unless set, the transaction hash is derived from the block number and the encoded event, so
/// equal events in the same block share an identity and different events do not.
///
/// ```
/// use alloy::primitives::{Address, B256};
/// use channel_monitor::test_utils::LogBuilder;
///
/// let log = LogBuilder::new(Address::ZERO)
///     .block(120)
///     .offering_popped_up(Address::repeat_byte(1), B256::repeat_byte(2));
/// assert_eq!(log.block_number, 120);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LogBuilder {
    address: Address,
    block_number: BlockNumber,
    tx_hash: Option<B256>,
    removed: bool,
}

impl LogBuilder {
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self { address, block_number: 0, tx_hash: None, removed: false }
    }

    #[must_use]
    pub fn block(mut self, block_number: BlockNumber) -> Self {
        self.block_number = block_number;
        self
    }

    #[must_use]
    pub fn tx(mut self, tx_hash: B256) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }

    /// Marks the log as retracted by a reorg.
    #[must_use]
    pub fn removed(mut self) -> Self {
        self.removed = true;
        self
    }

    /// Encodes any contract event.
    #[must_use]
    pub fn build<E: SolEvent>(&self, event: &E) -> LogEvent {
        let (topics, data) = event.encode_log_data().split();
        let tx_hash = self.tx_hash.unwrap_or_else(|| {
            let mut preimage = self.block_number.to_be_bytes().to_vec();
            topics.iter().for_each(|topic| preimage.extend_from_slice(topic.as_slice()));
            preimage.extend_from_slice(&data);
            keccak256(preimage)
        });

        LogEvent {
            address: self.address,
            block_number: self.block_number,
            tx_hash,
            topics,
            data,
            removed: self.removed,
        }
    }

    #[must_use]
    pub fn channel_created(&self, agent: Address, client: Address, offering_hash: B256) -> LogEvent {
        self.build(&LogChannelCreated {
            _agent: agent,
            _client: client,
            _offering_hash: offering_hash,
            _deposit: U192::from(100),
            _authentication_hash: B256::ZERO,
        })
    }

    /// Encodes a channel event that refers to a channel opened in `open_block`.
    ///
    /// `amount` is the added deposit for top-ups and the balance otherwise.
    ///
    /// # Panics
    ///
    /// If `kind` is not a channel event carrying an open block.
    #[must_use]
    pub fn channel_event(
        &self,
        kind: EventKind,
        agent: Address,
        client: Address,
        offering_hash: B256,
        open_block: u32,
        amount: u64,
    ) -> LogEvent {
        let amount = U192::from(amount);
        match kind {
            EventKind::ChannelToppedUp => self.build(&LogChannelToppedUp {
                _agent: agent,
                _client: client,
                _offering_hash: offering_hash,
                _open_block_number: open_block,
                _added_deposit: amount,
            }),
            EventKind::ChannelCloseRequested => self.build(&LogChannelCloseRequested {
                _agent: agent,
                _client: client,
                _offering_hash: offering_hash,
                _open_block_number: open_block,
                _balance: amount,
            }),
            EventKind::CooperativeChannelClose => self.build(&LogCooperativeChannelClose {
                _agent: agent,
                _client: client,
                _offering_hash: offering_hash,
                _open_block_number: open_block,
                _balance: amount,
            }),
            EventKind::UnCooperativeChannelClose => self.build(&LogUnCooperativeChannelClose {
                _agent: agent,
                _client: client,
                _offering_hash: offering_hash,
                _open_block_number: open_block,
                _balance: amount,
            }),
            other => panic!("{other} does not refer to an open channel"),
        }
    }

    #[must_use]
    pub fn offering_created(&self, agent: Address, offering_hash: B256) -> LogEvent {
        self.build(&LogOfferingCreated {
            _agent: agent,
            _offering_hash: offering_hash,
            _min_deposit: U256::from(100),
            _current_supply: 10,
        })
    }

    #[must_use]
    pub fn offering_deleted(&self, agent: Address, offering_hash: B256) -> LogEvent {
        self.build(&LogOfferingDeleted { _agent: agent, _offering_hash: offering_hash })
    }

    #[must_use]
    pub fn offering_popped_up(&self, agent: Address, offering_hash: B256) -> LogEvent {
        self.build(&LogOfferingPopedUp { _agent: agent, _offering_hash: offering_hash })
    }

    #[must_use]
    pub fn approval(&self, owner: Address, spender: Address, value: u64) -> LogEvent {
        self.build(&Approval { owner, spender, value: U256::from(value) })
    }

    #[must_use]
    pub fn transfer(&self, from: Address, to: Address, value: u64) -> LogEvent {
        self.build(&Transfer { from, to, value: U256::from(value) })
    }
}
