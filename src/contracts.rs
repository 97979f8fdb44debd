//! Event declarations for the service contract (PSC) and the token contract (PTC).
//!
//! Log dispatch is done through [`EventKind`], built from the event signature digests that
//! `sol!` derives for each declaration.

use std::fmt;

use alloy::{
    primitives::{Address, B256},
    sol,
    sol_types::SolEvent,
};

sol! {
    /// Service contract events.
    #[derive(Debug, PartialEq, Eq)]
    event LogChannelCreated(
        address indexed _agent,
        address indexed _client,
        bytes32 indexed _offering_hash,
        uint192 _deposit,
        bytes32 _authentication_hash
    );

    #[derive(Debug, PartialEq, Eq)]
    event LogChannelToppedUp(
        address indexed _agent,
        address indexed _client,
        bytes32 indexed _offering_hash,
        uint32 _open_block_number,
        uint192 _added_deposit
    );

    #[derive(Debug, PartialEq, Eq)]
    event LogChannelCloseRequested(
        address indexed _agent,
        address indexed _client,
        bytes32 indexed _offering_hash,
        uint32 _open_block_number,
        uint192 _balance
    );

    #[derive(Debug, PartialEq, Eq)]
    event LogOfferingCreated(
        address indexed _agent,
        bytes32 indexed _offering_hash,
        uint256 indexed _min_deposit,
        uint16 _current_supply
    );

    #[derive(Debug, PartialEq, Eq)]
    event LogOfferingDeleted(address indexed _agent, bytes32 indexed _offering_hash);

    #[derive(Debug, PartialEq, Eq)]
    event LogOfferingPopedUp(address indexed _agent, bytes32 indexed _offering_hash);

    #[derive(Debug, PartialEq, Eq)]
    event LogCooperativeChannelClose(
        address indexed _agent,
        address indexed _client,
        bytes32 indexed _offering_hash,
        uint32 _open_block_number,
        uint192 _balance
    );

    #[derive(Debug, PartialEq, Eq)]
    event LogUnCooperativeChannelClose(
        address indexed _agent,
        address indexed _client,
        bytes32 indexed _offering_hash,
        uint32 _open_block_number,
        uint192 _balance
    );

    /// Token contract events.
    #[derive(Debug, PartialEq, Eq)]
    event Approval(address indexed owner, address indexed spender, uint256 value);

    #[derive(Debug, PartialEq, Eq)]
    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// Every contract event the monitor knows how to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ChannelCreated,
    ChannelToppedUp,
    ChannelCloseRequested,
    OfferingCreated,
    OfferingDeleted,
    OfferingPopedUp,
    CooperativeChannelClose,
    UnCooperativeChannelClose,
    TokenApproval,
    TokenTransfer,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::ChannelCreated,
        EventKind::ChannelToppedUp,
        EventKind::ChannelCloseRequested,
        EventKind::OfferingCreated,
        EventKind::OfferingDeleted,
        EventKind::OfferingPopedUp,
        EventKind::CooperativeChannelClose,
        EventKind::UnCooperativeChannelClose,
        EventKind::TokenApproval,
        EventKind::TokenTransfer,
    ];

    /// Offering lifecycle events, observed market-wide by clients.
    pub const OFFERING: [EventKind; 3] =
        [EventKind::OfferingCreated, EventKind::OfferingDeleted, EventKind::OfferingPopedUp];

    /// The keccak digest found in `topics[0]` of a log of this kind.
    #[must_use]
    pub const fn signature(self) -> B256 {
        match self {
            EventKind::ChannelCreated => LogChannelCreated::SIGNATURE_HASH,
            EventKind::ChannelToppedUp => LogChannelToppedUp::SIGNATURE_HASH,
            EventKind::ChannelCloseRequested => LogChannelCloseRequested::SIGNATURE_HASH,
            EventKind::OfferingCreated => LogOfferingCreated::SIGNATURE_HASH,
            EventKind::OfferingDeleted => LogOfferingDeleted::SIGNATURE_HASH,
            EventKind::OfferingPopedUp => LogOfferingPopedUp::SIGNATURE_HASH,
            EventKind::CooperativeChannelClose => LogCooperativeChannelClose::SIGNATURE_HASH,
            EventKind::UnCooperativeChannelClose => LogUnCooperativeChannelClose::SIGNATURE_HASH,
            EventKind::TokenApproval => Approval::SIGNATURE_HASH,
            EventKind::TokenTransfer => Transfer::SIGNATURE_HASH,
        }
    }

    /// Looks up the kind for a signature digest.
    #[must_use]
    pub fn from_signature(signature: &B256) -> Option<EventKind> {
        EventKind::ALL.into_iter().find(|kind| kind.signature() == *signature)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            EventKind::ChannelCreated => "LogChannelCreated",
            EventKind::ChannelToppedUp => "LogChannelToppedUp",
            EventKind::ChannelCloseRequested => "LogChannelCloseRequested",
            EventKind::OfferingCreated => "LogOfferingCreated",
            EventKind::OfferingDeleted => "LogOfferingDeleted",
            EventKind::OfferingPopedUp => "LogOfferingPopedUp",
            EventKind::CooperativeChannelClose => "LogCooperativeChannelClose",
            EventKind::UnCooperativeChannelClose => "LogUnCooperativeChannelClose",
            EventKind::TokenApproval => "Approval",
            EventKind::TokenTransfer => "Transfer",
        }
    }

    #[must_use]
    pub fn is_offering_related(self) -> bool {
        EventKind::OFFERING.contains(&self)
    }

    /// Events emitted by the token contract rather than the service contract.
    #[must_use]
    pub const fn is_token_event(self) -> bool {
        matches!(self, EventKind::TokenApproval | EventKind::TokenTransfer)
    }

    /// Channel events whose payload starts with the channel's open block number.
    #[must_use]
    pub const fn carries_open_block(self) -> bool {
        matches!(
            self,
            EventKind::ChannelToppedUp
                | EventKind::ChannelCloseRequested
                | EventKind::CooperativeChannelClose
                | EventKind::UnCooperativeChannelClose
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Renders a signature digest by event name when known, by hex otherwise.
#[must_use]
pub fn event_name(signature: &B256) -> String {
    EventKind::from_signature(signature).map_or_else(|| signature.to_string(), |k| k.to_string())
}

/// Addresses of the two deployed contracts the monitor watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contracts {
    /// Privatix service contract.
    pub service: Address,
    /// Privatix token contract.
    pub token: Address,
}

impl Contracts {
    #[must_use]
    pub const fn new(service: Address, token: Address) -> Self {
        Self { service, token }
    }
}
