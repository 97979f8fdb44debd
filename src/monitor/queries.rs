use alloy::primitives::{Address, B256};

use crate::{
    contracts::{Contracts, EventKind},
    types::{BlockRange, FilterQuery, QueryScope, Role},
};

/// Events a client observes across the whole market, regardless of who they name.
const CLIENT_GLOBAL_EVENTS: [EventKind; 6] = [
    EventKind::ChannelCreated,
    EventKind::OfferingCreated,
    EventKind::OfferingDeleted,
    EventKind::OfferingPopedUp,
    EventKind::CooperativeChannelClose,
    EventKind::UnCooperativeChannelClose,
];

/// Builds the log queries a node with `role` issues for one window.
///
/// The node RPC cannot express "address in topic 1 or topic 2", so each role issues several
/// queries whose union covers what it must see. Queries keyed on `local` addresses match
/// nothing when `local` is empty.
#[must_use]
pub fn build_queries(
    role: Role,
    contracts: &Contracts,
    local: &[Address],
    range: BlockRange,
) -> Vec<FilterQuery> {
    let both = vec![contracts.service, contracts.token];
    let token = vec![contracts.token];
    let addresses: Vec<B256> = local.iter().map(|address| address.into_word()).collect();

    match role {
        Role::Agent => vec![
            // Anything naming a local agent in the first indexed position.
            FilterQuery::new(both, range, QueryScope::SelfScoped)
                .events(&EventKind::ALL)
                .topic(1, addresses.clone()),
            // Inbound token transfers.
            FilterQuery::new(token, range, QueryScope::SelfScoped)
                .events(&[EventKind::TokenTransfer])
                .topic(2, addresses),
        ],
        Role::Client => vec![
            FilterQuery::new(both, range, QueryScope::SelfScoped)
                .events(&[
                    EventKind::TokenTransfer,
                    EventKind::ChannelToppedUp,
                    EventKind::ChannelCloseRequested,
                ])
                .topic(2, addresses.clone()),
            FilterQuery::new(token, range, QueryScope::SelfScoped)
                .events(&[EventKind::TokenTransfer, EventKind::TokenApproval])
                .topic(1, addresses),
            FilterQuery::new(vec![contracts.service], range, QueryScope::Global)
                .events(&CLIENT_GLOBAL_EVENTS),
        ],
    }
}
