//! The chain node collaborator.
//!
//! The monitor only needs two reads from a node (logs by filter and the latest block number)
//! plus a way to drop stale connections. [`ChainClient`] is that seam; [`RobustProvider`]
//! implements it for real nodes and `test_utils::MockChain` for tests.

use alloy::{
    network::Network,
    primitives::B256,
    rpc::types::{Filter, FilterSet, Log, Topic},
};

use crate::{
    robust_provider::{Error, RobustProvider},
    types::{FilterQuery, LogEvent},
};

/// Read access to a chain node.
pub trait ChainClient: Send + Sync + 'static {
    /// Fetches every log matching `query`.
    ///
    /// Queries for which [`FilterQuery::matches_nothing`] holds are never passed in.
    fn fetch_logs(
        &self,
        query: &FilterQuery,
    ) -> impl Future<Output = Result<Vec<LogEvent>, Error>> + Send;

    /// Number of the current chain head.
    fn latest_block_number(&self) -> impl Future<Output = Result<u64, Error>> + Send;

    /// Drops idle connections so the next call dials the node again.
    fn reset_connections(&self) -> impl Future<Output = Result<(), Error>> + Send;
}

impl<N: Network> ChainClient for RobustProvider<N> {
    async fn fetch_logs(&self, query: &FilterQuery) -> Result<Vec<LogEvent>, Error> {
        let filter = Filter::from(query);
        let logs = self.get_logs(&filter).await?;
        Ok(logs.into_iter().filter_map(LogEvent::from_rpc).collect())
    }

    async fn latest_block_number(&self) -> Result<u64, Error> {
        self.get_block_number().await
    }

    async fn reset_connections(&self) -> Result<(), Error> {
        self.reconnect().await
    }
}

impl From<&FilterQuery> for Filter {
    fn from(query: &FilterQuery) -> Self {
        let mut filter = Filter::new()
            .address(query.addresses.clone())
            .from_block(query.from_block)
            .to_block(query.to_block);

        for (position, constraint) in query.topics.iter().enumerate() {
            if let Some(set) = constraint {
                filter.topics[position] = Topic::from(FilterSet::<B256>::from(set.clone()));
            }
        }

        filter
    }
}

impl LogEvent {
    /// Converts a node log, dropping logs that are not yet mined into a block.
    #[must_use]
    pub fn from_rpc(log: Log) -> Option<LogEvent> {
        let block_number = log.block_number?;
        let tx_hash = log.transaction_hash?;
        let removed = log.removed;
        let address = log.address();
        let (topics, data) = log.inner.data.split();

        Some(LogEvent { address, block_number, tx_hash, topics, data, removed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{
        primitives::{Address, Bytes, LogData, address},
        rpc::types::FilterBlockOption,
    };

    use crate::types::{BlockRange, QueryScope};

    #[test]
    fn filter_keeps_window_addresses_and_topics() {
        let psc = address!("0x1000000000000000000000000000000000000001");
        let wanted = B256::repeat_byte(0x11);
        let query = FilterQuery::new(vec![psc], BlockRange::new(5, 9), QueryScope::SelfScoped)
            .topic(2, vec![wanted]);

        let filter = Filter::from(&query);

        assert!(filter.address.matches(&psc));
        assert!(!filter.address.matches(&Address::ZERO));
        assert!(filter.topics[0].is_empty());
        assert!(filter.topics[2].matches(&wanted));
        assert!(!filter.topics[2].matches(&B256::ZERO));
        match filter.block_option {
            FilterBlockOption::Range { from_block, to_block } => {
                assert_eq!(from_block.and_then(|b| b.as_number()), Some(5));
                assert_eq!(to_block.and_then(|b| b.as_number()), Some(9));
            }
            FilterBlockOption::AtBlockHash(_) => panic!("expected a block range"),
        }
    }

    #[test]
    fn pending_logs_are_dropped() {
        let inner = alloy::primitives::Log {
            address: Address::ZERO,
            data: LogData::new_unchecked(vec![B256::ZERO], Bytes::new()),
        };
        let pending = Log { inner: inner.clone(), ..Default::default() };
        assert!(LogEvent::from_rpc(pending).is_none());

        let mined = Log {
            inner,
            block_number: Some(7),
            transaction_hash: Some(B256::repeat_byte(1)),
            removed: true,
            ..Default::default()
        };
        let event = LogEvent::from_rpc(mined).unwrap();
        assert_eq!(event.block_number, 7);
        assert!(event.removed);
        assert_eq!(event.topics, vec![B256::ZERO]);
    }
}
