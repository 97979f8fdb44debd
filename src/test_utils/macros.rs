use alloy::primitives::B256;

use crate::types::PersistedEvent;

/// Asserts the types of the jobs a [`RecordingQueue`](crate::test_utils::RecordingQueue)
/// accepted, in submission order.
///
/// ```no_run
/// # use channel_monitor::{assert_job_types, job::JobType, test_utils::RecordingQueue};
/// let queue = RecordingQueue::new();
/// assert_job_types!(queue, []);
/// assert_job_types!(queue, [JobType::AgentAfterChannelCreate]);
/// ```
#[macro_export]
macro_rules! assert_job_types {
    ($queue: expr, [$($job_type: expr),* $(,)?]) => {{
        let submitted: ::std::vec::Vec<$crate::job::JobType> =
            $queue.jobs().iter().map(|job| job.job_type).collect();
        let expected: ::std::vec::Vec<$crate::job::JobType> = vec![$($job_type),*];
        assert_eq!(submitted, expected, "Unexpected jobs in queue");
    }};
}

/// Asserts the scheduling state of the stored event emitted in transaction `tx_hash`.
///
/// Accepted states:
/// * `pending`: no job reference yet, no failures
/// * `ignored`: the ignored marker was recorded
/// * `scheduled`: a real job id was recorded
/// * `failures = N`: no job reference yet, `N` failed attempts
///
/// Must be called from an async context; reads the store with `events().await`.
///
/// # Panics
///
/// If no stored event has that transaction hash, or if the state differs.
#[macro_export]
macro_rules! assert_event_state {
    ($store: expr, $tx_hash: expr, pending) => {{
        let event = $crate::test_utils::macros::stored_event(&$store.events().await, $tx_hash);
        assert_eq!(event.job_ref, None, "Expected pending event, got {event:#?}");
        assert_eq!(event.failures, 0, "Expected pending event, got {event:#?}");
    }};
    ($store: expr, $tx_hash: expr, ignored) => {{
        let event = $crate::test_utils::macros::stored_event(&$store.events().await, $tx_hash);
        assert!(event.is_ignored(), "Expected ignored event, got {event:#?}");
    }};
    ($store: expr, $tx_hash: expr, scheduled) => {{
        let event = $crate::test_utils::macros::stored_event(&$store.events().await, $tx_hash);
        assert!(
            event.is_scheduled() && !event.is_ignored(),
            "Expected scheduled event, got {event:#?}"
        );
    }};
    ($store: expr, $tx_hash: expr, failures = $count: expr) => {{
        let event = $crate::test_utils::macros::stored_event(&$store.events().await, $tx_hash);
        assert_eq!(event.job_ref, None, "Expected unscheduled event, got {event:#?}");
        assert_eq!(event.failures, $count, "Unexpected failure count for {event:#?}");
    }};
}

/// The stored event emitted in `tx_hash`.
///
/// # Panics
///
/// If there is none.
#[must_use]
pub fn stored_event(events: &[PersistedEvent], tx_hash: B256) -> PersistedEvent {
    events
        .iter()
        .find(|stored| stored.event.tx_hash == tx_hash)
        .cloned()
        .unwrap_or_else(|| panic!("No stored event for transaction {tx_hash}"))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, B256};

    use crate::{
        store::{MemoryStore, Store},
        test_utils::{LogBuilder, RecordingQueue},
        types::Disposition,
    };

    #[tokio::test]
    async fn event_state_follows_dispositions() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let log = LogBuilder::new(Address::ZERO).block(1).tx(B256::repeat_byte(7)).transfer(
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            5,
        );
        store.commit_window(vec![log], 1).await?;
        assert_event_state!(store, B256::repeat_byte(7), pending);

        let id = store.events().await[0].id;
        store.dispose_event(id, Disposition::Failed).await?;
        assert_event_state!(store, B256::repeat_byte(7), failures = 1);

        store.dispose_event(id, Disposition::Ignored).await?;
        assert_event_state!(store, B256::repeat_byte(7), ignored);
        Ok(())
    }

    #[test]
    #[should_panic = "Unexpected jobs in queue"]
    fn job_types_mismatch_panics() {
        let queue = RecordingQueue::new();
        assert_job_types!(queue, [crate::job::JobType::AfterAccountAddBalance]);
    }
}
