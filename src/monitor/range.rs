use alloy::primitives::BlockNumber;

use crate::{settings::RuntimeSettings, types::BlockRange};

/// Computes the next window of confirmed blocks to scan.
///
/// The window starts right after `checkpoint` and ends `min_confirmations` below `head`.
/// `fresh_blocks` bounds how far behind the end the start may lag after an outage, and
/// `block_limit` caps the width. Zero disables either bound.
///
/// An empty result (`first > last`) means there is nothing to scan this cycle.
#[must_use]
pub fn range_of_interest(
    checkpoint: BlockNumber,
    head: BlockNumber,
    settings: &RuntimeSettings,
) -> BlockRange {
    let mut first = checkpoint.saturating_add(1);
    let mut last = head.saturating_sub(settings.min_confirmations);

    if settings.fresh_blocks != 0 {
        first = first.max(last.saturating_sub(settings.fresh_blocks));
    }

    if settings.block_limit != 0 && last > first && last - first > settings.block_limit {
        last = first + settings.block_limit;
    }

    BlockRange::new(first, last)
}
