//! Collaborator contract for reading and resizing worker tiers.

use tierscale_core::{Tier, TierCounts};

use crate::error::BackendResult;

/// Trait abstracting the cluster orchestrator and the work queue.
///
/// Calls are blocking from the controller's point of view; supplying
/// timeouts is the implementation's job.
pub trait TierBackend: Send {
    /// Currently requested replica counts per tier.
    fn counts(&mut self) -> BackendResult<TierCounts>;
    /// Replicas per tier that are ready to take work.
    fn ready_counts(&mut self) -> BackendResult<TierCounts>;
    /// Current backlog length.
    fn queue_len(&mut self) -> BackendResult<u64>;
    /// Request that `tier` be resized to `count`. Fire-and-forget.
    fn set_count(&mut self, tier: Tier, count: u32);
}

impl<B: TierBackend + ?Sized> TierBackend for Box<B> {
    fn counts(&mut self) -> BackendResult<TierCounts> {
        (**self).counts()
    }

    fn ready_counts(&mut self) -> BackendResult<TierCounts> {
        (**self).ready_counts()
    }

    fn queue_len(&mut self) -> BackendResult<u64> {
        (**self).queue_len()
    }

    fn set_count(&mut self, tier: Tier, count: u32) {
        (**self).set_count(tier, count)
    }
}
