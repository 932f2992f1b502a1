//! Per-pool byte accounting for command pools.

use std::collections::BTreeMap;

use pcsize_protocol::CommandPoolAccounting;
use tracing::{trace, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLedger {
    pools: BTreeMap<u64, CommandPoolAccounting>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, pool_id: u64) -> &mut CommandPoolAccounting {
        self.pools
            .entry(pool_id)
            .or_insert_with(|| CommandPoolAccounting::new(pool_id))
    }

    /// Apply signed byte deltas to a pool and update its peaks.
    pub fn record_delta(
        &mut self,
        pool_id: u64,
        pool_alloc_delta: i64,
        pool_reserved_delta: i64,
        buffer_alloc_delta: i64,
    ) -> &CommandPoolAccounting {
        let pool = self.entry(pool_id);
        apply_delta(pool_id, "pool allocated", &mut pool.current_pool_allocated, pool_alloc_delta);
        apply_delta(pool_id, "pool reserved", &mut pool.current_pool_reserved, pool_reserved_delta);
        apply_delta(pool_id, "buffer allocated", &mut pool.current_buffer_allocated, buffer_alloc_delta);
        pool.peak_pool_allocated = pool.peak_pool_allocated.max(pool.current_pool_allocated);
        pool.peak_pool_reserved = pool.peak_pool_reserved.max(pool.current_pool_reserved);
        pool.peak_buffer_allocated = pool.peak_buffer_allocated.max(pool.current_buffer_allocated);
        trace!(
            pool_id,
            allocated = pool.current_pool_allocated,
            reserved = pool.current_pool_reserved,
            buffers = pool.current_buffer_allocated,
            "command pool delta"
        );
        pool
    }

    /// Count command buffers allocated from a pool.
    pub fn allocate_command_buffers(&mut self, pool_id: u64, count: u32) -> &CommandPoolAccounting {
        let pool = self.entry(pool_id);
        pool.buffer_count = pool.buffer_count.saturating_add(count);
        pool
    }

    /// Zero a pool's live counters. Peaks and buffer count are kept.
    pub fn reset(&mut self, pool_id: u64) -> &CommandPoolAccounting {
        let pool = self.entry(pool_id);
        pool.current_pool_allocated = 0;
        pool.current_pool_reserved = 0;
        pool.current_buffer_allocated = 0;
        pool
    }

    /// Fold a shard ledger into this one: peaks and buffer counts are maxed,
    /// live counters summed.
    pub fn merge(&mut self, other: ResourceLedger) {
        for (pool_id, theirs) in other.pools {
            let ours = self.entry(pool_id);
            ours.buffer_count = ours.buffer_count.max(theirs.buffer_count);
            ours.current_pool_allocated =
                ours.current_pool_allocated.saturating_add(theirs.current_pool_allocated);
            ours.current_pool_reserved =
                ours.current_pool_reserved.saturating_add(theirs.current_pool_reserved);
            ours.current_buffer_allocated =
                ours.current_buffer_allocated.saturating_add(theirs.current_buffer_allocated);
            ours.peak_pool_allocated = ours
                .peak_pool_allocated
                .max(theirs.peak_pool_allocated)
                .max(ours.current_pool_allocated);
            ours.peak_pool_reserved = ours
                .peak_pool_reserved
                .max(theirs.peak_pool_reserved)
                .max(ours.current_pool_reserved);
            ours.peak_buffer_allocated = ours
                .peak_buffer_allocated
                .max(theirs.peak_buffer_allocated)
                .max(ours.current_buffer_allocated);
        }
    }

    pub fn get(&self, pool_id: u64) -> Option<&CommandPoolAccounting> {
        self.pools.get(&pool_id)
    }

    /// Pools in id order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandPoolAccounting> {
        self.pools.values()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn into_accounting(self) -> Vec<CommandPoolAccounting> {
        self.pools.into_values().collect()
    }

    pub fn from_accounting(pools: Vec<CommandPoolAccounting>) -> Self {
        let mut ledger = Self::new();
        for pool in pools {
            let mut single = BTreeMap::new();
            single.insert(pool.pool_id, pool);
            ledger.merge(ResourceLedger { pools: single });
        }
        ledger
    }
}

fn apply_delta(pool_id: u64, counter: &str, current: &mut u64, delta: i64) {
    *current = match current.checked_add_signed(delta) {
        Some(value) => value,
        None if delta < 0 => {
            warn!(pool_id, counter, delta, current = *current, "counter clamped at zero");
            0
        }
        None => u64::MAX,
    };
}
