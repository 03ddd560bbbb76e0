//! Reusable arena of decoded index blocks
//!
//! Long-running processes decode index blocks continuously. Rather than
//! allocating a record per block, [`IndexBlockPool`] keeps an arena of
//! records addressed by [`BlockHandle`]. Each slot is either checked out or
//! on the free list, and carries a generation counter that is bumped on
//! release so a stale handle is caught as [`IndexError::PoolMisuse`].
//!
//! All operations take one internal lock, so a pool can be shared between
//! producer and consumer threads.

use crate::constants::BLOCK_SIZE;
use crate::error::IndexError;
use crate::index_block::IndexBlock;
use crate::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Statistics for pool operations
#[derive(Debug, Default)]
pub struct PoolStatistics {
    /// Acquires served from the free list
    pub pool_hits: AtomicU64,
    /// Acquires that had to grow the arena
    pub pool_misses: AtomicU64,
    /// Acquires rejected because the block did not decode
    pub parse_failures: AtomicU64,
    /// Handles returned to the free list
    pub releases: AtomicU64,
    /// Free slots dropped by `shrink_to`
    pub discards: AtomicU64,
    /// Largest free list observed
    pub peak_free_size: AtomicU64,
}

impl PoolStatistics {
    fn record_hit(&self) {
        self.pool_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.pool_misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    fn record_discards(&self, count: usize) {
        self.discards.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Update the free-list high-water mark
    pub fn update_peak_free_size(&self, current_size: usize) {
        self.peak_free_size.fetch_max(current_size as u64, Ordering::Relaxed);
    }

    /// Fraction of acquires served without growing the arena
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.pool_hits.load(Ordering::Relaxed);
        let total = hits + self.pool_misses.load(Ordering::Relaxed);

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.pool_hits.load(Ordering::Relaxed) + self.pool_misses.load(Ordering::Relaxed)
    }
}

/// Configuration for pool sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Free records allocated up front
    pub initial_capacity: usize,
    /// Free records kept after `shrink_to_default`
    pub max_free: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
            max_free: 1000,
        }
    }
}

/// Reference to a checked-out pool record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    index: usize,
    generation: u32,
}

impl BlockHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
struct Slot {
    block: IndexBlock,
    checked_out: bool,
}

#[derive(Debug, Default)]
struct Arena {
    /// `None` marks a slot discarded by shrinking, available for regrowth
    slots: Vec<Option<Slot>>,
    /// Per-position generation; outlives the slot so a reused position never
    /// repeats a generation an old handle may still carry
    generations: Vec<u32>,
    free: Vec<usize>,
    vacant: Vec<usize>,
    used: usize,
}

impl Arena {
    fn checked_out(&mut self, handle: BlockHandle) -> Result<&mut Slot> {
        let generation = self.generations.get(handle.index).copied();
        let state = self
            .slots
            .get(handle.index)
            .and_then(Option::as_ref)
            .map(|slot| slot.checked_out);
        let reason = match (generation, state) {
            (Some(generation), Some(true)) if generation == handle.generation => None,
            (Some(generation), Some(checked_out)) => Some(format!(
                "handle is not checked out (slot generation {}, checked out: {})",
                generation, checked_out
            )),
            (Some(generation), None) => Some(format!("slot was discarded (slot generation {})", generation)),
            (None, _) => Some("handle does not belong to this pool".to_string()),
        };
        if let Some(reason) = reason {
            return Err(IndexError::pool_misuse(handle.index, handle.generation, reason));
        }
        self.slots
            .get_mut(handle.index)
            .and_then(Option::as_mut)
            .ok_or_else(|| IndexError::pool_misuse(handle.index, handle.generation, "slot vanished"))
    }

    fn bump_generation(&mut self, index: usize) {
        if let Some(generation) = self.generations.get_mut(index) {
            *generation = generation.wrapping_add(1);
        }
    }

    fn push_free(&mut self, index: usize) {
        self.free.push(index);
    }

    fn new_slot(&mut self, block: IndexBlock) -> usize {
        let slot = Slot {
            block,
            checked_out: false,
        };
        let index = self.vacant.pop().unwrap_or(self.slots.len());
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        if index >= self.generations.len() {
            self.generations.resize(index + 1, 0);
        }
        self.slots[index] = Some(slot);
        index
    }
}

/// Thread-safe arena of reusable [`IndexBlock`] records
#[derive(Debug)]
pub struct IndexBlockPool {
    arena: Mutex<Arena>,
    config: PoolConfig,
    stats: Arc<PoolStatistics>,
}

impl Default for IndexBlockPool {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBlockPool {
    /// Create a pool with default configuration
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create a pool and pre-allocate `initial_capacity` free records
    pub fn with_config(config: PoolConfig) -> Self {
        let pool = Self {
            arena: Mutex::new(Arena::default()),
            config,
            stats: Arc::new(PoolStatistics::default()),
        };
        pool.prewarm(pool.config.initial_capacity);
        pool
    }

    /// Add `count` cleared records to the free list
    pub fn prewarm(&self, count: usize) {
        let mut arena = self.arena.lock();
        for _ in 0..count {
            let index = arena.new_slot(IndexBlock::default());
            arena.push_free(index);
        }
        self.stats.update_peak_free_size(arena.free.len());
    }

    /// Decode `buffer` into a free record and check it out
    ///
    /// A decode failure leaves the pool exactly as it was.
    pub fn acquire(&self, buffer: &[u8; BLOCK_SIZE], block_number: i32) -> Result<BlockHandle> {
        let decoded = IndexBlock::load(buffer, block_number).inspect_err(|_| self.stats.record_parse_failure())?;
        Ok(self.checkout(decoded))
    }

    /// Check out a record holding an already decoded block
    pub fn acquire_block(&self, block: IndexBlock) -> BlockHandle {
        self.checkout(block)
    }

    fn checkout(&self, block: IndexBlock) -> BlockHandle {
        let mut arena = self.arena.lock();
        let index = match arena.free.pop() {
            Some(index) => {
                self.stats.record_hit();
                index
            }
            None => {
                self.stats.record_miss();
                arena.new_slot(IndexBlock::default())
            }
        };
        arena.used += 1;
        if let Some(slot) = arena.slots[index].as_mut() {
            slot.block = block;
            slot.checked_out = true;
        }
        BlockHandle {
            index,
            generation: arena.generations[index],
        }
    }

    /// Return a checked-out record to the free list
    pub fn release(&self, handle: BlockHandle) -> Result<()> {
        let mut arena = self.arena.lock();
        let slot = arena.checked_out(handle)?;
        slot.block.clear();
        slot.checked_out = false;
        arena.bump_generation(handle.index);
        arena.used -= 1;
        arena.push_free(handle.index);
        self.stats.record_release();
        self.stats.update_peak_free_size(arena.free.len());
        Ok(())
    }

    /// Return every checked-out record, whatever its state
    pub fn release_all(&self) -> usize {
        let mut arena = self.arena.lock();
        let mut released = Vec::new();
        for (index, slot) in arena.slots.iter_mut().enumerate() {
            if let Some(slot) = slot.as_mut().filter(|slot| slot.checked_out) {
                slot.block.clear();
                slot.checked_out = false;
                released.push(index);
            }
        }
        arena.used = 0;
        for &index in &released {
            arena.bump_generation(index);
            arena.push_free(index);
        }
        self.stats.update_peak_free_size(arena.free.len());
        released.len()
    }

    /// Drop free records beyond `max_free_count`; returns how many were dropped
    pub fn shrink_to(&self, max_free_count: usize) -> usize {
        let mut arena = self.arena.lock();
        let excess = arena.free.len().saturating_sub(max_free_count);
        for _ in 0..excess {
            if let Some(index) = arena.free.pop() {
                arena.slots[index] = None;
                arena.bump_generation(index);
                arena.vacant.push(index);
            }
        }
        // Trailing vacant slots can be removed outright; their generations stay.
        while matches!(arena.slots.last(), Some(None)) {
            arena.slots.pop();
            let len = arena.slots.len();
            arena.vacant.retain(|&index| index < len);
        }
        self.stats.record_discards(excess);
        excess
    }

    /// Shrink back to the configured `max_free`
    pub fn shrink_to_default(&self) -> usize {
        self.shrink_to(self.config.max_free)
    }

    /// Read access to a checked-out record
    pub fn with_block<R>(&self, handle: BlockHandle, f: impl FnOnce(&IndexBlock) -> R) -> Result<R> {
        let mut arena = self.arena.lock();
        let slot = arena.checked_out(handle)?;
        Ok(f(&slot.block))
    }

    /// Write access to a checked-out record
    pub fn with_block_mut<R>(&self, handle: BlockHandle, f: impl FnOnce(&mut IndexBlock) -> R) -> Result<R> {
        let mut arena = self.arena.lock();
        let slot = arena.checked_out(handle)?;
        Ok(f(&mut slot.block))
    }

    /// Write access to two distinct checked-out records at once
    pub fn with_pair_mut<R>(
        &self,
        first: BlockHandle,
        second: BlockHandle,
        f: impl FnOnce(&mut IndexBlock, &mut IndexBlock) -> R,
    ) -> Result<R> {
        if first.index == second.index {
            return Err(IndexError::pool_misuse(
                second.index,
                second.generation,
                "the same record cannot be borrowed twice",
            ));
        }
        let mut arena = self.arena.lock();
        arena.checked_out(first)?;
        arena.checked_out(second)?;

        let (low, high) = (first.index.min(second.index), first.index.max(second.index));
        let (head, tail) = arena.slots.split_at_mut(high);
        match (head[low].as_mut(), tail[0].as_mut()) {
            (Some(low_slot), Some(high_slot)) => {
                if first.index < second.index {
                    Ok(f(&mut low_slot.block, &mut high_slot.block))
                } else {
                    Ok(f(&mut high_slot.block, &mut low_slot.block))
                }
            }
            _ => Err(IndexError::pool_misuse(first.index, first.generation, "slot vanished")),
        }
    }

    /// Copy a checked-out record out of the pool
    pub fn snapshot(&self, handle: BlockHandle) -> Result<IndexBlock> {
        self.with_block(handle, IndexBlock::clone)
    }

    /// Number of checked-out records
    pub fn used_count(&self) -> usize {
        self.arena.lock().used
    }

    /// Number of records on the free list
    pub fn free_count(&self) -> usize {
        self.arena.lock().free.len()
    }

    pub fn get_statistics(&self) -> Arc<PoolStatistics> {
        Arc::clone(&self.stats)
    }

    pub fn get_config(&self) -> &PoolConfig {
        &self.config
    }
}
