//! Bounded traversal of index chains
//!
//! A chain ends at a negative `nextIndex`. Corrupted chains can point back at
//! a block already visited, past the end of the index area, or at a master
//! block; the walker reports each and stops rather than looping or handing
//! a master block out as an index block.

use crate::seed_name::SeedName;
use std::collections::HashSet;
use tracing::warn;

/// One step of a chain walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStep {
    /// Visit this block, then call [`ChainWalker::advance`] with its `nextIndex`
    Block(i32),
    /// The chain pointed back at an already visited block; the walk is over
    Cycle(i32),
    /// The chain pointed outside `1..=max_block`; the walk is over
    OutOfRange(i32),
    /// The chain pointed at a master block; the walk is over
    Reserved(i32),
}

/// State machine walking one channel's chain
#[derive(Debug)]
pub struct ChainWalker {
    channel: SeedName,
    pending: Option<i32>,
    visited: HashSet<i32>,
    reserved: HashSet<i32>,
    max_block: i32,
}

impl ChainWalker {
    /// Start at `first`; any block number above `max_block` is out of range
    pub fn new(channel: SeedName, first: i32, max_block: i32) -> Self {
        Self {
            channel,
            pending: (first >= 0).then_some(first),
            visited: HashSet::new(),
            reserved: HashSet::new(),
            max_block,
        }
    }

    /// Treat `blocks` (the master blocks) as never part of a chain
    pub fn with_reserved(mut self, blocks: impl IntoIterator<Item = i32>) -> Self {
        self.reserved.extend(blocks);
        self
    }

    /// Produce the next step, or `None` when the chain has ended
    pub fn next_step(&mut self) -> Option<ChainStep> {
        let block = self.pending.take()?;
        if block < 1 || block > self.max_block {
            warn!(
                "Chain for {} points at block {} outside 1..={}",
                self.channel, block, self.max_block
            );
            return Some(ChainStep::OutOfRange(block));
        }
        if self.reserved.contains(&block) {
            warn!("Chain for {} points at master block {}", self.channel, block);
            return Some(ChainStep::Reserved(block));
        }
        if !self.visited.insert(block) {
            warn!("Chain cycle for {}: block {} was already visited", self.channel, block);
            return Some(ChainStep::Cycle(block));
        }
        Some(ChainStep::Block(block))
    }

    /// Follow the `nextIndex` of the block just visited
    pub fn advance(&mut self, next_index: i32) {
        self.pending = (next_index >= 0).then_some(next_index);
    }

    /// Abandon the rest of the chain
    pub fn stop(&mut self) {
        self.pending = None;
    }

    /// Number of distinct blocks visited so far
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn channel(&self) -> &SeedName {
        &self.channel
    }
}
