//! Index block codec and comparators
//!
//! An index block names one channel, links to the next block of that channel's
//! chain, and describes up to [`MAX_EXTENTS`] extents. Each extent covers
//! [`BLOCKS_PER_EXTENT`] contiguous data blocks; bit `j` of its bitmap is set
//! when data block `starting_block + j` holds committed data.
//!
//! # Layout
//!
//! ```text
//! 0   seedname        [u8; 12]
//! 12  nextIndex       i32   (-1 ends the chain)
//! 16  updateTime      i32
//! 20  extents         MAX_EXTENTS x { startingBlock i32, bitMap i64,
//!                                     earliestTime i16, latestTime i16 }
//! 500 reserved        [u8; 12] (preserved untouched)
//! ```
//!
//! All comparison helpers are pure functions of the two blocks passed in.

use crate::constants::{
    layout, BLOCKS_PER_EXTENT, BLOCK_SIZE, FULL_BITMAP, MAX_EXTENTS, SEED_NAME_LEN, TIME_QUANTUM_MILLIS,
    UNUSED_EXTENT,
};
use crate::error::IndexError;
use crate::seed_name::SeedName;
use bytes::{Buf, BufMut};
use fixedbitset::FixedBitSet;
use std::fmt::{self, Display, Formatter};

const RESERVED_LEN: usize = BLOCK_SIZE - layout::index::USED;

/// A run of up to 64 contiguous data blocks owned by one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub starting_block: i32,
    pub bitmap: i64,
    pub earliest_time: i16,
    pub latest_time: i16,
}

impl Default for Extent {
    fn default() -> Self {
        Self::UNUSED
    }
}

impl Extent {
    pub const UNUSED: Extent = Extent {
        starting_block: UNUSED_EXTENT,
        bitmap: 0,
        earliest_time: 0,
        latest_time: 0,
    };

    /// A fresh extent with no committed blocks
    pub fn starting_at(starting_block: i32) -> Self {
        Self {
            starting_block,
            ..Self::UNUSED
        }
    }

    pub fn is_used(&self) -> bool {
        self.starting_block != UNUSED_EXTENT
    }

    /// True once every block of the extent is committed
    pub fn is_full(&self) -> bool {
        self.bitmap == FULL_BITMAP
    }

    pub fn is_bit_set(&self, bit: usize) -> bool {
        bit < BLOCKS_PER_EXTENT && (self.bitmap as u64) & (1u64 << bit) != 0
    }

    pub fn set_bit(&mut self, bit: usize) {
        if bit < BLOCKS_PER_EXTENT {
            self.bitmap = ((self.bitmap as u64) | (1u64 << bit)) as i64;
        }
    }

    pub fn clear_bit(&mut self, bit: usize) {
        if bit < BLOCKS_PER_EXTENT {
            self.bitmap = ((self.bitmap as u64) & !(1u64 << bit)) as i64;
        }
    }

    /// Absolute data block number of bit `bit`; `None` when it does not fit an `i32`
    pub fn block_for_bit(&self, bit: usize) -> Option<i32> {
        i32::try_from(bit).ok().and_then(|bit| self.starting_block.checked_add(bit))
    }

    /// True when every block this extent covers has a non-negative `i32` number
    pub fn is_addressable(&self) -> bool {
        self.starting_block >= 0 && self.block_for_bit(BLOCKS_PER_EXTENT - 1).is_some()
    }

    /// Absolute data block numbers of every set bit that can be addressed
    pub fn present_blocks(&self) -> impl Iterator<Item = i32> + '_ {
        (0..BLOCKS_PER_EXTENT)
            .filter(move |&bit| self.is_bit_set(bit))
            .filter_map(move |bit| self.block_for_bit(bit))
    }

    /// Earliest sample time as an offset from the block's reference day
    pub fn earliest_offset_millis(&self) -> i64 {
        self.earliest_time as i64 * TIME_QUANTUM_MILLIS
    }

    /// Latest sample time as an offset from the block's reference day
    pub fn latest_offset_millis(&self) -> i64 {
        self.latest_time as i64 * TIME_QUANTUM_MILLIS
    }

    /// Quantize a millisecond offset into the 16-bit on-disk unit, clamping
    /// anything outside the representable range.
    pub fn quantize_offset_millis(millis: i64) -> i16 {
        (millis / TIME_QUANTUM_MILLIS).clamp(i16::MIN as i64, i16::MAX as i64) as i16
    }
}

/// First extent where one block has committed bits the other lacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtentDiff {
    pub extent: usize,
    pub starting_block: i32,
    /// Absolute data block numbers, at most [`BLOCKS_PER_EXTENT`] of them
    pub missing_blocks: Vec<i32>,
}

/// In-memory form of one index block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBlock {
    block_number: i32,
    pub seed_name: SeedName,
    pub next_index: i32,
    pub update_time: i32,
    pub extents: [Extent; MAX_EXTENTS],
    reserved: [u8; RESERVED_LEN],
}

impl Default for IndexBlock {
    fn default() -> Self {
        Self {
            block_number: -1,
            seed_name: SeedName::default(),
            next_index: -1,
            update_time: 0,
            extents: [Extent::UNUSED; MAX_EXTENTS],
            reserved: [0; RESERVED_LEN],
        }
    }
}

impl IndexBlock {
    /// An empty chain-tail block for `seed_name` at `block_number`
    pub fn new(seed_name: SeedName, block_number: i32) -> Self {
        Self {
            block_number,
            seed_name,
            ..Default::default()
        }
    }

    /// Decode a block image, rejecting it if the seedname is not canonical
    pub fn load(buffer: &[u8; BLOCK_SIZE], block_number: i32) -> Result<Self, IndexError> {
        let mut buf = &buffer[..];
        let mut name = [0u8; SEED_NAME_LEN];
        buf.copy_to_slice(&mut name);
        let seed_name = SeedName::from_bytes(name);
        seed_name.validate(block_number)?;

        let next_index = buf.get_i32();
        let update_time = buf.get_i32();
        let mut extents = [Extent::UNUSED; MAX_EXTENTS];
        for extent in extents.iter_mut() {
            extent.starting_block = buf.get_i32();
            extent.bitmap = buf.get_i64();
            extent.earliest_time = buf.get_i16();
            extent.latest_time = buf.get_i16();
        }
        let mut reserved = [0u8; RESERVED_LEN];
        buf.copy_to_slice(&mut reserved);

        Ok(Self {
            block_number,
            seed_name,
            next_index,
            update_time,
            extents,
            reserved,
        })
    }

    /// Re-parse into this instance; on failure `self` is left untouched
    pub fn load_into(&mut self, buffer: &[u8; BLOCK_SIZE], block_number: i32) -> Result<(), IndexError> {
        *self = Self::load(buffer, block_number)?;
        Ok(())
    }

    /// Encode into a block image, the exact inverse of [`IndexBlock::load`]
    pub fn serialize(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        let mut out = &mut block[..];
        out.put_slice(self.seed_name.as_bytes());
        out.put_i32(self.next_index);
        out.put_i32(self.update_time);
        for extent in &self.extents {
            out.put_i32(extent.starting_block);
            out.put_i64(extent.bitmap);
            out.put_i16(extent.earliest_time);
            out.put_i16(extent.latest_time);
        }
        out.put_slice(&self.reserved);
        block
    }

    /// Physically reset the record so it can be reused
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn block_number(&self) -> i32 {
        self.block_number
    }

    pub fn set_block_number(&mut self, block_number: i32) {
        self.block_number = block_number;
    }

    /// Seedname is canonical and the block number lies in `0..=max_block_number`
    pub fn is_valid(&self, max_block_number: i32) -> bool {
        self.seed_name.is_valid() && self.block_number >= 0 && self.block_number <= max_block_number
    }

    /// True when this block ends its chain
    pub fn is_chain_tail(&self) -> bool {
        self.next_index < 0
    }

    pub fn used_extent_count(&self) -> usize {
        self.extents.iter().take_while(|extent| extent.is_used()).count()
    }

    /// Position of the last used extent
    pub fn tail_extent_index(&self) -> Option<usize> {
        self.used_extent_count().checked_sub(1)
    }

    /// True when extent `i` may still be filling: this block ends the chain
    /// and no used extent follows `i`.
    pub fn is_tail_extent(&self, i: usize) -> bool {
        self.is_chain_tail() && self.extents.get(i + 1).map_or(true, |next| !next.is_used())
    }

    /// Check the extent invariants: used extents are dense and every closed
    /// extent is full. Returns the offending extent position.
    pub fn check_extents(&self) -> Result<(), usize> {
        let used = self.used_extent_count();
        if let Some(stray) = self.extents[used..].iter().position(Extent::is_used) {
            return Err(used + stray);
        }
        for (i, extent) in self.extents[..used].iter().enumerate() {
            let is_open_tail = self.is_chain_tail() && i + 1 == used;
            if !is_open_tail && !extent.is_full() {
                return Err(i);
            }
        }
        Ok(())
    }

    /// Equality used by the idx/chk audit
    ///
    /// Seednames and every extent's starting block and bitmap must match,
    /// except that the tail extent of a chain-tail block tolerates `other`
    /// holding a strict subset of this block's bits.
    pub fn compare_equal(&self, other: &IndexBlock) -> bool {
        if self.seed_name != other.seed_name {
            return false;
        }
        self.extents.iter().zip(other.extents.iter()).enumerate().all(|(i, (ours, theirs))| {
            if ours.starting_block != theirs.starting_block {
                return false;
            }
            if ours.bitmap == theirs.bitmap {
                return true;
            }
            ours.is_used() && self.is_tail_extent(i) && (theirs.bitmap as u64) & !(ours.bitmap as u64) == 0
        })
    }

    /// Strict equality: same layout and every used extent full in both blocks
    pub fn compare_complete(&self, other: &IndexBlock) -> bool {
        self.seed_name == other.seed_name
            && self.extents.iter().zip(other.extents.iter()).all(|(ours, theirs)| {
                ours.starting_block == theirs.starting_block
                    && (!ours.is_used() || (ours.is_full() && theirs.is_full()))
            })
    }

    /// Set a bit in `presence` for every committed data block of this block
    /// below `limit`; `presence` never grows past `limit` bits
    pub fn union_presence_into(&self, presence: &mut FixedBitSet, limit: usize) {
        for extent in self.extents.iter().filter(|extent| extent.is_used()) {
            for block in extent.present_blocks().filter_map(|block| usize::try_from(block).ok()) {
                if block >= limit {
                    continue;
                }
                if block >= presence.len() {
                    presence.grow(block + 1);
                }
                presence.insert(block);
            }
        }
    }

    /// First extent where this block has bits set that `other` lacks
    ///
    /// Unlike [`IndexBlock::compare_equal`] there is no tail tolerance; an
    /// extent whose starting block differs in `other` counts as entirely
    /// missing there.
    pub fn diff_against(&self, other: &IndexBlock) -> Option<ExtentDiff> {
        self.extents.iter().enumerate().find_map(|(i, ours)| {
            if !ours.is_used() {
                return None;
            }
            let theirs = &other.extents[i];
            let their_bits = if theirs.starting_block == ours.starting_block {
                theirs.bitmap as u64
            } else {
                0
            };
            let missing = (ours.bitmap as u64) & !their_bits;
            if missing == 0 {
                return None;
            }
            let missing_blocks = (0..BLOCKS_PER_EXTENT)
                .filter(|&bit| missing & (1u64 << bit) != 0)
                .filter_map(|bit| ours.block_for_bit(bit))
                .collect();
            Some(ExtentDiff {
                extent: i,
                starting_block: ours.starting_block,
                missing_blocks,
            })
        })
    }

    /// Fraction of this block's used extents whose starting block matches
    /// `other` at the same position; `None` when this block has no extents.
    pub fn starting_block_agreement(&self, other: &IndexBlock) -> Option<f64> {
        let used: Vec<usize> = (0..MAX_EXTENTS).filter(|&i| self.extents[i].is_used()).collect();
        if used.is_empty() {
            return None;
        }
        let agreeing = used
            .iter()
            .filter(|&&i| self.extents[i].starting_block == other.extents[i].starting_block)
            .count();
        Some(agreeing as f64 / used.len() as f64)
    }
}

impl Display for IndexBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "blk={} {} next={} extents={}",
            self.block_number,
            self.seed_name,
            self.next_index,
            self.used_extent_count()
        )
    }
}
