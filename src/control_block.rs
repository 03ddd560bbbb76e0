//! Block 0 of an index file
//!
//! The control block records the allocation cursors for data extents and
//! index blocks, plus the table of master block numbers. The table is dense:
//! the first zero slot ends the allocated set.

use crate::constants::{layout, BLOCK_SIZE, MAX_MASTER_BLOCKS};
use crate::error::IndexError;
use bytes::{Buf, BufMut};

/// Decoded control block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlBlock {
    /// File length recorded by the writer, in blocks
    pub length: i32,
    /// First data block of the next extent to be allocated
    pub next_extent: i32,
    /// Next free block number in the index file
    pub next_index_block: i16,
    master_slots: [i16; MAX_MASTER_BLOCKS],
    reserved: [u8; BLOCK_SIZE - layout::CONTROL_USED],
}

impl Default for ControlBlock {
    fn default() -> Self {
        Self {
            length: 0,
            next_extent: 0,
            next_index_block: 1,
            master_slots: [0; MAX_MASTER_BLOCKS],
            reserved: [0; BLOCK_SIZE - layout::CONTROL_USED],
        }
    }
}

impl ControlBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode block 0
    pub fn decode(block: &[u8; BLOCK_SIZE]) -> Self {
        let mut buf = &block[..];
        let length = buf.get_i32();
        let next_extent = buf.get_i32();
        let next_index_block = buf.get_i16();
        let mut master_slots = [0i16; MAX_MASTER_BLOCKS];
        for slot in master_slots.iter_mut() {
            *slot = buf.get_i16();
        }
        let mut reserved = [0u8; BLOCK_SIZE - layout::CONTROL_USED];
        buf.copy_to_slice(&mut reserved);

        Self {
            length,
            next_extent,
            next_index_block,
            master_slots,
            reserved,
        }
    }

    /// Encode into a fresh block image
    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        let mut out = &mut block[..];
        out.put_i32(self.length);
        out.put_i32(self.next_extent);
        out.put_i16(self.next_index_block);
        for &slot in &self.master_slots {
            out.put_i16(slot);
        }
        out.put_slice(&self.reserved);
        block
    }

    /// Master block numbers up to the first zero slot
    pub fn master_block_numbers(&self) -> Vec<i32> {
        self.master_slots
            .iter()
            .take_while(|&&slot| slot != 0)
            .map(|&slot| slot as i32)
            .collect()
    }

    /// Check the allocated master slots before trusting them
    ///
    /// Every allocated slot must point inside the index area and no number
    /// may repeat; otherwise the master-block list is considered truncated.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.next_index_block < 1 {
            return Err(IndexError::malformed(
                0,
                format!("nextIndexBlock {} is below 1", self.next_index_block),
            ));
        }
        let numbers = self.master_block_numbers();
        for (i, &number) in numbers.iter().enumerate() {
            if number < 1 || number >= self.next_index_block as i32 {
                return Err(IndexError::malformed(
                    0,
                    format!(
                        "master slot {} points at block {} outside 1..{}",
                        i, number, self.next_index_block
                    ),
                ));
            }
            if numbers[..i].contains(&number) {
                return Err(IndexError::malformed(0, format!("master block {} listed twice", number)));
            }
        }
        Ok(())
    }

    /// Append a master block number to the first free slot
    pub fn add_master_block(&mut self, block: i16) -> Result<(), IndexError> {
        let position = self
            .master_slots
            .iter()
            .position(|&slot| slot == 0)
            .ok_or_else(|| IndexError::malformed(0, "master block table is full"))?;
        self.master_slots[position] = block;
        Ok(())
    }
}
