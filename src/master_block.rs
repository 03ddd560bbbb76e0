//! Master blocks map channel seednames to the head of their index chain
//!
//! Master blocks are independent disk blocks referenced only through the
//! control block; they are not chained to one another.

use crate::constants::{BLOCK_SIZE, MAX_CHANNELS, SEED_NAME_LEN};
use crate::seed_name::SeedName;
use bytes::{Buf, BufMut};

/// One `(seedname, firstIndexBlock)` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelSlot {
    pub seed_name: SeedName,
    pub first_index_block: i32,
}

impl ChannelSlot {
    /// A slot is in use when it names a channel and points at a chain head
    pub fn is_used(&self) -> bool {
        !self.seed_name.is_blank() && self.first_index_block > 0
    }
}

/// Decoded master block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterBlock {
    block_number: i32,
    slots: [ChannelSlot; MAX_CHANNELS],
}

impl MasterBlock {
    /// An empty master block destined for `block_number`
    pub fn new(block_number: i32) -> Self {
        Self {
            block_number,
            slots: [ChannelSlot::default(); MAX_CHANNELS],
        }
    }

    pub fn decode(block: &[u8; BLOCK_SIZE], block_number: i32) -> Self {
        let mut buf = &block[..];
        let mut slots = [ChannelSlot::default(); MAX_CHANNELS];
        for slot in slots.iter_mut() {
            let mut name = [0u8; SEED_NAME_LEN];
            buf.copy_to_slice(&mut name);
            slot.seed_name = SeedName::from_bytes(name);
            slot.first_index_block = buf.get_i32();
        }
        Self { block_number, slots }
    }

    pub fn encode(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        let mut out = &mut block[..];
        for slot in &self.slots {
            out.put_slice(slot.seed_name.as_bytes());
            out.put_i32(slot.first_index_block);
        }
        block
    }

    pub fn block_number(&self) -> i32 {
        self.block_number
    }

    /// Every slot, used or not, in on-disk order
    pub fn slots(&self) -> &[ChannelSlot; MAX_CHANNELS] {
        &self.slots
    }

    /// Used slots with their slot position
    pub fn channels(&self) -> impl Iterator<Item = (usize, &ChannelSlot)> {
        self.slots.iter().enumerate().filter(|(_, slot)| slot.is_used())
    }

    /// Store a channel in the first unused slot, returning its position
    pub fn add_channel(&mut self, seed_name: SeedName, first_index_block: i32) -> Option<usize> {
        let position = self.slots.iter().position(|slot| !slot.is_used())?;
        self.slots[position] = ChannelSlot {
            seed_name,
            first_index_block,
        };
        Some(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let mut master = MasterBlock::new(5);
        let seed = SeedName::parse("NTBOU  BHZ").unwrap();
        assert_eq!(master.add_channel(seed, 10), Some(0));
        let image = master.encode();
        assert_eq!(&image[0..12], b"NTBOU  BHZ  ");
        assert_eq!(&image[12..16], &10i32.to_be_bytes());

        let decoded = MasterBlock::decode(&image, 5);
        assert_eq!(decoded, master);
        let channels: Vec<_> = decoded.channels().collect();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].1.first_index_block, 10);
    }

    #[test]
    fn test_full_master_block_rejects_channel() {
        let mut master = MasterBlock::new(1);
        let seed = SeedName::parse("NTBOU  BHZ").unwrap();
        for i in 0..MAX_CHANNELS {
            assert_eq!(master.add_channel(seed, 2 + i as i32), Some(i));
        }
        assert_eq!(master.add_channel(seed, 99), None);
    }

    #[test]
    fn test_blank_slots_are_unused() {
        let master = MasterBlock::decode(&[0u8; BLOCK_SIZE], 3);
        assert_eq!(master.channels().count(), 0);
    }
}
