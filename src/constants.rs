//! Central constants for the waveform index file format
//!
//! This module is the single source of truth for the disk geometry shared by
//! the control block, master blocks, index blocks and raw data blocks.

/// Size of every addressable unit in the idx, chk and data files
pub const BLOCK_SIZE: usize = 512;

/// Number of master-block slots carried by the control block
pub const MAX_MASTER_BLOCKS: usize = 250;

/// Number of channel slots in one master block
pub const MAX_CHANNELS: usize = 32;

/// Number of extents described by one index block
pub const MAX_EXTENTS: usize = 30;

/// Number of contiguous data blocks tracked by one extent bitmap
pub const BLOCKS_PER_EXTENT: usize = 64;

/// Bitmap value of an extent whose every block is committed
pub const FULL_BITMAP: i64 = -1;

/// `startingBlock` value of an unused extent slot
pub const UNUSED_EXTENT: i32 = -1;

/// Length of a fixed-format channel name
pub const SEED_NAME_LEN: usize = 12;

/// Seedname written into a chk block whose write never finished
pub const REQUESTED_BLOCK_NAME: &[u8; SEED_NAME_LEN] = b"REQUESTEDBLK";

/// Fraction of used extents whose starting blocks must agree before a chk
/// seedname mismatch is treated as cosmetic corruption.
pub const NAME_MATCH_THRESHOLD: f64 = 0.8;

/// Unit of the 16-bit quantized extent time offsets
pub const TIME_QUANTUM_MILLIS: i64 = 3000;

/// Byte layout of the three block kinds
pub mod layout {
    use super::*;

    pub mod control {
        pub const LENGTH: usize = 0;
        pub const NEXT_EXTENT: usize = 4;
        pub const NEXT_INDEX_BLOCK: usize = 8;
        pub const MASTER_SLOTS: usize = 10;
    }

    pub mod master {
        use super::*;

        pub const SLOT_SIZE: usize = SEED_NAME_LEN + 4;
    }

    pub mod index {
        use super::*;

        pub const SEED_NAME: usize = 0;
        pub const NEXT_INDEX: usize = SEED_NAME_LEN;
        pub const UPDATE_TIME: usize = NEXT_INDEX + 4;
        pub const EXTENTS: usize = UPDATE_TIME + 4;
        pub const EXTENT_SIZE: usize = 4 + 8 + 2 + 2;
        pub const USED: usize = EXTENTS + MAX_EXTENTS * EXTENT_SIZE;
    }

    /// Bytes of the control block after the master slot table
    pub const CONTROL_USED: usize = control::MASTER_SLOTS + MAX_MASTER_BLOCKS * 2;
}

/// File extensions of one storage triple
pub mod extensions {
    pub const INDEX: &str = "idx";
    pub const CHECK: &str = "chk";
    pub const DATA: &str = "ms";
}
