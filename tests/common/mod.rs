//! Common test utilities for integration tests
//!
//! Integration tests cannot reach the crate's `test_utils` module, so the
//! triple builder is repeated here on top of the public API, with the same
//! method names.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use tempfile::TempDir;
use waveform_index::constants::BLOCK_SIZE;
use waveform_index::{
    BlockStore, ControlBlock, Extent, FileBlockStore, FileTriple, IndexBlock, JulianDay, MasterBlock,
    MiniSeedHeader, SeedName,
};

pub mod test_error_messages {
    pub const FAILED_TO_CREATE_TEMP_DIR: &str = "Failed to create test temporary directory";
}

/// Creates a temporary directory for test use with proper error handling
pub fn create_temp_dir_for_test() -> TempDir {
    TempDir::new().expect(test_error_messages::FAILED_TO_CREATE_TEMP_DIR)
}

pub fn bhz() -> SeedName {
    SeedName::parse("NTBOU  BHZ").unwrap()
}

pub fn bhn() -> SeedName {
    SeedName::parse("NTBOU  BHN").unwrap()
}

pub fn extent(start: i32, bitmap: i64) -> Extent {
    Extent {
        bitmap,
        ..Extent::starting_at(start)
    }
}

/// Index block `number` for `seed_name` holding the given extents
pub fn index_block(seed_name: SeedName, number: i32, next_index: i32, extents: &[Extent]) -> IndexBlock {
    let mut block = IndexBlock::new(seed_name, number);
    block.next_index = next_index;
    block.extents[..extents.len()].copy_from_slice(extents);
    block
}

/// Writes a synthetic triple; master block 1 lists the channels
pub struct TripleBuilder {
    stub: PathBuf,
    day: JulianDay,
    channels: Vec<(SeedName, i32)>,
    idx_blocks: BTreeMap<i32, [u8; BLOCK_SIZE]>,
    chk_blocks: BTreeMap<i32, [u8; BLOCK_SIZE]>,
    data_blocks: BTreeMap<i32, [u8; BLOCK_SIZE]>,
}

impl TripleBuilder {
    /// Builder for `<dir>/<stub>`; a `YYYY_DDD` stub sets the data day
    pub fn new(dir: &TempDir, stub: &str) -> Self {
        Self {
            stub: dir.path().join(stub),
            day: JulianDay::from_stub(stub).unwrap_or(JulianDay::new(2024, 123)),
            channels: Vec::new(),
            idx_blocks: BTreeMap::new(),
            chk_blocks: BTreeMap::new(),
            data_blocks: BTreeMap::new(),
        }
    }

    pub fn channel(mut self, seed_name: SeedName, first_index_block: i32) -> Self {
        self.channels.push((seed_name, first_index_block));
        self
    }

    /// Same block in idx and chk
    pub fn both(self, block: IndexBlock) -> Self {
        self.idx(block.clone()).chk(block)
    }

    pub fn idx(mut self, block: IndexBlock) -> Self {
        self.idx_blocks.insert(block.block_number(), block.serialize());
        self
    }

    pub fn chk(mut self, block: IndexBlock) -> Self {
        self.chk_blocks.insert(block.block_number(), block.serialize());
        self
    }

    pub fn idx_raw(mut self, number: i32, raw: [u8; BLOCK_SIZE]) -> Self {
        self.idx_blocks.insert(number, raw);
        self
    }

    pub fn chk_raw(mut self, number: i32, raw: [u8; BLOCK_SIZE]) -> Self {
        self.chk_blocks.insert(number, raw);
        self
    }

    pub fn record(mut self, number: i32, seed_name: SeedName) -> Self {
        let header = MiniSeedHeader::new(seed_name, self.day, number as u32);
        self.data_blocks.insert(number, header.encode());
        self
    }

    pub fn records(self, numbers: impl IntoIterator<Item = i32>, seed_name: SeedName) -> Self {
        numbers.into_iter().fold(self, |builder, number| builder.record(number, seed_name))
    }

    /// A record for the right channel on another day
    pub fn record_on(mut self, number: i32, seed_name: SeedName, day: JulianDay) -> Self {
        let header = MiniSeedHeader::new(seed_name, day, number as u32);
        self.data_blocks.insert(number, header.encode());
        self
    }

    pub fn build(self) -> FileTriple {
        let triple = FileTriple::from_stub(&self.stub);
        let last_index = self
            .idx_blocks
            .keys()
            .chain(self.chk_blocks.keys())
            .copied()
            .max()
            .unwrap_or(1)
            .max(1);

        let mut control = ControlBlock::new();
        control.add_master_block(1).unwrap();
        control.next_index_block = (last_index + 1) as i16;
        let mut master = MasterBlock::new(1);
        for &(seed_name, first) in &self.channels {
            master.add_channel(seed_name, first).unwrap();
        }

        for (path, blocks) in [(triple.idx_path(), &self.idx_blocks), (triple.chk_path(), &self.chk_blocks)] {
            let store = FileBlockStore::create(path).unwrap();
            store.write_block(0, &control.encode()).unwrap();
            store.write_block(1, &master.encode()).unwrap();
            for number in 2..=last_index {
                let raw = blocks.get(&number).copied().unwrap_or([0u8; BLOCK_SIZE]);
                store.write_block(number as u64, &raw).unwrap();
            }
            store.sync().unwrap();
        }

        let data = FileBlockStore::create(triple.data_path()).unwrap();
        for (&number, raw) in &self.data_blocks {
            data.write_block(number as u64, raw).unwrap();
        }
        data.sync().unwrap();
        triple
    }
}

/// Read index block `number` straight from disk
pub fn read_block(path: &std::path::Path, number: i32) -> IndexBlock {
    let store = FileBlockStore::open(path, true).unwrap();
    let mut raw = [0u8; BLOCK_SIZE];
    store.read_block(number as u64, &mut raw).unwrap();
    IndexBlock::load(&raw, number).unwrap()
}
