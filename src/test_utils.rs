//! Test utilities for waveform index testing
//!
//! [`TestEnvironment`] gives each test its own temporary directory and
//! [`TripleBuilder`] writes synthetic idx/chk/data triples into it.

use crate::block_store::{BlockStore, FileBlockStore};
use crate::constants::BLOCK_SIZE;
use crate::control_block::ControlBlock;
use crate::data_block::{JulianDay, MiniSeedHeader};
use crate::index_block::{Extent, IndexBlock};
use crate::layout::FileTriple;
use crate::master_block::MasterBlock;
use crate::seed_name::SeedName;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// RAII-based test environment for isolated testing
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub test_name: String,
}

impl TestEnvironment {
    /// Create a new test environment with the given test name
    ///
    /// # Panics
    /// Panics if unable to create temporary directory
    pub fn new(test_name: &str) -> Self {
        let temp_dir = TempDir::new()
            .unwrap_or_else(|e| panic!("Failed to create temp dir for test {}: {}", test_name, e));

        Self {
            temp_dir,
            test_name: test_name.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Builder for a triple named `stub` inside this environment
    pub fn triple(&self, stub: &str) -> TripleBuilder {
        TripleBuilder::new(self.path().join(stub))
    }
}

/// Canonical test channel `NTBOU  BHZ  `
pub fn bhz() -> SeedName {
    SeedName::parse("NTBOU  BHZ").unwrap()
}

/// One extent starting at `start` with the given bitmap
pub fn extent(start: i32, bitmap: i64) -> Extent {
    Extent {
        bitmap,
        ..Extent::starting_at(start)
    }
}

/// Writes a synthetic triple: master block 1 lists the channels, index
/// blocks are written to both files unless overridden per file.
pub struct TripleBuilder {
    stub: PathBuf,
    day: JulianDay,
    channels: Vec<(SeedName, i32)>,
    idx_blocks: BTreeMap<i32, [u8; BLOCK_SIZE]>,
    chk_blocks: BTreeMap<i32, [u8; BLOCK_SIZE]>,
    data_blocks: BTreeMap<i32, [u8; BLOCK_SIZE]>,
}

impl TripleBuilder {
    pub fn new(stub: PathBuf) -> Self {
        let day = stub
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(JulianDay::from_stub)
            .unwrap_or(JulianDay::new(2024, 123));
        Self {
            stub,
            day,
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

    /// Same index block in idx and chk
    pub fn both(self, block: IndexBlock) -> Self {
        let raw = block.serialize();
        self.idx_raw(block.block_number(), raw).chk_raw(block.block_number(), raw)
    }

    pub fn idx(self, block: IndexBlock) -> Self {
        let number = block.block_number();
        self.idx_raw(number, block.serialize())
    }

    pub fn chk(self, block: IndexBlock) -> Self {
        let number = block.block_number();
        self.chk_raw(number, block.serialize())
    }

    pub fn idx_raw(mut self, number: i32, raw: [u8; BLOCK_SIZE]) -> Self {
        self.idx_blocks.insert(number, raw);
        self
    }

    pub fn chk_raw(mut self, number: i32, raw: [u8; BLOCK_SIZE]) -> Self {
        self.chk_blocks.insert(number, raw);
        self
    }

    /// A record for `seed_name` on the triple's day at data block `number`
    pub fn record(mut self, number: i32, seed_name: SeedName) -> Self {
        let header = MiniSeedHeader::new(seed_name, self.day, number as u32);
        self.data_blocks.insert(number, header.encode());
        self
    }

    /// Records for `seed_name` at every number in `numbers`
    pub fn records(self, numbers: impl IntoIterator<Item = i32>, seed_name: SeedName) -> Self {
        numbers
            .into_iter()
            .fold(self, |builder, number| builder.record(number, seed_name))
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
