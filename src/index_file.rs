//! Whole-file view of an index file
//!
//! [`IndexFile`] loads the control block, the master blocks and every index
//! block of one `.idx` or `.chk` file, keeping parsed blocks in a slot array
//! addressed by block number. Blocks that fail validation are remembered as
//! absent instead of aborting the load. The loaded view backs the presence
//! bitset and the read-only idx/chk audits; reconciliation writes modified
//! blocks back through [`IndexFile::write_block`].

use crate::audit::{IndexBlockAudit, MasterBlockAudit, Mismatch, MismatchKind};
use crate::block_store::{BlockStore, FileBlockStore};
use crate::chain::{ChainStep, ChainWalker};
use crate::constants::{extensions, BLOCK_SIZE};
use crate::control_block::ControlBlock;
use crate::error::IndexError;
use crate::index_block::IndexBlock;
use crate::master_block::{ChannelSlot, MasterBlock};
use crate::Result;
use fixedbitset::FixedBitSet;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Role of an index file within a triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexFileKind {
    /// `.idx`: authoritative chain pointers and control block
    Primary,
    /// `.chk`: same block numbering, chain pointers not trusted
    Shadow,
}

impl IndexFileKind {
    /// Decide the kind from the file extension; anything but `.chk` is primary
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext == extensions::CHECK => Self::Shadow,
            _ => Self::Primary,
        }
    }
}

/// Loaded index file
pub struct IndexFile {
    path: PathBuf,
    kind: IndexFileKind,
    store: Box<dyn BlockStore>,
    control: ControlBlock,
    masters: Vec<MasterBlock>,
    blocks: Vec<Option<IndexBlock>>,
    absent: Vec<i32>,
}

impl fmt::Debug for IndexFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexFile")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("masters", &self.masters.len())
            .field("blocks", &self.blocks.len())
            .field("absent", &self.absent.len())
            .finish()
    }
}

impl IndexFile {
    /// Open and load a file from disk
    pub fn open<P: AsRef<Path>>(path: P, read_only: bool) -> Result<Self> {
        let path = path.as_ref();
        let store = FileBlockStore::open(path, read_only)?;
        Self::from_store(path, IndexFileKind::from_path(path), Box::new(store))
    }

    /// Load from any block store; `path` is used for reporting only
    pub fn from_store<P: AsRef<Path>>(path: P, kind: IndexFileKind, store: Box<dyn BlockStore>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let block_count = store.block_count()?;
        if block_count == 0 {
            return Err(IndexError::control_block_unreadable(&path, "file is shorter than one block"));
        }

        let mut buf = [0u8; BLOCK_SIZE];
        store
            .read_block(0, &mut buf)
            .map_err(|e| IndexError::control_block_unreadable(&path, e.to_string()))?;
        let control = ControlBlock::decode(&buf);

        let master_numbers = match (control.validate(), kind) {
            (Ok(()), _) => control.master_block_numbers(),
            (Err(e), IndexFileKind::Primary) => {
                return Err(IndexError::control_block_unreadable(&path, e.to_string()));
            }
            (Err(e), IndexFileKind::Shadow) => {
                warn!("Ignoring master blocks of {}: {}", path.display(), e);
                Vec::new()
            }
        };

        let mut masters = Vec::with_capacity(master_numbers.len());
        for &number in &master_numbers {
            if number as u64 >= block_count {
                return Err(IndexError::control_block_unreadable(
                    &path,
                    format!("master block {} lies past the end of the file", number),
                ));
            }
            store.read_block(number as u64, &mut buf)?;
            masters.push(MasterBlock::decode(&buf, number));
        }

        // The shadow's control block is not authoritative, so every block is scanned.
        let scan_end = match kind {
            IndexFileKind::Primary => (control.next_index_block as u64).min(block_count),
            IndexFileKind::Shadow => block_count,
        };
        if kind == IndexFileKind::Primary && (control.next_index_block as u64) > block_count {
            warn!(
                "{} is truncated: nextIndexBlock is {} but only {} blocks exist",
                path.display(),
                control.next_index_block,
                block_count
            );
        }

        let mut blocks: Vec<Option<IndexBlock>> = vec![None; scan_end as usize];
        let mut absent = Vec::new();
        for number in 1..scan_end {
            let number = number as i32;
            if master_numbers.contains(&number) {
                continue;
            }
            store.read_block(number as u64, &mut buf)?;
            match IndexBlock::load(&buf, number) {
                Ok(block) => blocks[number as usize] = Some(block),
                Err(e) => {
                    if buf.iter().all(|&b| b == 0) {
                        debug!("Block {} of {} was never written", number, path.display());
                    } else {
                        warn!("Skipping block {} of {}: {}", number, path.display(), e);
                    }
                    absent.push(number);
                }
            }
        }

        info!(
            "Loaded {} ({:?}): {} master blocks, {} index blocks, {} absent",
            path.display(),
            kind,
            masters.len(),
            blocks.iter().filter(|block| block.is_some()).count(),
            absent.len()
        );

        Ok(Self {
            path,
            kind,
            store,
            control,
            masters,
            blocks,
            absent,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> IndexFileKind {
        self.kind
    }

    pub fn control(&self) -> &ControlBlock {
        &self.control
    }

    pub fn master_block_numbers(&self) -> Vec<i32> {
        self.masters.iter().map(MasterBlock::block_number).collect()
    }

    pub fn master_block(&self, number: i32) -> Option<&MasterBlock> {
        self.masters.iter().find(|master| master.block_number() == number)
    }

    /// Used channel slots in master block, then slot, order
    pub fn channels(&self) -> Vec<ChannelSlot> {
        self.masters
            .iter()
            .flat_map(|master| master.channels().map(|(_, slot)| *slot))
            .collect()
    }

    /// Parsed index block `number`, if it loaded cleanly
    pub fn block(&self, number: i32) -> Option<&IndexBlock> {
        usize::try_from(number)
            .ok()
            .and_then(|n| self.blocks.get(n))
            .and_then(Option::as_ref)
    }

    /// Block numbers that failed validation during the load
    pub fn absent_blocks(&self) -> &[i32] {
        &self.absent
    }

    /// Number of block positions scanned, block 0 included
    pub fn block_capacity(&self) -> usize {
        self.blocks.len()
    }

    /// Highest block number a chain may legitimately point at
    pub fn max_block_number(&self) -> i32 {
        self.blocks.len() as i32 - 1
    }

    /// Raw image of block `number`, or `None` past the end of the file
    pub fn read_raw(&self, number: i32) -> Result<Option<[u8; BLOCK_SIZE]>> {
        if number < 0 || number as u64 >= self.store.block_count()? {
            return Ok(None);
        }
        let mut buf = [0u8; BLOCK_SIZE];
        self.store.read_block(number as u64, &mut buf)?;
        Ok(Some(buf))
    }

    /// Write `block` at its own block number and refresh the loaded view
    pub fn write_block(&mut self, block: &IndexBlock) -> Result<()> {
        let number = block.block_number();
        let index = usize::try_from(number)
            .map_err(|_| IndexError::malformed(number, "cannot write a block with a negative number"))?;
        if number == 0 || self.master_block(number).is_some() {
            return Err(IndexError::malformed(number, "refusing to overwrite a control or master block"));
        }
        self.store.write_block(number as u64, &block.serialize())?;
        if index >= self.blocks.len() {
            self.blocks.resize(index + 1, None);
        }
        self.blocks[index] = Some(block.clone());
        self.absent.retain(|&n| n != number);
        Ok(())
    }

    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    /// Every data block committed by any channel, following each chain
    pub fn presence_bitset(&self) -> FixedBitSet {
        self.presence_bitset_within(usize::MAX)
    }

    /// [`IndexFile::presence_bitset`] restricted to data blocks below
    /// `data_block_count`, normally the length of the data file
    pub fn presence_bitset_within(&self, data_block_count: usize) -> FixedBitSet {
        let mut presence = FixedBitSet::new();
        for slot in self.channels() {
            let mut walker = ChainWalker::new(slot.seed_name, slot.first_index_block, self.max_block_number())
                .with_reserved(self.master_block_numbers());
            while let Some(step) = walker.next_step() {
                let ChainStep::Block(number) = step else {
                    break;
                };
                match self.block(number) {
                    Some(block) => {
                        block.union_presence_into(&mut presence, data_block_count);
                        walker.advance(block.next_index);
                    }
                    None => {
                        warn!("Chain for {} reaches absent block {}", slot.seed_name, number);
                        walker.stop();
                    }
                }
            }
        }
        presence
    }

    /// Compare master block tables; never mutates either file
    pub fn compare_master_blocks(&self, other: &IndexFile) -> MasterBlockAudit {
        let ours = self.master_block_numbers();
        let theirs = other.master_block_numbers();
        let mut audit = MasterBlockAudit {
            only_in_self: ours.iter().copied().filter(|n| !theirs.contains(n)).collect(),
            only_in_other: theirs.iter().copied().filter(|n| !ours.contains(n)).collect(),
            ..Default::default()
        };
        for &number in &audit.only_in_self {
            audit.mismatches.push(
                Mismatch::new(MismatchKind::MasterOnlyInSelf, format!("listed only in {}", self.label())).block(number),
            );
        }
        for &number in &audit.only_in_other {
            audit.mismatches.push(
                Mismatch::new(MismatchKind::MasterOnlyInOther, format!("listed only in {}", other.label())).block(number),
            );
        }

        for master in &self.masters {
            let Some(counterpart) = other.master_block(master.block_number()) else {
                continue;
            };
            for (i, (a, b)) in master.slots().iter().zip(counterpart.slots().iter()).enumerate() {
                if !a.is_used() && !b.is_used() {
                    continue;
                }
                audit.slots_checked += 1;
                if a.seed_name != b.seed_name {
                    audit.mismatches.push(
                        Mismatch::new(
                            MismatchKind::MasterSlotName,
                            format!("slot {}: {} has {}, {} has {}", i, self.label(), a.seed_name, other.label(), b.seed_name),
                        )
                        .block(master.block_number()),
                    );
                }
            }
        }
        audit
    }

    /// Walk every channel chain of this file alongside `other`
    ///
    /// When `other` is a shadow file its own pointers are ignored and the
    /// block numbers come from this file's chain. `detailed` adds the first
    /// diverging extent to each mismatch.
    pub fn compare_index_blocks(&self, other: &IndexFile, detailed: bool) -> IndexBlockAudit {
        let mut audit = IndexBlockAudit::default();
        let other_channels = other.channels();

        for slot in self.channels() {
            audit.channels += 1;
            let channel = slot.seed_name;
            let mut walker = ChainWalker::new(channel, slot.first_index_block, self.max_block_number())
                .with_reserved(self.master_block_numbers());
            let mut other_next = other_channels
                .iter()
                .find(|candidate| candidate.seed_name == channel)
                .map_or(slot.first_index_block, |candidate| candidate.first_index_block);

            while let Some(step) = walker.next_step() {
                let number = match step {
                    ChainStep::Block(number) => number,
                    ChainStep::Cycle(number) => {
                        audit.mismatches.push(
                            Mismatch::new(MismatchKind::ChainCycle, "chain revisits this block")
                                .channel(channel)
                                .block(number),
                        );
                        break;
                    }
                    ChainStep::OutOfRange(number) => {
                        audit.mismatches.push(
                            Mismatch::new(MismatchKind::ChainOutOfRange, "chain points outside the index area")
                                .channel(channel)
                                .block(number),
                        );
                        break;
                    }
                    ChainStep::Reserved(number) => {
                        audit.mismatches.push(
                            Mismatch::new(MismatchKind::ChainIntoMaster, "chain points at a master block")
                                .channel(channel)
                                .block(number),
                        );
                        break;
                    }
                };
                audit.checked += 1;

                let Some(ours) = self.block(number) else {
                    audit.mismatches.push(
                        Mismatch::new(MismatchKind::MalformedIndex, format!("absent in {}", self.label()))
                            .channel(channel)
                            .block(number),
                    );
                    break;
                };

                let their_number = match other.kind {
                    IndexFileKind::Shadow => number,
                    IndexFileKind::Primary => other_next,
                };
                if their_number != number {
                    audit.mismatches.push(
                        Mismatch::new(
                            MismatchKind::ChainDivergence,
                            format!("{} continues at block {} instead", other.label(), their_number),
                        )
                        .channel(channel)
                        .block(number),
                    );
                    break;
                }

                match other.block(number) {
                    None => {
                        audit.mismatches.push(
                            Mismatch::new(MismatchKind::MissingBlock, format!("absent in {}", other.label()))
                                .channel(channel)
                                .block(number),
                        );
                        if other.kind == IndexFileKind::Primary {
                            break;
                        }
                    }
                    Some(theirs) if ours.compare_equal(theirs) => {
                        audit.ok += 1;
                        other_next = theirs.next_index;
                    }
                    Some(theirs) => {
                        let description = if detailed {
                            describe_difference(ours, theirs)
                        } else {
                            "index blocks differ".to_string()
                        };
                        audit.mismatches.push(
                            Mismatch::new(MismatchKind::BlockMismatch, description)
                                .channel(channel)
                                .block(number),
                        );
                        other_next = theirs.next_index;
                    }
                }
                walker.advance(ours.next_index);
            }
        }
        audit
    }

    fn label(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |name| name.to_string_lossy().into_owned())
    }
}

fn describe_difference(ours: &IndexBlock, theirs: &IndexBlock) -> String {
    if ours.seed_name != theirs.seed_name {
        return format!("seedname {} vs {}", ours.seed_name, theirs.seed_name);
    }
    if let Some(diff) = ours.diff_against(theirs) {
        return format!(
            "extent {} (start {}) missing {} blocks: {:?}",
            diff.extent,
            diff.starting_block,
            diff.missing_blocks.len(),
            diff.missing_blocks
        );
    }
    if let Some(diff) = theirs.diff_against(ours) {
        return format!(
            "extent {} (start {}) has {} extra blocks: {:?}",
            diff.extent,
            diff.starting_block,
            diff.missing_blocks.len(),
            diff.missing_blocks
        );
    }
    "index blocks differ".to_string()
}
