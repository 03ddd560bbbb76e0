//! Reconciliation of a primary index, its shadow, and the raw data
//!
//! [`RebuildCheck`] walks every channel chain of the `.idx` file and visits
//! each index block once, in five phases:
//!
//! 1. load the idx and chk blocks at the same block number through the pool
//! 2. reconcile the chk seedname against idx
//! 3. copy idx extent starting blocks into chk, except for the open tail extent
//! 4. reconcile extent bitmaps against the raw data blocks they cover
//! 5. write modified blocks back (fix mode) or only count them (dry run)
//!
//! Raw data outweighs both indices: it is the only thing that may correct the
//! idx file, and only by adding a bit for a block that holds a matching record.
//! Everything the data cannot settle is reported and left alone.

use crate::audit::{IndexBlockAudit, MasterBlockAudit, Mismatch, MismatchKind};
use crate::block_pool::{BlockHandle, IndexBlockPool};
use crate::block_store::{BlockStore, FileBlockStore};
use crate::chain::{ChainStep, ChainWalker};
use crate::config::RebuildConfig;
use crate::constants::{BLOCKS_PER_EXTENT, BLOCK_SIZE, MAX_EXTENTS};
use crate::data_block::{DataBlockDecoder, DataBlockState, JulianDay, MiniSeedHeaderDecoder};
use crate::error::IndexError;
use crate::index_block::{Extent, IndexBlock};
use crate::index_file::IndexFile;
use crate::layout::FileTriple;
use crate::master_block::ChannelSlot;
use crate::seed_name::SeedName;
use crate::Result;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildStats {
    pub channels: usize,
    pub blocks_checked: usize,
    pub blocks_ok: usize,
    /// chk bits set to agree with idx and the data
    pub bits_set: usize,
    /// chk bits cleared because the data block is empty
    pub bits_unset: usize,
    pub seedname_fixes: usize,
    /// idx bits set because the data holds a matching record
    pub bad_index_bit_fixes: usize,
    pub extent_fixes: usize,
    pub chk_resynthesized: usize,
    pub contradictions: usize,
    pub unresolved_names: usize,
    pub master_name_mismatches: usize,
    pub cycles: usize,
    pub malformed_idx: usize,
    pub idx_blocks_written: usize,
    pub chk_blocks_written: usize,
}

impl RebuildStats {
    /// Changes made (fix mode) or that would be made (dry run)
    pub fn modifications(&self) -> usize {
        self.bits_set
            + self.bits_unset
            + self.seedname_fixes
            + self.bad_index_bit_fixes
            + self.extent_fixes
            + self.chk_resynthesized
    }

    pub fn is_clean(&self) -> bool {
        self.modifications() == 0
    }
}

/// Everything a run found, in the order it was found
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub stub: PathBuf,
    pub fix: bool,
    pub expected_day: Option<JulianDay>,
    pub stats: RebuildStats,
    pub master_audit: MasterBlockAudit,
    pub index_audit: IndexBlockAudit,
    pub mismatches: Vec<Mismatch>,
}

impl RebuildReport {
    fn new(stub: PathBuf, fix: bool, expected_day: Option<JulianDay>) -> Self {
        Self {
            stub,
            fix,
            expected_day,
            stats: RebuildStats::default(),
            master_audit: MasterBlockAudit::default(),
            index_audit: IndexBlockAudit::default(),
            mismatches: Vec::new(),
        }
    }

    pub fn count(&self, kind: MismatchKind) -> usize {
        self.mismatches.iter().filter(|m| m.kind == kind).count()
    }

    /// Line-oriented text: counts first, then itemized findings
    pub fn render(&self) -> String {
        let s = &self.stats;
        let mode = if self.fix { "fix" } else { "dry run" };
        let day = self.expected_day.map_or_else(|| "any".to_string(), |day| day.to_string());
        let mut out = format!("{} ({}, day {})\n", self.stub.display(), mode, day);
        out.push_str(&format!(
            "channels={} blocks={} ok={}\n",
            s.channels, s.blocks_checked, s.blocks_ok
        ));
        out.push_str(&format!(
            "sets={} unsets={} seedname_fixes={} bad_index_bit_fixes={} extent_fixes={} chk_resynthesized={}\n",
            s.bits_set, s.bits_unset, s.seedname_fixes, s.bad_index_bit_fixes, s.extent_fixes, s.chk_resynthesized
        ));
        out.push_str(&format!(
            "contradictions={} unresolved_names={} master_name_mismatches={} cycles={} malformed_idx={}\n",
            s.contradictions, s.unresolved_names, s.master_name_mismatches, s.cycles, s.malformed_idx
        ));
        if self.fix {
            out.push_str(&format!(
                "written idx={} chk={}\n",
                s.idx_blocks_written, s.chk_blocks_written
            ));
        }
        out.push_str(&self.master_audit.render());
        out.push_str(&self.index_audit.render());
        for mismatch in &self.mismatches {
            out.push_str(&mismatch.to_string());
            out.push('\n');
        }
        out
    }
}

/// Summary of one visited (channel, block) node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutcome {
    pub block: i32,
    pub seed_name: SeedName,
    pub next_index: i32,
    pub idx_modified: bool,
    pub chk_modified: bool,
    /// Findings that need manual follow-up
    pub findings: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum NameOutcome {
    Matched,
    Adopted { from: SeedName, requested: bool },
    Unresolved { chk_name: SeedName, agreement: Option<f64> },
}

/// Make chk's seedname agree with idx when that is safe
fn reconcile_name(idx: &IndexBlock, chk: &mut IndexBlock, threshold: f64) -> NameOutcome {
    if chk.seed_name == idx.seed_name {
        return NameOutcome::Matched;
    }
    let from = chk.seed_name;
    if from.is_requested() {
        chk.seed_name = idx.seed_name;
        return NameOutcome::Adopted { from, requested: true };
    }
    match idx.starting_block_agreement(chk) {
        Some(agreement) if agreement >= threshold => {
            chk.seed_name = idx.seed_name;
            NameOutcome::Adopted { from, requested: false }
        }
        agreement => NameOutcome::Unresolved {
            chk_name: from,
            agreement,
        },
    }
}

#[derive(Debug, Clone, Copy)]
struct BitmapDiff {
    extent: usize,
    starting_block: i32,
    idx_bits: u64,
    chk_bits: u64,
}

#[derive(Debug)]
struct PairFindings {
    seed_name: SeedName,
    next_index: i32,
    name: NameOutcome,
    /// (extent, chk starting block before, idx starting block)
    extent_fixes: Vec<(usize, i32, i32)>,
    bitmap_diffs: Vec<BitmapDiff>,
}

/// What to do with one bit of a differing extent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDecision {
    NoAction,
    /// idx claims an empty block; chk's bit is cleared if it was set
    Contradiction { clear_chk: bool },
    /// idx claims a block holding something else; report only
    ForeignData,
    SetCheck,
    /// idx missed a matching record; chk is set too when it lacks the bit
    SetIndex { set_chk: bool },
}

/// Decide one bit from the two index bits and the data block state
pub fn decide_bit(idx_has: bool, chk_has: bool, state: DataBlockState) -> BitDecision {
    match (idx_has, state) {
        (true, DataBlockState::Zero) => BitDecision::Contradiction { clear_chk: chk_has },
        (true, DataBlockState::Foreign) => BitDecision::ForeignData,
        (true, DataBlockState::Matching) if !chk_has => BitDecision::SetCheck,
        (false, DataBlockState::Matching) => BitDecision::SetIndex { set_chk: !chk_has },
        _ => BitDecision::NoAction,
    }
}

#[derive(Debug, Clone, Copy)]
enum BitTarget {
    Index,
    Check,
}

#[derive(Debug, Clone, Copy)]
struct BitAction {
    target: BitTarget,
    extent: usize,
    bit: usize,
    set: bool,
}

/// Offline reconciler for one idx/chk/data triple
pub struct RebuildCheck {
    triple: FileTriple,
    config: RebuildConfig,
    decoder: Box<dyn DataBlockDecoder>,
    pool: Arc<IndexBlockPool>,
}

impl std::fmt::Debug for RebuildCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildCheck")
            .field("triple", &self.triple)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RebuildCheck {
    /// Validate `config` and prepare a run with the MiniSEED header decoder
    pub fn new(triple: FileTriple, config: RebuildConfig) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(IndexBlockPool::with_config(config.pool.clone()));
        Ok(Self {
            triple,
            config,
            decoder: Box::new(MiniSeedHeaderDecoder),
            pool,
        })
    }

    /// Classify data blocks with a different decoder
    pub fn with_decoder(mut self, decoder: impl DataBlockDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    /// Share an existing pool instead of the run's own
    pub fn with_pool(mut self, pool: Arc<IndexBlockPool>) -> Self {
        self.pool = pool;
        self
    }

    pub fn pool(&self) -> &IndexBlockPool {
        &self.pool
    }

    pub fn triple(&self) -> &FileTriple {
        &self.triple
    }

    pub fn config(&self) -> &RebuildConfig {
        &self.config
    }

    /// Open the triple and reconcile it
    ///
    /// In dry-run mode every file is opened read-only.
    pub fn run(&self) -> Result<RebuildReport> {
        self.triple.ensure_exists()?;
        let read_only = !self.config.fix;
        let mut idx = IndexFile::open(self.triple.idx_path(), read_only)?;
        let mut chk = IndexFile::open(self.triple.chk_path(), read_only)?;
        let data = FileBlockStore::open(self.triple.data_path(), true)?;
        self.reconcile(&mut idx, &mut chk, &data)
    }

    /// Reconcile already opened files
    pub fn reconcile(&self, idx: &mut IndexFile, chk: &mut IndexFile, data: &dyn BlockStore) -> Result<RebuildReport> {
        let expected_day = self.config.expected_day.or_else(|| self.triple.expected_day());
        let mut report = RebuildReport::new(self.triple.stub().to_path_buf(), self.config.fix, expected_day);
        info!(
            "Reconciling {} ({}), expected day {:?}",
            self.triple.stub().display(),
            if self.config.fix { "fix" } else { "dry run" },
            expected_day
        );

        report.master_audit = idx.compare_master_blocks(chk);
        report.index_audit = idx.compare_index_blocks(chk, self.config.detailed);

        let mut run = Run {
            check: self,
            idx,
            chk,
            data,
            expected_day,
            report,
        };
        for slot in run.idx.channels() {
            run.reconcile_channel(slot)?;
        }

        if self.config.fix {
            run.idx.sync()?;
            run.chk.sync()?;
        }
        let report = run.report;
        self.pool.release_all();
        self.pool.shrink_to_default();

        let s = &report.stats;
        info!(
            "Finished {}: {} channels, {} blocks, {} modifications, {} contradictions, {} unresolved names",
            self.triple.stub().display(),
            s.channels,
            s.blocks_checked,
            s.modifications(),
            s.contradictions,
            s.unresolved_names
        );
        Ok(report)
    }
}

/// State of one reconciliation pass
struct Run<'a> {
    check: &'a RebuildCheck,
    idx: &'a mut IndexFile,
    chk: &'a mut IndexFile,
    data: &'a dyn BlockStore,
    expected_day: Option<JulianDay>,
    report: RebuildReport,
}

impl Run<'_> {
    fn pool(&self) -> &IndexBlockPool {
        &self.check.pool
    }

    fn push(&mut self, mismatch: Mismatch) {
        self.report.mismatches.push(mismatch);
    }

    fn reconcile_channel(&mut self, slot: ChannelSlot) -> Result<()> {
        self.report.stats.channels += 1;
        let channel = slot.seed_name;
        // Master blocks of either file are never read or written as index blocks.
        let masters = self.idx.master_block_numbers().into_iter().chain(self.chk.master_block_numbers());
        let mut walker =
            ChainWalker::new(channel, slot.first_index_block, self.idx.max_block_number()).with_reserved(masters);
        let mut first = true;

        while let Some(step) = walker.next_step() {
            match step {
                ChainStep::Block(number) => match self.reconcile_node(channel, number)? {
                    Some(outcome) => {
                        if first && outcome.seed_name != channel {
                            self.report.stats.master_name_mismatches += 1;
                            warn!(
                                "Master slot names {} but chain head {} names {}",
                                channel, number, outcome.seed_name
                            );
                            self.push(
                                Mismatch::new(
                                    MismatchKind::MasterNameMismatch,
                                    format!("chain head names {}", outcome.seed_name),
                                )
                                .channel(channel)
                                .block(number),
                            );
                        }
                        walker.advance(outcome.next_index);
                    }
                    None => walker.stop(),
                },
                ChainStep::Cycle(number) => {
                    self.report.stats.cycles += 1;
                    let cycle = IndexError::ChainCycle {
                        channel: channel.to_string(),
                        block: number,
                    };
                    self.push(Mismatch::new(MismatchKind::ChainCycle, cycle.to_string()).channel(channel).block(number));
                }
                ChainStep::OutOfRange(number) => {
                    self.push(
                        Mismatch::new(MismatchKind::ChainOutOfRange, "chain points outside the index area")
                            .channel(channel)
                            .block(number),
                    );
                }
                ChainStep::Reserved(number) => {
                    error!("Abandoning chain of {} at master block {}", channel, number);
                    self.push(
                        Mismatch::new(MismatchKind::ChainIntoMaster, "chain points at a master block")
                            .channel(channel)
                            .block(number),
                    );
                }
            }
            first = false;
        }
        Ok(())
    }

    /// Visit one node; `None` when the idx block is malformed and the walk must stop
    fn reconcile_node(&mut self, channel: SeedName, number: i32) -> Result<Option<NodeOutcome>> {
        let idx_handle = match self.load_idx(number)? {
            Ok(handle) => handle,
            Err(reason) => {
                self.report.stats.malformed_idx += 1;
                error!("Abandoning chain of {} at block {}: {}", channel, number, reason);
                self.push(Mismatch::new(MismatchKind::MalformedIndex, reason).channel(channel).block(number));
                return Ok(None);
            }
        };

        let chk_handle = match self.load_chk(number, idx_handle) {
            Ok(handle) => handle,
            Err(e) => {
                self.pool().release(idx_handle)?;
                return Err(e);
            }
        };

        let outcome = self.reconcile_pair(number, idx_handle, chk_handle.0, chk_handle.1);
        let released = self.pool().release(idx_handle).and(self.pool().release(chk_handle.0));
        let outcome = outcome?;
        released?;
        Ok(Some(outcome))
    }

    /// Check out the idx block, or explain why it cannot be used
    fn load_idx(&self, number: i32) -> Result<std::result::Result<BlockHandle, String>> {
        let Some(raw) = self.idx.read_raw(number)? else {
            return Ok(Err("block lies past the end of the idx file".to_string()));
        };
        Ok(self.pool().acquire(&raw, number).map_err(|e| e.to_string()))
    }

    /// Check out the chk block, rebuilding it from idx when it is unusable.
    /// The flag is true when the block was rebuilt.
    fn load_chk(&mut self, number: i32, idx_handle: BlockHandle) -> Result<(BlockHandle, bool)> {
        let reason = match self.chk.read_raw(number)? {
            Some(raw) => match self.pool().acquire(&raw, number) {
                Ok(handle) => return Ok((handle, false)),
                Err(e) => e.to_string(),
            },
            None => "block lies past the end of the chk file".to_string(),
        };

        let fresh = self.pool().with_block(idx_handle, |idx| {
            let mut fresh = IndexBlock::new(idx.seed_name, number);
            fresh.next_index = idx.next_index;
            fresh.update_time = idx.update_time;
            fresh
        })?;
        let channel = fresh.seed_name;
        self.report.stats.chk_resynthesized += 1;
        warn!("Rebuilding chk block {} for {}: {}", number, channel, reason);
        self.push(Mismatch::new(MismatchKind::CheckResynthesized, reason).channel(channel).block(number));
        Ok((self.pool().acquire_block(fresh), true))
    }

    fn reconcile_pair(
        &mut self,
        number: i32,
        idx_handle: BlockHandle,
        chk_handle: BlockHandle,
        resynthesized: bool,
    ) -> Result<NodeOutcome> {
        let threshold = self.check.config.name_match_threshold;
        let findings = self.pool().with_pair_mut(idx_handle, chk_handle, |idx, chk| {
            let name = reconcile_name(idx, chk, threshold);
            let mut findings = PairFindings {
                seed_name: idx.seed_name,
                next_index: idx.next_index,
                name,
                extent_fixes: Vec::new(),
                bitmap_diffs: Vec::new(),
            };
            if matches!(findings.name, NameOutcome::Unresolved { .. }) {
                return findings;
            }

            for i in 0..MAX_EXTENTS {
                let ours = idx.extents[i];
                let theirs = &mut chk.extents[i];
                if ours.starting_block != theirs.starting_block {
                    if idx.is_tail_extent(i) {
                        continue;
                    }
                    findings.extent_fixes.push((i, theirs.starting_block, ours.starting_block));
                    *theirs = Extent { bitmap: 0, ..ours };
                }
                if ours.is_used() && ours.bitmap != theirs.bitmap {
                    findings.bitmap_diffs.push(BitmapDiff {
                        extent: i,
                        starting_block: ours.starting_block,
                        idx_bits: ours.bitmap as u64,
                        chk_bits: theirs.bitmap as u64,
                    });
                }
            }
            findings
        })?;

        let channel = findings.seed_name;
        let mut outcome = NodeOutcome {
            block: number,
            seed_name: channel,
            next_index: findings.next_index,
            idx_modified: false,
            chk_modified: resynthesized,
            findings: 0,
        };
        self.report.stats.blocks_checked += 1;

        match findings.name {
            NameOutcome::Matched => {}
            NameOutcome::Adopted { from, requested } => {
                self.report.stats.seedname_fixes += 1;
                outcome.chk_modified = true;
                let how = if requested {
                    "unfinished write".to_string()
                } else {
                    "extent starts agree".to_string()
                };
                debug!("chk block {} seedname {} -> {} ({})", number, from, channel, how);
                self.push(
                    Mismatch::new(MismatchKind::SeedNameFixed, format!("chk had {} ({})", from, how))
                        .channel(channel)
                        .block(number),
                );
            }
            NameOutcome::Unresolved { chk_name, agreement } => {
                self.report.stats.unresolved_names += 1;
                outcome.findings += 1;
                let unresolved = IndexError::NameMismatchUnresolved {
                    block: number,
                    idx_name: channel.to_string(),
                    chk_name: chk_name.to_string(),
                    agreement: agreement.unwrap_or(0.0),
                };
                warn!("{}", unresolved);
                self.push(
                    Mismatch::new(MismatchKind::NameUnresolved, unresolved.to_string())
                        .channel(channel)
                        .block(number),
                );
                self.commit(idx_handle, chk_handle, &mut outcome)?;
                return Ok(outcome);
            }
        }

        for &(extent, before, after) in &findings.extent_fixes {
            self.report.stats.extent_fixes += 1;
            outcome.chk_modified = true;
            self.push(
                Mismatch::new(
                    MismatchKind::ExtentFixed,
                    format!("extent {} starting block {} -> {}", extent, before, after),
                )
                .channel(channel)
                .block(number),
            );
        }

        let mut actions = Vec::new();
        for diff in &findings.bitmap_diffs {
            self.reconcile_bitmap(number, channel, diff, &mut actions, &mut outcome)?;
        }
        if !actions.is_empty() {
            self.pool().with_pair_mut(idx_handle, chk_handle, |idx, chk| {
                for action in &actions {
                    let block = match action.target {
                        BitTarget::Index => &mut *idx,
                        BitTarget::Check => &mut *chk,
                    };
                    let extent = &mut block.extents[action.extent];
                    if action.set {
                        extent.set_bit(action.bit);
                    } else {
                        extent.clear_bit(action.bit);
                    }
                }
            })?;
        }

        self.commit(idx_handle, chk_handle, &mut outcome)?;
        if !outcome.idx_modified && !outcome.chk_modified && outcome.findings == 0 {
            self.report.stats.blocks_ok += 1;
        }
        if self.check.config.debug {
            info!("{} block {}: {:?}", channel, number, outcome);
        } else {
            debug!("{} block {}: {:?}", channel, number, outcome);
        }
        Ok(outcome)
    }

    /// Decide every bit of a differing extent against the raw data
    fn reconcile_bitmap(
        &mut self,
        number: i32,
        channel: SeedName,
        diff: &BitmapDiff,
        actions: &mut Vec<BitAction>,
        outcome: &mut NodeOutcome,
    ) -> Result<()> {
        let last_block = diff.starting_block.checked_add(BLOCKS_PER_EXTENT as i32 - 1);
        if diff.starting_block < 0 || last_block.is_none() {
            warn!(
                "Extent {} of block {} starts at unaddressable data block {}",
                diff.extent, number, diff.starting_block
            );
            outcome.findings += 1;
            self.push(
                Mismatch::new(
                    MismatchKind::MalformedIndex,
                    format!("extent {} starts at unaddressable data block {}", diff.extent, diff.starting_block),
                )
                .channel(channel)
                .block(number),
            );
            return Ok(());
        }
        let mut raw = vec![0u8; BLOCKS_PER_EXTENT * BLOCK_SIZE];
        self.data.read_blocks(diff.starting_block as u64, &mut raw)?;

        for (bit, block) in raw.chunks_exact(BLOCK_SIZE).enumerate() {
            let mask = 1u64 << bit;
            let idx_has = diff.idx_bits & mask != 0;
            let chk_has = diff.chk_bits & mask != 0;
            let data_block = diff.starting_block + bit as i32;
            let state = self.check.decoder.classify(block, &channel, self.expected_day);
            let mut act = |target, set| {
                actions.push(BitAction {
                    target,
                    extent: diff.extent,
                    bit,
                    set,
                })
            };

            match decide_bit(idx_has, chk_has, state) {
                BitDecision::NoAction => {}
                BitDecision::SetCheck => {
                    act(BitTarget::Check, true);
                    self.report.stats.bits_set += 1;
                    outcome.chk_modified = true;
                    self.push(
                        Mismatch::new(MismatchKind::CheckBitSet, format!("data block {}", data_block))
                            .channel(channel)
                            .block(number),
                    );
                }
                BitDecision::SetIndex { set_chk } => {
                    act(BitTarget::Index, true);
                    self.report.stats.bad_index_bit_fixes += 1;
                    outcome.idx_modified = true;
                    if set_chk {
                        act(BitTarget::Check, true);
                        self.report.stats.bits_set += 1;
                        outcome.chk_modified = true;
                    }
                    self.push(
                        Mismatch::new(
                            MismatchKind::IndexBitSet,
                            format!("data block {} holds a matching record", data_block),
                        )
                        .channel(channel)
                        .block(number),
                    );
                }
                BitDecision::Contradiction { clear_chk } => {
                    if clear_chk {
                        act(BitTarget::Check, false);
                        self.report.stats.bits_unset += 1;
                        outcome.chk_modified = true;
                        self.push(
                            Mismatch::new(MismatchKind::CheckBitCleared, format!("data block {} is empty", data_block))
                                .channel(channel)
                                .block(number),
                        );
                    }
                    self.report.stats.contradictions += 1;
                    outcome.findings += 1;
                    warn!(
                        "{} block {}: idx claims data block {} but it is empty",
                        channel, number, data_block
                    );
                    self.push(
                        Mismatch::new(
                            MismatchKind::BitmapContradiction,
                            format!("idx claims data block {} but it is empty", data_block),
                        )
                        .channel(channel)
                        .block(number),
                    );
                }
                BitDecision::ForeignData => {
                    self.report.stats.contradictions += 1;
                    outcome.findings += 1;
                    warn!(
                        "{} block {}: data block {} holds a record for another channel or day",
                        channel, number, data_block
                    );
                    self.push(
                        Mismatch::new(
                            MismatchKind::BitmapContradiction,
                            format!("data block {} holds a record for another channel or day", data_block),
                        )
                        .channel(channel)
                        .block(number),
                    );
                }
            }
        }
        Ok(())
    }

    /// Write modified blocks back in fix mode
    fn commit(&mut self, idx_handle: BlockHandle, chk_handle: BlockHandle, outcome: &mut NodeOutcome) -> Result<()> {
        if !outcome.idx_modified && !outcome.chk_modified {
            return Ok(());
        }
        if !self.check.config.fix {
            debug!(
                "Dry run: block {} would be rewritten (idx: {}, chk: {})",
                outcome.block, outcome.idx_modified, outcome.chk_modified
            );
            return Ok(());
        }
        if outcome.idx_modified {
            let block = self.pool().snapshot(idx_handle)?;
            self.idx.write_block(&block)?;
            self.report.stats.idx_blocks_written += 1;
        }
        if outcome.chk_modified {
            let block = self.pool().snapshot(chk_handle)?;
            self.chk.write_block(&block)?;
            self.report.stats.chk_blocks_written += 1;
        }
        Ok(())
    }
}
