//! Waveform index - block index codec, audit and reconciliation
//!
//! Continuous waveform storage keeps one day of data in three files sharing a
//! stub: a primary index (`.idx`), a shadow copy of it (`.chk`) and the raw
//! 512-byte data blocks (`.ms`). The index maps each channel to a chain of
//! index blocks, each holding extents whose 64-bit bitmaps record which data
//! blocks have been committed.
//!
//! This crate provides:
//!
//! - the on-disk codecs for control, master and index blocks ([`ControlBlock`],
//!   [`MasterBlock`], [`IndexBlock`])
//! - a thread-safe arena of reusable decoded blocks ([`IndexBlockPool`])
//! - a whole-file loader with presence bitset and idx/chk audits ([`IndexFile`])
//! - the offline reconciler behind the `rebuildcheck` tool ([`RebuildCheck`])
//!
//! # Example
//!
//! ```no_run
//! use waveform_index::{FileTriple, RebuildCheck, RebuildConfig};
//!
//! # fn main() -> waveform_index::Result<()> {
//! let triple = FileTriple::from_path("/data/2024_123.idx");
//! let report = RebuildCheck::new(triple, RebuildConfig::new())?.run()?;
//! println!("{}", report.render());
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod block_pool;
pub mod block_store;
pub mod chain;
pub mod config;
pub mod constants;
pub mod control_block;
pub mod data_block;
pub mod error;
pub mod index_block;
pub mod index_file;
pub mod layout;
pub mod master_block;
pub mod rebuild_check;
pub mod seed_name;

#[cfg(test)]
pub mod test_utils;

pub use audit::{IndexBlockAudit, MasterBlockAudit, Mismatch, MismatchKind};
pub use block_pool::{BlockHandle, IndexBlockPool, PoolConfig, PoolStatistics};
pub use block_store::{BlockStore, FileBlockStore, MemoryBlockStore};
pub use chain::{ChainStep, ChainWalker};
pub use config::RebuildConfig;
pub use control_block::ControlBlock;
pub use data_block::{DataBlockDecoder, DataBlockState, JulianDay, MiniSeedHeader, MiniSeedHeaderDecoder};
pub use error::IndexError;
pub use index_block::{Extent, ExtentDiff, IndexBlock};
pub use index_file::{IndexFile, IndexFileKind};
pub use layout::FileTriple;
pub use master_block::{ChannelSlot, MasterBlock};
pub use rebuild_check::{BitDecision, NodeOutcome, RebuildCheck, RebuildReport, RebuildStats};
pub use seed_name::SeedName;

/// Type alias for Results using IndexError
pub type Result<T> = std::result::Result<T, IndexError>;
