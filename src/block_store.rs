//! Synchronous random access to files of 512-byte blocks
//!
//! [`BlockStore`] is the seek+read / seek+write primitive the index loader and
//! the reconciliation engine are written against. [`FileBlockStore`] backs it
//! with a regular file; [`MemoryBlockStore`] keeps blocks in memory for tests
//! and tools that assemble images before writing them out.

use crate::constants::BLOCK_SIZE;
use crate::error::IndexError;
use crate::Result;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Block-addressed storage
pub trait BlockStore: Send + Sync {
    /// Read block `block`; reading past the end of the store is an error
    fn read_block(&self, block: u64, buf: &mut [u8; BLOCK_SIZE]) -> Result<()>;

    /// Write block `block`, extending the store if needed
    fn write_block(&self, block: u64, buf: &[u8; BLOCK_SIZE]) -> Result<()>;

    /// Number of whole blocks currently stored
    fn block_count(&self) -> Result<u64>;

    /// Flush written blocks to stable storage
    fn sync(&self) -> Result<()>;

    /// Read `buf.len() / BLOCK_SIZE` consecutive blocks starting at `first`.
    /// Blocks beyond the end of the store read as zeros. Returns how many
    /// blocks were actually present.
    fn read_blocks(&self, first: u64, buf: &mut [u8]) -> Result<usize> {
        let count = self.block_count()?;
        let mut present = 0;
        for (i, chunk) in buf.chunks_exact_mut(BLOCK_SIZE).enumerate() {
            let block = first + i as u64;
            if block >= count {
                chunk.fill(0);
                continue;
            }
            let mut one = [0u8; BLOCK_SIZE];
            self.read_block(block, &mut one)?;
            chunk.copy_from_slice(&one);
            present += 1;
        }
        Ok(present)
    }
}

/// Block store backed by one file on disk
#[derive(Debug)]
pub struct FileBlockStore {
    path: PathBuf,
    file: Mutex<File>,
    read_only: bool,
}

impl FileBlockStore {
    /// Open an existing file; a missing file is reported as [`IndexError::FileNotFound`]
    pub fn open<P: AsRef<Path>>(path: P, read_only: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => IndexError::FileNotFound { path: path.clone() },
                _ => IndexError::Io(e).with_file_context(&path, "open"),
            })?;

        Ok(Self {
            path,
            file: Mutex::new(file),
            read_only,
        })
    }

    /// Create (or truncate) a file for writing
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| IndexError::Io(e).with_file_context(&path, "create"))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
            read_only: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn seek_block(file: &mut File, block: u64) -> std::io::Result<()> {
        file.seek(SeekFrom::Start(block.saturating_mul(BLOCK_SIZE as u64)))?;
        Ok(())
    }
}

impl BlockStore for FileBlockStore {
    fn read_block(&self, block: u64, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        let mut file = self.file.lock();
        Self::seek_block(&mut file, block)
            .and_then(|_| file.read_exact(buf))
            .map_err(|e| IndexError::Io(e).with_file_context(&self.path, &format!("read block {}", block)))
    }

    fn write_block(&self, block: u64, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        if self.read_only {
            return Err(IndexError::Io(std::io::Error::new(
                ErrorKind::PermissionDenied,
                "store opened read-only",
            ))
            .with_file_context(&self.path, &format!("write block {}", block)));
        }
        let mut file = self.file.lock();
        Self::seek_block(&mut file, block)
            .and_then(|_| file.write_all(buf))
            .map_err(|e| IndexError::Io(e).with_file_context(&self.path, &format!("write block {}", block)))
    }

    fn block_count(&self) -> Result<u64> {
        let len = self
            .file
            .lock()
            .metadata()
            .map_err(|e| IndexError::Io(e).with_file_context(&self.path, "stat"))?
            .len();
        Ok(len / BLOCK_SIZE as u64)
    }

    fn sync(&self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        self.file
            .lock()
            .sync_all()
            .map_err(|e| IndexError::Io(e).with_file_context(&self.path, "sync"))
    }

    fn read_blocks(&self, first: u64, buf: &mut [u8]) -> Result<usize> {
        let count = self.block_count()?;
        let wanted = (buf.len() / BLOCK_SIZE) as u64;
        let present = count.saturating_sub(first).min(wanted) as usize;
        let split = present * BLOCK_SIZE;
        if present > 0 {
            let mut file = self.file.lock();
            Self::seek_block(&mut file, first)
                .and_then(|_| file.read_exact(&mut buf[..split]))
                .map_err(|e| {
                    IndexError::Io(e).with_file_context(&self.path, &format!("read blocks {}+{}", first, present))
                })?;
        }
        buf[split..].fill(0);
        Ok(present)
    }
}

/// In-memory block store
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: Mutex<Vec<[u8; BLOCK_SIZE]>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockStore for MemoryBlockStore {
    fn read_block(&self, block: u64, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        let blocks = self.blocks.lock();
        let data = blocks.get(block as usize).ok_or_else(|| {
            IndexError::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("block {} is past the end of the store", block),
            ))
        })?;
        buf.copy_from_slice(data);
        Ok(())
    }

    fn write_block(&self, block: u64, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        let mut blocks = self.blocks.lock();
        let index = block as usize;
        if index >= blocks.len() {
            blocks.resize(index + 1, [0u8; BLOCK_SIZE]);
        }
        blocks[index] = *buf;
        Ok(())
    }

    fn block_count(&self) -> Result<u64> {
        Ok(self.blocks.lock().len() as u64)
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
