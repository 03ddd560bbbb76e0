//! Error types for waveform index operations
//!
//! This module defines the error taxonomy shared by the block codecs, the
//! block pool, the whole-file loader and the reconciliation engine.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for all waveform index operations
#[derive(Debug, Error)]
pub enum IndexError {
    /// IO operations failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A block failed validation while being decoded
    #[error("Malformed block {block}: {reason}")]
    MalformedBlock { block: i32, reason: String },

    /// A chain revisited a block number it had already walked through
    #[error("Chain cycle for channel {channel}: block {block} was already visited")]
    ChainCycle { channel: String, block: i32 },

    /// The chk seedname disagrees with idx and too few extents agree to repair it
    #[error(
        "Unresolved seedname mismatch at block {block}: idx={idx_name} chk={chk_name} (extent agreement {agreement:.2})"
    )]
    NameMismatchUnresolved {
        block: i32,
        idx_name: String,
        chk_name: String,
        agreement: f64,
    },

    /// A pool handle was used while not checked out
    #[error("Pool misuse on slot {index} (generation {generation}): {reason}")]
    PoolMisuse {
        index: usize,
        generation: u32,
        reason: String,
    },

    /// One of the files of a storage triple does not exist
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Block 0 of an index file could not be read
    #[error("Control block unreadable in {}: {reason}", path.display())]
    ControlBlockUnreadable { path: PathBuf, reason: String },

    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IndexError {
    /// Create a malformed block error
    pub fn malformed(block: i32, reason: impl Into<String>) -> Self {
        Self::MalformedBlock {
            block,
            reason: reason.into(),
        }
    }

    /// Create a pool misuse error
    pub fn pool_misuse(index: usize, generation: u32, reason: impl Into<String>) -> Self {
        Self::PoolMisuse {
            index,
            generation,
            reason: reason.into(),
        }
    }

    /// Create a detailed config error
    pub fn config_error(field: impl Into<String>, reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Config(format!("{} - {}: {}", field.into(), reason.into(), suggestion.into()))
    }

    /// Create a control block error for the given file
    pub fn control_block_unreadable(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::ControlBlockUnreadable {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Check if this error lets a scan continue with the next block or channel
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedBlock { .. } | Self::ChainCycle { .. } | Self::NameMismatchUnresolved { .. }
        )
    }

    /// Check if this error must end the current file-triple run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::FileNotFound { .. } | Self::ControlBlockUnreadable { .. }
        )
    }

    /// Add file context to an error, preserving the original error information
    pub fn with_file_context(self, file_path: impl AsRef<Path>, operation: &str) -> Self {
        let context = format!("{} (file: {})", operation, file_path.as_ref().display());

        match self {
            Self::Io(ref err) => Self::Io(std::io::Error::new(err.kind(), format!("{}: {}", context, err))),
            Self::MalformedBlock { block, reason } => Self::MalformedBlock {
                block,
                reason: format!("{}: {}", context, reason),
            },
            Self::Config(ref msg) => Self::Config(format!("{}: {}", context, msg)),
            _ => self, // For structured errors, return as-is to preserve structure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let error = IndexError::malformed(7, "seedname fails validation");
        assert_eq!(error.to_string(), "Malformed block 7: seedname fails validation");

        let error = IndexError::ChainCycle {
            channel: "NTBOU  BHZ  ".to_string(),
            block: 10,
        };
        assert!(error.to_string().contains("block 10 was already visited"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(ErrorKind::NotFound, "missing");
        let error: IndexError = io_error.into();
        assert!(matches!(error, IndexError::Io(_)));
        assert!(error.is_fatal());
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(IndexError::malformed(1, "bad").is_recoverable());
        assert!(!IndexError::pool_misuse(0, 1, "double release").is_recoverable());
        assert!(!IndexError::pool_misuse(0, 1, "double release").is_fatal());
        assert!(IndexError::control_block_unreadable("/tmp/x.idx", "short read").is_fatal());
    }

    #[test]
    fn test_file_context_preserves_kind() {
        let error = IndexError::Io(std::io::Error::new(ErrorKind::UnexpectedEof, "short read"))
            .with_file_context("/data/2024_001_1.idx", "read block 3");
        match error {
            IndexError::Io(err) => {
                assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
                assert!(err.to_string().contains("2024_001_1.idx"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_config_error_format() {
        let error = IndexError::config_error("name_match_threshold", "must be in (0, 1]", "use 0.8");
        assert_eq!(
            error.to_string(),
            "Configuration error: name_match_threshold - must be in (0, 1]: use 0.8"
        );
    }
}
