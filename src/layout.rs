//! File naming for a storage triple
//!
//! One day of waveform storage is three files sharing a stub:
//!
//! ```text
//! <stub>.idx   primary index (control block, master blocks, index chains)
//! <stub>.chk   shadow index, same block numbering
//! <stub>.ms    raw 512-byte data blocks referenced by extents
//! ```
//!
//! A stub of the form `YYYY_DDD[...]` also names the day the data belongs to.

use crate::constants::extensions;
use crate::data_block::JulianDay;
use crate::error::IndexError;
use crate::Result;
use std::path::{Path, PathBuf};

/// Paths of the idx, chk and data files sharing one stub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTriple {
    stub: PathBuf,
    idx_path: PathBuf,
    chk_path: PathBuf,
    data_path: PathBuf,
}

impl FileTriple {
    /// Build the triple for `stub`, which carries no extension
    pub fn from_stub<P: AsRef<Path>>(stub: P) -> Self {
        let stub = stub.as_ref().to_path_buf();
        let with_ext = |ext: &str| {
            let mut name = stub.clone().into_os_string();
            name.push(".");
            name.push(ext);
            PathBuf::from(name)
        };

        Self {
            idx_path: with_ext(extensions::INDEX),
            chk_path: with_ext(extensions::CHECK),
            data_path: with_ext(extensions::DATA),
            stub,
        }
    }

    /// Build the triple from any member file (or the stub) by stripping the extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self::from_stub(path.as_ref().with_extension(""))
    }

    pub fn stub(&self) -> &Path {
        &self.stub
    }

    pub fn idx_path(&self) -> &Path {
        &self.idx_path
    }

    pub fn chk_path(&self) -> &Path {
        &self.chk_path
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Day encoded in a `YYYY_DDD` stub name, if any
    pub fn expected_day(&self) -> Option<JulianDay> {
        self.stub
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(JulianDay::from_stub)
    }

    /// Files of the triple that do not exist, in idx, chk, data order
    pub fn missing_files(&self) -> Vec<&Path> {
        [&self.idx_path, &self.chk_path, &self.data_path]
            .into_iter()
            .filter(|path| !path.is_file())
            .map(PathBuf::as_path)
            .collect()
    }

    /// Fail with [`IndexError::FileNotFound`] for the first missing file
    pub fn ensure_exists(&self) -> Result<()> {
        match self.missing_files().first() {
            Some(path) => Err(IndexError::FileNotFound {
                path: path.to_path_buf(),
            }),
            None => Ok(()),
        }
    }
}
