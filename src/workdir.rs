//! Ephemeral working directories.
//!
//! A [`WorkDir`] is created under the jail's work root, holds exactly one
//! source file, and is owned by the single request that created it. Dropping
//! it removes the directory; [`WorkDir::close`] does the same but reports
//! failures so they can be logged.

use crate::command::SOURCE_STEM;
use crate::options::LanguageFamily;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix of every job directory name. The rest is random.
pub const JOB_PREFIX: &str = "job-";

/// An exclusively owned job directory containing the submitted source.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
    source: PathBuf,
}

impl WorkDir {
    /// Create a fresh directory under `root` and write `source` into it.
    ///
    /// If writing the source fails the half-created directory is removed
    /// before the error is returned.
    pub fn create(root: &Path, source: &str, family: LanguageFamily) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(JOB_PREFIX)
            .tempdir_in(root)?;

        let source_path = dir
            .path()
            .join(format!("{SOURCE_STEM}.{}", family.extension()));
        std::fs::write(&source_path, source)?;

        Ok(Self {
            dir,
            source: source_path,
        })
    }

    /// The job directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The source file inside the job directory.
    pub fn source_path(&self) -> &Path {
        &self.source
    }

    /// Remove the directory and everything in it.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}
