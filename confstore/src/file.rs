//! Byte-level store with crash-safe writes.
//!
//! Data is written to `<path>.tmp`, flushed to disk, and renamed over the
//! target.  The rename is atomic within a filesystem, so a reader never sees
//! a partially-written file; if the rename fails the original file is left
//! unchanged and the temporary is removed.

use log::{trace, warn};
use snafu::ResultExt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{error, Result};

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// The location this store reads from and writes to, for display purposes.
    pub fn uri(&self) -> String {
        self.path.display().to_string()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).context(error::FileReadSnafu { path: &self.path })
    }

    /// Saves the given bytes, replacing any previous content atomically.
    /// Zero-length input is treated as a no-op success.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            warn!("No data to save to '{}'", self.path.display());
            return Ok(());
        }

        let tmp_path = PathBuf::from(format!("{}.tmp", self.path.display()));
        {
            let mut tmp = File::create(&tmp_path).context(error::FileWriteSnafu {
                path: &tmp_path,
            })?;
            tmp.write_all(data).context(error::FileWriteSnafu {
                path: &tmp_path,
            })?;
            tmp.sync_all().context(error::FileWriteSnafu {
                path: &tmp_path,
            })?;
        }

        let renamed = fs::rename(&tmp_path, &self.path).context(error::FileRenameSnafu {
            from: &tmp_path,
            to: &self.path,
        });
        if renamed.is_err() {
            if let Err(e) = fs::remove_file(&tmp_path) {
                warn!("Failed to remove temporary '{}': {}", tmp_path.display(), e);
            }
            return renamed;
        }

        // The rename consumed the temporary; clearing a leftover from an
        // earlier interrupted save is best-effort.
        if tmp_path.exists() {
            if let Err(e) = fs::remove_file(&tmp_path) {
                warn!("Failed to remove temporary '{}': {}", tmp_path.display(), e);
            }
        }

        trace!("Saved {} bytes to '{}'", data.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("target.conf"));

        store.save(b"router id 10.0.0.1;\n").unwrap();
        assert_eq!(store.load().unwrap(), b"router id 10.0.0.1;\n");
    }

    #[test]
    fn save_replaces_previous_content() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("target.conf"));

        store.save(b"first").unwrap();
        store.save(b"second").unwrap();
        assert_eq!(store.load().unwrap(), b"second");
    }

    #[test]
    fn empty_save_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("target.conf"));

        store.save(b"keep me").unwrap();
        store.save(b"").unwrap();
        assert_eq!(store.load().unwrap(), b"keep me");
    }

    #[test]
    fn save_leaves_no_temporary_behind() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("target.conf"));

        store.save(b"data").unwrap();
        assert!(!dir.path().join("target.conf.tmp").exists());
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nope.conf"));

        let err = store.load().unwrap_err();
        assert!(err.is_not_found());
    }
}
