//! The active append-only log.

use crate::error::{Error, Result};
use crate::log::{segment_file_name, ACTIVE_LOG_NAME};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// The single writable log file of a store directory.
///
/// The offset mirrors the file length and grows monotonically until the
/// log is sealed. The owning index maps each key to the offset of its
/// most recent record within this file; the writer updates it after
/// every successful append.
pub struct ActiveLog {
    file: File,
    path: PathBuf,
    dir: PathBuf,
    offset: u64,
    index: HashMap<Vec<u8>, u64>,
}

impl ActiveLog {
    /// Open or create `current-data` in `dir` for appending.
    ///
    /// The file is created with owner-only permissions. The offset is
    /// initialised to the current file length; the index starts empty
    /// and is filled by recovery.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let path = dir.join(ACTIVE_LOG_NAME);
        let file = open_append(&path)?;
        let offset = file.metadata().map_err(Error::Io)?.len();

        Ok(Self { file, path, dir, offset, index: HashMap::new() })
    }

    /// Append encoded bytes to the log, returning the count written.
    ///
    /// A failed append leaves the offset and the index untouched; the
    /// on-disk tail may then hold a torn record, which recovery has to
    /// tolerate.
    pub fn append(&mut self, data: &[u8]) -> Result<u64> {
        self.file.write_all(data).map_err(Error::Io)?;
        let written = data.len() as u64;
        self.offset += written;
        Ok(written)
    }

    /// Current write offset. Equals the file length.
    pub fn size(&self) -> u64 {
        self.offset
    }

    /// File length as reported by the filesystem.
    pub fn file_size(&self) -> Result<u64> {
        Ok(self.file.metadata().map_err(Error::Io)?.len())
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset of the most recent record for `key` in this log.
    pub fn lookup(&self, key: &[u8]) -> Option<u64> {
        self.index.get(key).copied()
    }

    /// Record that `key`'s most recent record begins at `offset`.
    pub fn note(&mut self, key: Vec<u8>, offset: u64) {
        self.index.insert(key, offset);
    }

    /// Number of keys in the owning index.
    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    /// Truncate the log to `len` bytes, discarding a torn tail.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len).map_err(Error::Io)?;
        self.offset = len;
        Ok(())
    }

    /// Seal this log: rename it to a fresh `segment-<ns>` file and start
    /// over with an empty `current-data`.
    ///
    /// Consumes the log. On success, returns the sealed path together
    /// with the fresh log; on failure the handle is gone and the caller
    /// must treat the store as no longer writable.
    pub fn seal(self) -> Result<(PathBuf, ActiveLog)> {
        let sealed = self.dir.join(segment_file_name());
        std::fs::rename(&self.path, &sealed).map_err(Error::Io)?;

        let dir = self.dir.clone();
        // Release the handle on the sealed file before reopening.
        drop(self);

        let fresh = ActiveLog::open(&dir)?;
        Ok((sealed, fresh))
    }
}

fn open_append(path: &Path) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).map_err(Error::Io)
}
