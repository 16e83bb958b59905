//! Sealed, read-only log segments.

use crate::error::Result;
use crate::log::LogReader;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// An immutable historical log file with its in-memory index.
///
/// Segments are produced by rotation and by merge. The index is built
/// once at load time and never changes afterwards.
pub struct Segment {
    path: PathBuf,
    index: HashMap<Vec<u8>, u64>,
}

impl Segment {
    /// Load a sealed segment by scanning it end to end.
    ///
    /// Later records override earlier ones for the same key, so the
    /// index always points at the most recent in-segment record.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut reader = LogReader::open(&path)?;
        let mut index = HashMap::new();

        loop {
            let offset = reader.position();
            match reader.read_next()? {
                Some(record) => {
                    index.insert(record.key, offset);
                }
                None => break,
            }
        }

        Ok(Self { path, index })
    }

    /// Offset of the most recent record for `key`, if present.
    pub fn lookup(&self, key: &[u8]) -> Option<u64> {
        self.index.get(key).copied()
    }

    /// Path of the segment file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of distinct keys in this segment.
    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    /// Iterate over the `(key, offset)` pairs of this segment's index.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (&Vec<u8>, u64)> {
        self.index.iter().map(|(key, &offset)| (key, offset))
    }
}
