//! Segment compaction.
//!
//! Collapses all sealed segments into a single one, retaining only the
//! most recent record per key. The active log is untouched.

use crate::error::{Error, Result};
use crate::log::{segment_file_name, LogReader, MERGE_TEMP_NAME};
use crate::segment::Segment;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Merge `segments` (oldest first, as the store keeps them) into a new
/// sealed segment inside `dir`, and return it loaded.
///
/// Latest-wins: segments are visited newest to oldest and a record is
/// written only if its key has not been written yet. Keys come from
/// each segment's index, which already points at the most recent
/// in-segment record, so a key that was overwritten within one segment
/// keeps its newest value too.
///
/// The merged file is renamed into place before the caller deletes the
/// inputs; a crash in between leaves a directory that recovers cleanly,
/// because the merged segment is the newest and shadows every key of
/// the leftovers. On any error the temporary file is removed and the
/// inputs stay as they were.
pub(crate) fn merge(dir: &Path, segments: &[Arc<Segment>]) -> Result<Segment> {
    let temp_path = dir.join(MERGE_TEMP_NAME);
    let mut temp = open_temp(&temp_path)?;

    if let Err(err) = write_merged(&mut temp, segments) {
        drop(temp);
        remove_temp(&temp_path);
        return Err(err);
    }
    drop(temp);

    let merged_path = dir.join(segment_file_name());
    if let Err(err) = std::fs::rename(&temp_path, &merged_path) {
        remove_temp(&temp_path);
        return Err(Error::Io(err));
    }

    log::info!("merged {} segments into {:?}", segments.len(), merged_path);
    Segment::load(&merged_path)
}

fn open_temp(path: &Path) -> Result<File> {
    let mut options = OpenOptions::new();
    // A leftover temp from an earlier failed merge would corrupt the
    // output if appended to, so refuse to reuse one.
    options.create_new(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).map_err(Error::Io)
}

fn write_merged(temp: &mut File, segments: &[Arc<Segment>]) -> Result<()> {
    let mut written: HashSet<Vec<u8>> = HashSet::new();

    for segment in segments.iter().rev() {
        let mut source = LogReader::open(segment.path())?;
        for (key, offset) in segment.entries() {
            if written.contains(key) {
                continue;
            }
            source.seek(offset)?;
            let record = match source.read_next()? {
                Some(record) => record,
                None => {
                    return Err(Error::corruption(format!(
                        "segment {:?} ends before indexed offset {}",
                        segment.path(),
                        offset
                    )))
                }
            };
            let encoded = record.encode()?;
            temp.write_all(&encoded).map_err(Error::Io)?;
            written.insert(record.key);
        }
    }

    Ok(())
}

fn remove_temp(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        log::warn!("could not remove {:?} after failed merge: {}", path, err);
    }
}
