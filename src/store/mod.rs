//! The store: write serialization, concurrent reads, rotation, recovery
//! and lifecycle management.
//!
//! ## Concurrency model
//!
//! All writes are funnelled through a single writer thread fed by a
//! bounded request queue, so at most one append is ever in flight and
//! the physical log order equals the order in which requests were
//! accepted. A reader/writer lock guards the active log's index and the
//! segment list; readers take the shared side, the writer and the merge
//! take the exclusive side.
//!
//! Read-side file handles are opened per request. The read path is
//! stateless: a lookup captures a `(file, offset)` pair under the shared
//! lock and performs the actual read without it.

mod merge;

use crate::config::{Options, RecoveryMode};
use crate::error::{Error, Result};
use crate::log::record::CHECKSUM_SIZE;
use crate::log::{is_segment_file, reader, ActiveLog, LogReader, Record, MERGE_TEMP_NAME};
use crate::segment::Segment;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Compute the 160-bit digest stored alongside a value.
fn value_checksum(value: &[u8]) -> [u8; CHECKSUM_SIZE] {
    let mut hasher = Sha1::new();
    hasher.update(value);
    hasher.finalize().into()
}

struct WriteRequest {
    key: Vec<u8>,
    value: Vec<u8>,
    done: Sender<Result<()>>,
}

struct State {
    /// `None` once the store is closed, or after a failed rotation left
    /// the log unusable.
    active: Option<ActiveLog>,
    /// Sealed segments, oldest first.
    segments: Vec<Arc<Segment>>,
}

struct Shared {
    dir: PathBuf,
    options: Options,
    state: RwLock<State>,
    closed: AtomicBool,
}

struct Lifecycle {
    write_tx: Option<Sender<WriteRequest>>,
    writer: Option<JoinHandle<()>>,
    close_result: Option<std::result::Result<(), String>>,
}

/// An open key-value store bound to a directory.
///
/// The store is safe to share across threads behind an `Arc`: any
/// number of concurrent readers may call [`get`](Store::get) while
/// writes flow through [`put`](Store::put).
///
/// # Example
///
/// ```rust,no_run
/// use segkv::Store;
///
/// # fn main() -> Result<(), segkv::Error> {
/// let store = Store::open("./data")?;
/// store.put(b"greeting", b"hello")?;
/// assert_eq!(store.get(b"greeting")?, Some(b"hello".to_vec()));
/// store.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Store {
    shared: Arc<Shared>,
    lifecycle: Mutex<Lifecycle>,
}

impl Store {
    /// Open or create a store at `dir` with default options.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Store> {
        Store::open_with_options(dir, Options::default())
    }

    /// Open or create a store at `dir` with the given options.
    ///
    /// The directory is created if missing. The active log is replayed
    /// to rebuild its index, then existing sealed segments are loaded in
    /// file-name order. Recovery refuses a corrupt log unless
    /// [`RecoveryMode::TruncateTail`](crate::RecoveryMode) is selected.
    pub fn open_with_options<P: AsRef<Path>>(dir: P, options: Options) -> Result<Store> {
        options.validate()?;
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;

        remove_stale_merge_temp(&dir);

        let mut active = ActiveLog::open(&dir)?;
        recover(&mut active, options.recovery)?;
        let segments = load_segments(&dir)?;

        log::debug!(
            "opened store at {:?}: {} active keys, {} sealed segments",
            dir,
            active.key_count(),
            segments.len()
        );

        let shared = Arc::new(Shared {
            dir,
            options: options.clone(),
            state: RwLock::new(State { active: Some(active), segments }),
            closed: AtomicBool::new(false),
        });

        let (write_tx, write_rx) = bounded(options.write_queue_depth);
        let writer_shared = Arc::clone(&shared);
        let writer = std::thread::Builder::new()
            .name("segkv-writer".to_string())
            .spawn(move || write_loop(writer_shared, write_rx))
            .map_err(Error::Io)?;

        Ok(Store {
            shared,
            lifecycle: Mutex::new(Lifecycle {
                write_tx: Some(write_tx),
                writer: Some(writer),
                close_result: None,
            }),
        })
    }

    /// Append a new record for `key`, blocking until the write either
    /// succeeds or fails.
    ///
    /// Concurrent calls are serialized; the order in which requests
    /// reach the writer defines their log order. On success the data has
    /// reached the OS write buffer.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_open()?;

        let write_tx = {
            let lifecycle = self.lifecycle.lock();
            match &lifecycle.write_tx {
                Some(tx) => tx.clone(),
                None => return Err(Error::invalid_state("store is closed")),
            }
        };

        let (done_tx, done_rx) = bounded(1);
        let request = WriteRequest { key: key.to_vec(), value: value.to_vec(), done: done_tx };
        if write_tx.send(request).is_err() {
            return Err(Error::invalid_state("store is closed"));
        }

        match done_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(Error::internal("write serializer dropped the request")),
        }
    }

    /// Read the most recent value for `key`.
    ///
    /// Returns `Ok(None)` when the key is absent everywhere. A record
    /// whose value fails checksum verification, or whose decoded key
    /// does not match the index, is an error; the key stays readable by
    /// later calls once the underlying bytes are intact again.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_open()?;

        // Active log first. The read itself runs without the lock, so a
        // rotation can seal the log in between and the stale offset may
        // land anywhere in the fresh file. An integrity failure from
        // this path is therefore retried once against fresh index state
        // before it is believed; real corruption fails both attempts.
        for attempt in 0..2 {
            let hit = {
                let state = self.shared.state.read();
                let active = match &state.active {
                    Some(active) => active,
                    None => return Err(Error::invalid_state("active log unavailable")),
                };
                active.lookup(key).map(|offset| (active.path().to_path_buf(), offset))
            };

            let (path, offset) = match hit {
                Some(hit) => hit,
                None => break,
            };
            match read_value(&path, offset, key) {
                Ok(Some(value)) => return Ok(Some(value)),
                // The record was rotated into the newest segment; fall
                // through to the segment scan.
                Ok(None) | Err(Error::Io(_)) => break,
                Err(err) => {
                    if attempt == 1 {
                        return Err(err);
                    }
                }
            }
        }

        // Sealed segments, newest first. The shared lock is held across
        // the read so a concurrent merge cannot delete the file
        // underneath it.
        let state = self.shared.state.read();
        for segment in state.segments.iter().rev() {
            if let Some(offset) = segment.lookup(key) {
                return match read_value(segment.path(), offset, key)? {
                    Some(value) => Ok(Some(value)),
                    None => Err(Error::corruption(format!(
                        "segment {:?} ends before indexed offset {}",
                        segment.path(),
                        offset
                    ))),
                };
            }
        }

        Ok(None)
    }

    /// Current length of the active log file in bytes.
    pub fn size(&self) -> Result<u64> {
        self.check_open()?;
        let state = self.shared.state.read();
        match &state.active {
            Some(active) => active.file_size(),
            None => Err(Error::invalid_state("active log unavailable")),
        }
    }

    /// Number of sealed segments currently on disk.
    pub fn segment_count(&self) -> usize {
        self.shared.state.read().segments.len()
    }

    /// Collapse all sealed segments into one, retaining only the most
    /// recent record per key. The active log is untouched.
    ///
    /// A no-op with fewer than two segments. Blocks writes for its
    /// duration. On any error the segment list is left unchanged and
    /// the temporary merge output is removed.
    pub fn merge_segments(&self) -> Result<()> {
        self.check_open()?;

        let mut state = self.shared.state.write();
        if state.segments.len() < 2 {
            return Ok(());
        }

        let merged = merge::merge(&self.shared.dir, &state.segments)?;
        let old = std::mem::replace(&mut state.segments, vec![Arc::new(merged)]);

        // The merged segment is already in place and shadows every key
        // of the old files, so a failed delete costs disk space, not
        // correctness.
        for segment in old {
            if let Err(err) = std::fs::remove_file(segment.path()) {
                log::warn!("could not remove merged segment {:?}: {}", segment.path(), err);
            }
        }

        Ok(())
    }

    /// Close the store: stop accepting writes, drain in-flight ones,
    /// and release the active log handle.
    ///
    /// Idempotent; repeat calls return the first result.
    pub fn close(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();

        if let Some(previous) = &lifecycle.close_result {
            return match previous {
                Ok(()) => Ok(()),
                Err(msg) => Err(Error::internal(msg.clone())),
            };
        }

        self.shared.closed.store(true, Ordering::Release);

        // Dropping the sender ends the write loop once the queue drains.
        lifecycle.write_tx = None;

        let mut result = Ok(());
        if let Some(writer) = lifecycle.writer.take() {
            if writer.join().is_err() {
                result = Err(Error::internal("write serializer panicked"));
            }
        }

        // Release the active log handle.
        self.shared.state.write().active = None;

        lifecycle.close_result = Some(match &result {
            Ok(()) => Ok(()),
            Err(err) => Err(err.to_string()),
        });
        result
    }

    fn check_open(&self) -> Result<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(Error::invalid_state("store is closed"));
        }
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        // Best effort drain on drop.
        let _ = self.close();
    }
}

/// Serve write requests until every sender is gone.
fn write_loop(shared: Arc<Shared>, requests: Receiver<WriteRequest>) {
    for request in requests.iter() {
        let result = apply_write(&shared, request.key, request.value);
        let _ = request.done.send(result);
    }
}

/// Append one record, rotating the log first when the projected size
/// would exceed the threshold. Runs on the writer thread only.
fn apply_write(shared: &Shared, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
    let checksum = value_checksum(&value);
    let record = Record::new(key, value, checksum);
    let encoded = record.encode()?;

    // Rotation, append and index update form one critical section with
    // respect to readers of the active log's index.
    let mut state = shared.state.write();

    let size = match &state.active {
        Some(active) => active.size(),
        None => return Err(Error::invalid_state("active log unavailable")),
    };
    if size + encoded.len() as u64 > shared.options.max_log_size {
        rotate(&mut state)?;
    }

    let active = match &mut state.active {
        Some(active) => active,
        None => return Err(Error::invalid_state("active log unavailable")),
    };
    let offset = active.size();
    active.append(&encoded)?;
    active.note(record.key, offset);

    Ok(())
}

/// Seal the active log into a segment and continue with a fresh one.
/// Caller holds the exclusive lock.
fn rotate(state: &mut State) -> Result<()> {
    let active = match state.active.take() {
        Some(active) => active,
        None => return Err(Error::invalid_state("active log unavailable")),
    };

    log::debug!("rotating active log at {} bytes", active.size());
    let (sealed, fresh) = active.seal()?;
    state.active = Some(fresh);

    let segment = Segment::load(&sealed)?;
    state.segments.push(Arc::new(segment));

    Ok(())
}

/// Replay the active log, rebuilding its index.
fn recover(active: &mut ActiveLog, mode: RecoveryMode) -> Result<()> {
    let mut log_reader = LogReader::open(active.path())?;
    let mut records = 0usize;

    loop {
        let offset = log_reader.position();
        match log_reader.read_next() {
            Ok(Some(record)) => {
                active.note(record.key, offset);
                records += 1;
            }
            Ok(None) => break,
            Err(err @ Error::Corruption(_)) => match mode {
                RecoveryMode::Strict => return Err(err),
                RecoveryMode::TruncateTail => {
                    log::warn!("truncating torn log tail at offset {}: {}", offset, err);
                    active.truncate(offset)?;
                    break;
                }
            },
            Err(err) => return Err(err),
        }
    }

    log::debug!("recovered {} records from the active log", records);
    Ok(())
}

/// Load every sealed segment in the directory, sorted by file name
/// (which agrees with creation order).
fn load_segments(dir: &Path) -> Result<Vec<Arc<Segment>>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(Error::Io)? {
        let entry = entry.map_err(Error::Io)?;
        let name = entry.file_name();
        if let Some(name) = name.to_str() {
            if is_segment_file(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();

    let mut segments = Vec::with_capacity(names.len());
    for name in names {
        segments.push(Arc::new(Segment::load(dir.join(&name))?));
    }
    Ok(segments)
}

/// A merge that crashed after writing its temporary file leaves it
/// behind; it is never the only copy of any record, so discard it.
fn remove_stale_merge_temp(dir: &Path) {
    let temp = dir.join(MERGE_TEMP_NAME);
    if temp.exists() {
        log::warn!("removing stale {} left by an interrupted merge", MERGE_TEMP_NAME);
        if let Err(err) = std::fs::remove_file(&temp) {
            log::warn!("could not remove {:?}: {}", temp, err);
        }
    }
}

/// Read the record at `(path, offset)`, verify its integrity, and
/// return its value. `Ok(None)` means the offset no longer names a
/// record in this file.
fn read_value(path: &Path, offset: u64, key: &[u8]) -> Result<Option<Vec<u8>>> {
    let record = match reader::read_record_at(path, offset)? {
        Some(record) => record,
        None => return Ok(None),
    };

    if record.key != key {
        return Err(Error::corruption(format!(
            "record at offset {} does not match the index key",
            offset
        )));
    }

    let actual = value_checksum(&record.value);
    if actual != record.checksum {
        return Err(Error::ChecksumMismatch { expected: record.checksum, actual });
    }

    Ok(Some(record.value))
}
