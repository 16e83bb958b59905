//! Append-only log files and their on-disk record format.
//!
//! A store directory holds exactly one writable log (`current-data`) and
//! any number of sealed, read-only segments (`segment-<ns>`). Both kinds
//! of file share the same record format.
//!
//! ## Architecture
//!
//! - **Record format**: each entry is a self-delimited record carrying a
//!   160-bit value checksum
//! - **Active log**: the single append-only file with a monotonically
//!   increasing write offset and an owning key index
//! - **Recovery**: on startup, the active log is replayed to rebuild its
//!   index
//!
//! ## Usage
//!
//! ```rust,no_run
//! use segkv::log::{ActiveLog, LogReader, Record};
//!
//! # fn main() -> Result<(), segkv::Error> {
//! let mut active = ActiveLog::open("./data")?;
//! let record = Record::new(b"key1".to_vec(), b"value1".to_vec(), [0u8; 20]);
//! active.append(&record.encode()?)?;
//!
//! let mut reader = LogReader::open(active.path())?;
//! while let Some(record) = reader.read_next()? {
//!     println!("replayed: {:?}", record.key);
//! }
//! # Ok(())
//! # }
//! ```

pub mod active;
pub mod reader;
pub mod record;

pub use active::ActiveLog;
pub use reader::LogReader;
pub use record::Record;

use std::time::{SystemTime, UNIX_EPOCH};

/// File name of the active log inside the store directory.
pub const ACTIVE_LOG_NAME: &str = "current-data";

/// File name prefix of sealed segments.
pub const SEGMENT_PREFIX: &str = "segment-";

/// Transient output file of an in-progress merge.
pub const MERGE_TEMP_NAME: &str = "merged-temp";

/// Generate a sealed segment file name from the current wall clock.
///
/// Nanosecond timestamps have equal digit counts within a run, so the
/// lexicographic order of the names agrees with creation order.
pub fn segment_file_name() -> String {
    let ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{}{}", SEGMENT_PREFIX, ns)
}

/// Check whether a file name denotes a sealed segment.
pub fn is_segment_file(name: &str) -> bool {
    match name.strip_prefix(SEGMENT_PREFIX) {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}
