//! # segkv - A Log-Structured Key-Value Store
//!
//! segkv is an embeddable, append-only key-value store with segment
//! rotation, latest-wins compaction and checksum-verified reads. Every
//! write is appended to a single active log; when the log would exceed a
//! size threshold it is sealed into a read-only segment and a fresh log
//! is started. A merge collapses the sealed history into one segment,
//! keeping only the most recent value per key.
//!
//! ## Architecture
//!
//! The store consists of several cooperating components:
//!
//! - **Record codec**: self-delimited records carrying a 160-bit value
//!   checksum
//! - **Active log**: the single writable append-only file with an
//!   in-memory key index
//! - **Sealed segments**: immutable historical log files, each with its
//!   own index
//! - **Write serializer**: a dedicated writer thread fed by a bounded
//!   queue; readers run concurrently under a shared lock
//! - **Compaction**: merges all sealed segments into one, latest-wins
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use segkv::{Options, Store};
//!
//! # fn main() -> Result<(), segkv::Error> {
//! // Open or create a store; the directory is created if missing.
//! let store = Store::open_with_options("./data", Options::default())?;
//!
//! // Write operations block until the append is durable in the OS
//! // write buffer.
//! store.put(b"key1", b"value1")?;
//! store.put(b"key2", b"value2")?;
//!
//! // Read operations verify the stored checksum.
//! if let Some(value) = store.get(b"key1")? {
//!     println!("Found: {:?}", value);
//! }
//!
//! // Compact the sealed history.
//! store.merge_segments()?;
//!
//! store.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Durability
//!
//! A successful `put` guarantees the record has reached the OS write
//! buffer, not stable storage. Reopening a directory replays the active
//! log and reloads every segment, so all acknowledged writes survive a
//! clean process exit.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod config;
pub mod error;
pub mod log;
pub mod segment;
pub mod store;

// Re-exports
pub use config::{Options, RecoveryMode};
pub use error::{Error, Result};
pub use segment::Segment;
pub use store::Store;
