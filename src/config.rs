//! Configuration options for the segkv store.

/// Default rotation threshold for the active log (10 MiB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Default capacity of the write request queue.
pub const DEFAULT_WRITE_QUEUE_DEPTH: usize = 100;

/// How recovery reacts to a decode error in the middle of the active log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMode {
    /// Refuse to open the store on a corrupt log.
    Strict,

    /// Truncate the log to the last valid record boundary and continue.
    /// Intended for torn tail writes left behind by a crash.
    TruncateTail,
}

/// Configuration options for opening a store.
#[derive(Debug, Clone)]
pub struct Options {
    /// Size threshold at which the active log is sealed into a segment
    /// (in bytes).
    /// Default: 10 MiB
    pub max_log_size: u64,

    /// Capacity of the bounded queue feeding the writer.
    /// Default: 100
    pub write_queue_depth: usize,

    /// Recovery policy for a corrupt active log.
    /// Default: RecoveryMode::Strict
    pub recovery: RecoveryMode,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_log_size: DEFAULT_MAX_LOG_SIZE,
            write_queue_depth: DEFAULT_WRITE_QUEUE_DEPTH,
            recovery: RecoveryMode::Strict,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the active log rotation threshold.
    pub fn max_log_size(mut self, size: u64) -> Self {
        self.max_log_size = size;
        self
    }

    /// Sets the write queue capacity.
    pub fn write_queue_depth(mut self, depth: usize) -> Self {
        self.write_queue_depth = depth;
        self
    }

    /// Sets the recovery policy.
    pub fn recovery(mut self, mode: RecoveryMode) -> Self {
        self.recovery = mode;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_log_size == 0 {
            return Err(crate::Error::invalid_argument("max_log_size must be > 0"));
        }
        if self.write_queue_depth == 0 {
            return Err(crate::Error::invalid_argument("write_queue_depth must be > 0"));
        }
        Ok(())
    }
}
