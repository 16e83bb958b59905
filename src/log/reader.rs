//! Streaming reads of log files, used for recovery, segment loading and
//! point reads.

use crate::error::{Error, Result};
use crate::log::record::{Record, RECORD_OVERHEAD, SIZE_PREFIX};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Reads records sequentially from a log file.
pub struct LogReader {
    reader: BufReader<File>,
    file_len: u64,
    position: u64,
}

impl LogReader {
    /// Open a log file for reading from the start.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(Error::Io)?;
        let file_len = file.metadata().map_err(Error::Io)?.len();
        Ok(Self { reader: BufReader::new(file), file_len, position: 0 })
    }

    /// Byte offset of the next unread record.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reposition the reader to an absolute byte offset.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(pos)).map_err(Error::Io)?;
        self.position = pos;
        Ok(())
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` on a clean end of stream at a record boundary.
    /// A partially present record is a corruption error, never a short
    /// read: the body is read with `read_exact`, which loops until the
    /// requested byte count is filled.
    pub fn read_next(&mut self) -> Result<Option<Record>> {
        if self.reader.fill_buf().map_err(Error::Io)?.is_empty() {
            return Ok(None);
        }

        let mut size_buf = [0u8; SIZE_PREFIX];
        self.read_fully(&mut size_buf)?;

        let total = u32::from_le_bytes(size_buf) as usize;
        if total < RECORD_OVERHEAD {
            return Err(Error::corruption(format!(
                "record size {} below minimum {}",
                total, RECORD_OVERHEAD
            )));
        }
        if self.position + total as u64 > self.file_len {
            return Err(Error::corruption(format!(
                "record at offset {} extends past end of file",
                self.position
            )));
        }

        let mut buf = vec![0u8; total];
        buf[..SIZE_PREFIX].copy_from_slice(&size_buf);
        self.read_fully(&mut buf[SIZE_PREFIX..])?;

        self.position += total as u64;

        Record::decode(&buf).map(Some)
    }

    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::corruption("truncated record at end of log")
            } else {
                Error::Io(e)
            }
        })
    }
}

/// Read the single record beginning at `offset` in `path`.
///
/// Returns `Ok(None)` when the offset lies at or past the end of the
/// file, which a caller doing a stateless point read treats as "the
/// record is no longer in this file".
pub fn read_record_at<P: AsRef<Path>>(path: P, offset: u64) -> Result<Option<Record>> {
    let mut reader = LogReader::open(path)?;
    reader.seek(offset)?;
    reader.read_next()
}
