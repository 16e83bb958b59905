//! On-disk record format.
//!
//! Each record is self-delimited by a leading size prefix:
//!
//! ```text
//! [total size: u32][key len: u32][key][value len: u32][value][checksum: 20 bytes]
//! ```
//!
//! All integers are little-endian. Total size includes the header, so a
//! record occupies `key len + value len + 32` bytes and can be skipped
//! without decoding it. The checksum is a 160-bit digest of the value
//! bytes; computing and verifying it is the store's job, the codec only
//! carries it.

use crate::error::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};

/// Width of the stored checksum in bytes (a 160-bit digest).
pub const CHECKSUM_SIZE: usize = 20;

/// Width of the leading size prefix.
pub const SIZE_PREFIX: usize = 4;

/// Fixed per-record overhead: three u32 length fields plus the checksum.
pub const RECORD_OVERHEAD: usize = 3 * 4 + CHECKSUM_SIZE;

/// One key/value/checksum unit of a log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The user key.
    pub key: Vec<u8>,
    /// The user value.
    pub value: Vec<u8>,
    /// 160-bit digest of the value bytes.
    pub checksum: [u8; CHECKSUM_SIZE],
}

impl Record {
    /// Create a record from its parts.
    pub fn new(key: Vec<u8>, value: Vec<u8>, checksum: [u8; CHECKSUM_SIZE]) -> Self {
        Self { key, value, checksum }
    }

    /// Total encoded size of this record in bytes.
    pub fn encoded_len(&self) -> usize {
        self.key.len() + self.value.len() + RECORD_OVERHEAD
    }

    /// Encode the record into its on-disk layout.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let total = self.encoded_len();
        if self.key.len() > u32::MAX as usize
            || self.value.len() > u32::MAX as usize
            || total > u32::MAX as usize
        {
            return Err(Error::invalid_argument("record too large for u32 length fields"));
        }

        let mut buf = BytesMut::with_capacity(total);
        buf.put_u32_le(total as u32);
        buf.put_u32_le(self.key.len() as u32);
        buf.put_slice(&self.key);
        buf.put_u32_le(self.value.len() as u32);
        buf.put_slice(&self.value);
        buf.put_slice(&self.checksum);

        Ok(buf.to_vec())
    }

    /// Decode a record from a full encoded buffer, size prefix included.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let full_len = data.len();
        if full_len < RECORD_OVERHEAD {
            return Err(Error::corruption(format!("record too short: {} bytes", full_len)));
        }

        let mut data = data;
        let total = data.get_u32_le() as usize;
        if total != full_len {
            return Err(Error::corruption(format!(
                "record size mismatch: header says {}, buffer holds {}",
                total, full_len
            )));
        }

        let key_len = data.get_u32_le() as usize;
        if data.remaining() < key_len + SIZE_PREFIX {
            return Err(Error::corruption(format!(
                "key length {} exceeds record body",
                key_len
            )));
        }
        let key = data.copy_to_bytes(key_len).to_vec();

        let value_len = data.get_u32_le() as usize;
        if data.remaining() != value_len + CHECKSUM_SIZE {
            return Err(Error::corruption(format!(
                "value length {} does not match record body",
                value_len
            )));
        }
        let value = data.copy_to_bytes(value_len).to_vec();

        let mut checksum = [0u8; CHECKSUM_SIZE];
        data.copy_to_slice(&mut checksum);

        Ok(Self { key, value, checksum })
    }
}
