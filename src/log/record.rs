//! Log record definitions
//!
//! Defines a single durable insertion and its on-disk framing.

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Header size: CRC (4 bytes) + data length (4 bytes)
pub const HEADER_SIZE: usize = 8;

/// Largest encoded record body accepted on write or replay (1 MB)
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

/// One durable (key, url) insertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub url: String,
}

impl Record {
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
        }
    }

    /// Encode the record as one framed log entry
    ///
    /// Format: crc (4) + len (4) + bincode data
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        if data.len() > MAX_RECORD_SIZE {
            return Err(StoreError::RecordTooLarge {
                size: data.len(),
                max: MAX_RECORD_SIZE,
            });
        }

        let mut frame = BytesMut::with_capacity(HEADER_SIZE + data.len());
        frame.put_u32_le(crc32fast::hash(&data));
        frame.put_u32_le(data.len() as u32);
        frame.put_slice(&data);

        Ok(frame.to_vec())
    }

    /// Decode one framed log entry from the start of `bytes`
    ///
    /// Trailing bytes after the frame are ignored.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::PartialRecord { offset: 0 });
        }

        let (crc, len) = parse_header(&bytes[..HEADER_SIZE]);
        check_len(len, 0)?;

        let end = HEADER_SIZE + len;
        if bytes.len() < end {
            return Err(StoreError::PartialRecord { offset: 0 });
        }

        decode_data(crc, &bytes[HEADER_SIZE..end], 0)
    }
}

/// Split a frame header into (crc, data length)
pub(crate) fn parse_header(mut header: &[u8]) -> (u32, usize) {
    let crc = header.get_u32_le();
    let len = header.get_u32_le() as usize;
    (crc, len)
}

/// Reject lengths no writer could have produced
pub(crate) fn check_len(len: usize, offset: u64) -> Result<()> {
    if len > MAX_RECORD_SIZE {
        return Err(StoreError::LogCorruption {
            offset,
            reason: format!("record length {} exceeds max {}", len, MAX_RECORD_SIZE),
        });
    }
    Ok(())
}

/// Verify the checksum and decode a record body
pub(crate) fn decode_data(crc: u32, data: &[u8], offset: u64) -> Result<Record> {
    let actual = crc32fast::hash(data);
    if actual != crc {
        return Err(StoreError::LogCorruption {
            offset,
            reason: format!("checksum mismatch: expected {:08x}, got {:08x}", crc, actual),
        });
    }

    bincode::deserialize(data).map_err(|e| StoreError::LogCorruption {
        offset,
        reason: format!("undecodable record: {}", e),
    })
}
