//! Log Replay
//!
//! Rebuilds state on startup by replaying the log from its first record.

use std::io::Read;
use std::path::Path;

use crate::error::{Result, StoreError};
use super::{LogReader, Record};

/// Replays a log, classifying how the stream ended
pub struct LogReplay;

/// Result of a replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayResult {
    /// Number of records successfully decoded and applied
    pub records_replayed: u64,

    /// Offset just past the last good record
    pub valid_len: u64,

    /// Stream ended inside a record (torn write)
    pub was_truncated: bool,

    /// A record failed its length, checksum, or decode check
    pub corrupted: bool,

    /// Why replay stopped early, if it did
    pub stop_reason: Option<String>,
}

impl ReplayResult {
    /// True when replay reached a clean end of stream
    pub fn is_clean(&self) -> bool {
        !self.was_truncated && !self.corrupted
    }

    /// Convert an early stop into the error it stopped on
    pub fn into_result(self) -> Result<u64> {
        if self.was_truncated {
            return Err(StoreError::PartialRecord {
                offset: self.valid_len,
            });
        }
        if self.corrupted {
            return Err(StoreError::LogCorruption {
                offset: self.valid_len,
                reason: self.stop_reason.unwrap_or_else(|| "unknown".to_string()),
            });
        }
        Ok(self.records_replayed)
    }
}

impl LogReplay {
    /// Decode records in append order, handing each to `apply`
    ///
    /// This will:
    /// 1. Apply every complete, checksummed record
    /// 2. Stop at clean end of stream, a torn tail, or the first corrupt record
    /// 3. Return the stop classification
    ///
    /// Only I/O errors other than a short stream are returned as `Err`.
    pub fn replay<R, F>(mut reader: LogReader<R>, mut apply: F) -> Result<ReplayResult>
    where
        R: Read,
        F: FnMut(Record),
    {
        let mut result = ReplayResult::default();

        loop {
            match reader.next_record() {
                Ok(Some(record)) => {
                    apply(record);
                    result.records_replayed += 1;
                }
                Ok(None) => break,
                Err(e @ StoreError::PartialRecord { .. }) => {
                    result.was_truncated = true;
                    result.stop_reason = Some(e.to_string());
                    break;
                }
                Err(e @ StoreError::LogCorruption { .. }) => {
                    result.corrupted = true;
                    result.stop_reason = Some(e.to_string());
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        result.valid_len = reader.position();
        Ok(result)
    }

    /// Verify integrity of a log file without building a store
    pub fn verify(path: &Path) -> Result<ReplayResult> {
        let reader = LogReader::open(path)?;
        Self::replay(reader, |_| {})
    }
}
