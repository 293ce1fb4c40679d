//! Log Reader
//!
//! Handles reading records from the log file in append order.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::error::{Result, StoreError};
use super::record::{check_len, decode_data, parse_header};
use super::{Record, HEADER_SIZE};

/// Reads records sequentially from a log stream
pub struct LogReader<R> {
    reader: R,

    /// Byte offset of the next record boundary
    position: u64,

    /// Set once the iterator has yielded an error
    failed: bool,
}

impl LogReader<BufReader<File>> {
    /// Open a log file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> LogReader<R> {
    /// Wrap a stream positioned at a record boundary
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
            failed: false,
        }
    }

    /// Offset just past the last fully decoded record
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next record from the log
    ///
    /// Returns:
    /// - `Ok(Some(record))`: a complete, checksummed record
    /// - `Ok(None)`: clean end of stream at a record boundary
    /// - `Err(PartialRecord)`: the stream ends inside a record
    /// - `Err(LogCorruption)`: bad length, checksum, or body
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let start = self.position;

        let mut header = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header)?;
        if read == 0 {
            return Ok(None);
        }
        if read < HEADER_SIZE {
            return Err(StoreError::PartialRecord { offset: start });
        }

        let (crc, len) = parse_header(&header);
        check_len(len, start)?;

        let mut data = vec![0u8; len];
        if read_full(&mut self.reader, &mut data)? < len {
            return Err(StoreError::PartialRecord { offset: start });
        }

        let record = decode_data(crc, &data, start)?;
        self.position += (HEADER_SIZE + len) as u64;

        Ok(Some(record))
    }
}

impl<R: Read> Iterator for LogReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the stream allows, returning the bytes read
///
/// Unlike `read_exact`, a short stream is not an error here: the caller
/// decides whether it is a clean end or a torn record.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
