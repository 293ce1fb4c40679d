//! Log Writer
//!
//! Handles appending records to the log file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::Result;
use super::{LogReader, Record};

/// Appends records to the log file
///
/// The file is opened with `append(true)`, so every write lands at the
/// current end of file regardless of where a reader has seeked the shared
/// handle.
pub struct LogWriter {
    file: File,
    path: PathBuf,
    sync_strategy: SyncStrategy,

    /// Records written since the last fsync
    uncommitted: usize,
}

impl LogWriter {
    /// Open or create a log file for reading and appending
    pub fn open(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            sync_strategy,
            uncommitted: 0,
        })
    }

    /// Append a record to the end of the log
    ///
    /// The frame is encoded up front and written with a single `write_all`.
    pub fn append(&mut self, record: &Record) -> Result<()> {
        let frame = record.serialize()?;
        self.file.write_all(&frame)?;
        self.uncommitted += 1;

        match self.sync_strategy {
            SyncStrategy::EveryWrite => self.sync()?,
            SyncStrategy::EveryNRecords { count } => {
                if self.uncommitted >= count {
                    self.sync()?;
                }
            }
        }

        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Number of records appended since the last sync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    /// Open a reader over the same file, positioned at offset 0
    pub fn reader(&self) -> Result<LogReader<BufReader<File>>> {
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(0))?;
        Ok(LogReader::new(BufReader::new(file)))
    }

    /// Current size of the log file in bytes
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if self.uncommitted == 0 {
            return;
        }
        if let Err(e) = self.file.sync_data() {
            tracing::warn!("Failed to sync log {} on close: {}", self.path.display(), e);
        }
    }
}
