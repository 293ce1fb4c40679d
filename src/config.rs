//! Configuration for urlstore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StoreError};

/// Main configuration for a urlstore instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Path of the append-only log backing the store.
    /// Created on first open, never rewritten.
    pub log_path: PathBuf,

    /// Sync strategy: how often to fsync the log
    pub sync_strategy: SyncStrategy,

    /// How many key candidates `put` tries before giving up.
    /// `1` means a collision fails immediately.
    pub put_attempts: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max open client connections, queued and served together
    ///
    /// At most `worker_threads` are served at once; the rest wait for a
    /// free worker. Connections beyond this limit are refused.
    pub max_connections: usize,

    /// Number of connection worker threads
    pub worker_threads: usize,

    /// Connection read timeout (milliseconds, 0 disables)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 disables)
    pub write_timeout_ms: u64,
}

/// Log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced records (balanced durability/performance)
    EveryNRecords { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("./urlstore.log"),
            sync_strategy: SyncStrategy::EveryNRecords { count: 100 },
            put_attempts: 1,
            listen_addr: "127.0.0.1:7070".to_string(),
            max_connections: 1024,
            worker_threads: 8,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the store and server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.put_attempts == 0 {
            return Err(StoreError::Config("put_attempts must be at least 1".to_string()));
        }
        if self.worker_threads == 0 {
            return Err(StoreError::Config("worker_threads must be at least 1".to_string()));
        }
        if self.max_connections == 0 {
            return Err(StoreError::Config("max_connections must be at least 1".to_string()));
        }
        if let SyncStrategy::EveryNRecords { count: 0 } = self.sync_strategy {
            return Err(StoreError::Config(
                "sync_strategy record count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the log file path
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_path = path.into();
        self
    }

    /// Set the log sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set how many key candidates `put` tries on collision
    pub fn put_attempts(mut self, attempts: usize) -> Self {
        self.config.put_attempts = attempts;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the number of connection worker threads
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
