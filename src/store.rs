//! Store Module
//!
//! The URL store: an in-memory key → URL map backed by the append-only log.
//!
//! ## Responsibilities
//! - Concurrent lookups under a shared lock
//! - Atomic insert-if-absent under an exclusive lock
//! - Mint keys from the entry count and persist every new entry
//! - Rebuild the map from the log on startup

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::Result;
use crate::keygen::{Base62KeyGenerator, KeyGenerator};
use crate::log::{LogReplay, LogWriter, Record};

/// The URL store
///
/// ## Concurrency Model
///
/// - **Reads** (get/count): shared lock on `urls`, many at once
/// - **Inserts** (set): exclusive lock on `urls`; the presence check and the
///   insert happen under the same guard, so exactly one racer wins a key
/// - **Appends** (save): serialized by the `log` mutex, independent of `urls`
///
/// Keys are never overwritten or removed once present.
pub struct UrlStore {
    /// key → url
    urls: RwLock<HashMap<String, String>>,

    /// Append-only log (exclusive access needed)
    log: Mutex<LogWriter>,

    /// Derives candidate keys from the entry count
    keygen: Box<dyn KeyGenerator>,

    config: Config,
}

impl UrlStore {
    /// Open or create a store with the default base-62 key generator
    ///
    /// On startup:
    /// 1. Open/create the log file (failure is returned)
    /// 2. Replay the log into the map (failure is logged, not returned)
    pub fn open(config: Config) -> Result<Self> {
        Self::with_key_generator(config, Base62KeyGenerator)
    }

    /// Open or create a store with a custom key generator
    pub fn with_key_generator(config: Config, keygen: impl KeyGenerator) -> Result<Self> {
        config.validate()?;

        let log = LogWriter::open(&config.log_path, config.sync_strategy)?;

        let store = Self {
            urls: RwLock::new(HashMap::new()),
            log: Mutex::new(log),
            keygen: Box::new(keygen),
            config,
        };

        match store.load() {
            Ok(replayed) => {
                tracing::info!(
                    "Opened store {}: {} records replayed",
                    store.log_path().display(),
                    replayed
                );
            }
            Err(e) => {
                // Replay stops at the damage and the log is never truncated,
                // so new appends land behind a record replay cannot pass
                tracing::warn!(
                    "Error loading store {}: {} ({} entries recovered); \
                     entries added from now on will not survive a restart \
                     until the log is repaired",
                    store.log_path().display(),
                    e,
                    store.count()
                );
            }
        }

        Ok(store)
    }

    /// Open with a log path (convenience method)
    ///
    /// Uses default config with the specified log file
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().log_path(path).build())
    }

    /// Look up the url stored under `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.urls.read().get(key).cloned()
    }

    /// Insert `url` under `key` if the key is not present yet
    ///
    /// Returns `false` without touching the map when the key exists.
    pub fn set(&self, key: impl Into<String>, url: impl Into<String>) -> bool {
        match self.urls.write().entry(key.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(url.into());
                true
            }
        }
    }

    /// Number of entries in the map
    pub fn count(&self) -> usize {
        self.urls.read().len()
    }

    /// Store a new url under a freshly generated key
    ///
    /// Steps:
    /// 1. Generate a candidate key from the current count
    /// 2. Insert it with `set`
    /// 3. Append the record to the log; a failed append is logged and the
    ///    key is still returned
    ///
    /// On collision the next candidate comes from `count + attempt`, up to
    /// `put_attempts` candidates in total. Returns `None` when all collide.
    pub fn put(&self, url: &str) -> Option<String> {
        let attempts = self.config.put_attempts;

        for attempt in 0..attempts {
            let key = self.keygen.generate(self.count() + attempt);

            if self.set(key.as_str(), url) {
                if let Err(e) = self.save(&key, url) {
                    tracing::error!("Error saving {} to log: {}", key, e);
                }
                return Some(key);
            }

            tracing::debug!("Key collision on {} (attempt {}/{})", key, attempt + 1, attempts);
        }

        tracing::warn!("Put failed: {} key candidates collided", attempts);
        None
    }

    /// Replay the log into the map
    ///
    /// Records are applied with `set`, so a key repeated in the log keeps its
    /// first url. Returns the number of records replayed on a clean end of
    /// stream; a torn or corrupt record stops replay and is returned as an
    /// error after every earlier record has been applied.
    pub fn load(&self) -> Result<u64> {
        let reader = self.log.lock().reader()?;

        let result = LogReplay::replay(reader, |record| {
            if !self.set(record.key.as_str(), record.url) {
                tracing::debug!("Duplicate key {} in log, keeping first", record.key);
            }
        })?;

        result.into_result()
    }

    /// Append one record to the end of the log
    pub fn save(&self, key: &str, url: &str) -> Result<()> {
        self.log.lock().append(&Record::new(key, url))
    }

    /// Force appended records to disk
    pub fn sync(&self) -> Result<()> {
        self.log.lock().sync()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the log file path
    pub fn log_path(&self) -> &Path {
        &self.config.log_path
    }

    /// Get the log file size in bytes
    pub fn log_len(&self) -> Result<u64> {
        self.log.lock().len()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl std::fmt::Debug for UrlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlStore")
            .field("log_path", &self.config.log_path)
            .field("count", &self.count())
            .finish()
    }
}
