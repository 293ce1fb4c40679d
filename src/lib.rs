//! # urlstore
//!
//! A small URL shortener store with:
//! - An append-only log for durability
//! - Startup replay that tolerates a torn or corrupt tail
//! - Shared-read / exclusive-insert concurrency over one in-memory map
//! - Keys minted from the entry count (base 62 by default)
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                             │
//! │                  (Multiple Clients)                         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     UrlStore                                │
//! │        get/count: read lock   set: write lock               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Log        │          │  KeyGen     │
//!   │  (Append)   │          │  (Base62)   │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod log;
pub mod keygen;
pub mod store;
pub mod network;
pub mod protocol;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StoreError};
pub use config::{Config, SyncStrategy};
pub use keygen::{Base62KeyGenerator, KeyGenerator};
pub use store::UrlStore;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of urlstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
