//! Append-Only Log Module
//!
//! Provides durability for the store through an append-only record log.
//!
//! ## Responsibilities
//! - Append one record per successful insertion
//! - CRC32 checksums for corruption detection
//! - Replay on startup, stopping cleanly at a torn or corrupt tail
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Record 1                             │
//! │ ┌─────────┬─────────┬──────────────┐ │
//! │ │ CRC (4) │ Len (4) │ Data (Len)   │ │
//! │ └─────────┴─────────┴──────────────┘ │
//! ├──────────────────────────────────────┤
//! │ Record 2                             │
//! │ ┌─────────┬─────────┬──────────────┐ │
//! │ │ CRC (4) │ Len (4) │ Data (Len)   │ │
//! │ └─────────┴─────────┴──────────────┘ │
//! └──────────────────────────────────────┘
//! ```
//!
//! `Data` is the bincode encoding of a [`Record`]. Integers are little-endian.
//! The log is only ever appended to; it is never rewritten or truncated.

mod record;
mod writer;
mod reader;
mod replay;

pub use record::{Record, HEADER_SIZE, MAX_RECORD_SIZE};
pub use writer::LogWriter;
pub use reader::LogReader;
pub use replay::{LogReplay, ReplayResult};
