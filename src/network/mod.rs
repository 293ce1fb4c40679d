//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread
//! - Worker thread pool for connections, fed over a crossbeam channel
//! - Commands routed through the shared `UrlStore`

mod server;
mod connection;

pub use server::{Server, ShutdownHandle};
pub use connection::{execute_command, Connection};
