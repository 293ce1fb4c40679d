//! urlstore Server Binary
//!
//! Opens the store and serves it over TCP.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use urlstore::network::Server;
use urlstore::{Config, SyncStrategy, UrlStore};

/// urlstore Server
#[derive(Parser, Debug)]
#[command(name = "urlstore-server")]
#[command(about = "URL shortener store backed by an append-only log")]
#[command(version)]
struct Args {
    /// Log file backing the store
    #[arg(short = 'f', long, default_value = "./urlstore.log")]
    log_file: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7070")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Connection worker threads
    #[arg(short, long, default_value = "8")]
    workers: usize,

    /// fsync after this many records (1 syncs every write)
    #[arg(short, long, default_value = "100")]
    sync_every: usize,

    /// Key candidates tried per put before reporting a collision
    #[arg(short, long, default_value = "1")]
    put_attempts: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,urlstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("urlstore Server v{}", urlstore::VERSION);
    tracing::info!("Log file: {}", args.log_file);
    tracing::info!("Listen address: {}", args.listen);

    let sync_strategy = if args.sync_every <= 1 {
        SyncStrategy::EveryWrite
    } else {
        SyncStrategy::EveryNRecords { count: args.sync_every }
    };

    let config = Config::builder()
        .log_path(&args.log_file)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .worker_threads(args.workers)
        .sync_strategy(sync_strategy)
        .put_attempts(args.put_attempts)
        .build();

    // The process cannot run without a store
    let store = match UrlStore::open(config.clone()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Error opening store: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Store ready with {} entries", store.count());

    let mut server = Server::new(config, store);
    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
