//! TCP Server
//!
//! Accepts connections and dispatches to worker threads.
//!
//! Accepted connections wait on an unbounded queue until a worker is free.
//! The queue never blocks the acceptor; its depth is limited by
//! `max_connections`, which counts queued and served connections together.
//! Once the limit is reached new clients get an ERROR response and are
//! closed. On shutdown every open connection is closed so workers return.

use std::collections::HashMap;
use std::io::{self, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::protocol::{write_response, Response};
use crate::store::UrlStore;
use super::Connection;

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Sockets of accepted connections, by connection id
type OpenConnections = Arc<Mutex<HashMap<u64, TcpStream>>>;

/// TCP server for urlstore
pub struct Server {
    config: Config,
    store: Arc<UrlStore>,
    listener: Option<TcpListener>,
    shutdown: Arc<AtomicBool>,

    /// Connections accepted and not yet finished (queued or being served)
    active: Arc<AtomicUsize>,

    /// Clones of accepted sockets, closed on shutdown
    open: OpenConnections,
}

/// Cloneable handle that stops a running server
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Number of connections accepted and not yet finished
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl Server {
    /// Create a new server with the given config and store
    pub fn new(config: Config, store: Arc<UrlStore>) -> Self {
        Self {
            config,
            store,
            listener: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
            open: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Bind the listen address, returning the bound address
    ///
    /// `run` binds on its own; binding first lets callers learn the port
    /// when listening on `:0`.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        if let Some(listener) = &self.listener {
            return Ok(listener.local_addr()?);
        }

        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            StoreError::Network(format!("Failed to bind {}: {}", self.config.listen_addr, e))
        })?;
        listener.set_nonblocking(true)?;

        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Address the server is bound to, once bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&mut self) -> Result<()> {
        let addr = self.bind()?;
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => return Err(StoreError::Network("listener not bound".to_string())),
        };

        tracing::info!(
            "Listening on {} with {} workers (max {} connections)",
            addr,
            self.config.worker_threads,
            self.config.max_connections
        );

        let (sender, receiver) = channel::unbounded::<(u64, TcpStream)>();

        let workers: Vec<_> = (0..self.config.worker_threads)
            .map(|id| {
                let receiver = receiver.clone();
                let store = Arc::clone(&self.store);
                let shutdown = Arc::clone(&self.shutdown);
                let active = Arc::clone(&self.active);
                let open = Arc::clone(&self.open);
                let (read_ms, write_ms) = (self.config.read_timeout_ms, self.config.write_timeout_ms);

                thread::Builder::new()
                    .name(format!("urlstore-worker-{}", id))
                    .spawn(move || {
                        for (conn_id, stream) in receiver.iter() {
                            if !shutdown.load(Ordering::SeqCst) {
                                serve(stream, &store, read_ms, write_ms);
                            }
                            open.lock().remove(&conn_id);
                            active.fetch_sub(1, Ordering::SeqCst);
                        }
                    })
            })
            .collect::<io::Result<_>>()?;
        drop(receiver);

        let mut next_id: u64 = 0;
        while !self.shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if self.active.load(Ordering::SeqCst) >= self.config.max_connections {
                        tracing::warn!("Refusing {}: connection limit reached", peer);
                        refuse(stream);
                        continue;
                    }

                    let tracked = match stream.set_nonblocking(false).and_then(|_| stream.try_clone()) {
                        Ok(tracked) => tracked,
                        Err(e) => {
                            tracing::warn!("Failed to configure stream from {}: {}", peer, e);
                            continue;
                        }
                    };

                    let conn_id = next_id;
                    next_id += 1;
                    self.open.lock().insert(conn_id, tracked);
                    self.active.fetch_add(1, Ordering::SeqCst);

                    if sender.send((conn_id, stream)).is_err() {
                        self.open.lock().remove(&conn_id);
                        self.active.fetch_sub(1, Ordering::SeqCst);
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                }
            }
        }

        tracing::info!(
            "Shutting down, closing {} open connections",
            self.active.load(Ordering::SeqCst)
        );
        for stream in self.open.lock().values() {
            let _ = stream.shutdown(Shutdown::Both);
        }

        drop(sender);
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }

        self.store.sync()
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Handle for stopping the server from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown: Arc::clone(&self.shutdown),
            active: Arc::clone(&self.active),
        }
    }
}
fn serve(stream: TcpStream, store: &Arc<UrlStore>, read_ms: u64, write_ms: u64) {
    let mut connection = match Connection::new(stream, Arc::clone(store)) {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!("Failed to set up connection: {}", e);
            return;
        }
    };

    if let Err(e) = connection.set_timeouts(read_ms, write_ms) {
        tracing::warn!("Failed to set timeouts for {}: {}", connection.peer_addr(), e);
    }

    if let Err(e) = connection.handle() {
        tracing::debug!("Connection {} closed with error: {}", connection.peer_addr(), e);
    }
}

fn refuse(stream: TcpStream) {
    let _ = stream.set_nonblocking(false);
    let mut writer = BufWriter::new(stream);
    let _ = write_response(&mut writer, &Response::error("too many connections"));
}
