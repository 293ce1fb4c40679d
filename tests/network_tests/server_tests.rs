//! Server Tests
//!
//! These tests verify:
//! - Command execution against a store
//! - End-to-end PUT/GET/COUNT/PING over TCP
//! - Connection limit refusal
//! - Graceful shutdown, including with clients still connected

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel;
use tempfile::TempDir;
use urlstore::config::{Config, SyncStrategy};
use urlstore::network::{execute_command, Server, ShutdownHandle};
use urlstore::protocol::{read_response, write_command, Command, Response, Status};
use urlstore::UrlStore;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(temp_dir: &TempDir) -> Config {
    Config::builder()
        .log_path(temp_dir.path().join("store.log"))
        .sync_strategy(SyncStrategy::EveryWrite)
        .listen_addr("127.0.0.1:0")
        .worker_threads(2)
        .read_timeout_ms(2000)
        .build()
}

struct RunningServer {
    addr: SocketAddr,
    handle: ShutdownHandle,
    thread: JoinHandle<urlstore::Result<()>>,
    store: Arc<UrlStore>,
}

fn start_server(temp_dir: &TempDir) -> RunningServer {
    start_server_with(test_config(temp_dir))
}

fn start_server_with(config: Config) -> RunningServer {
    let store = Arc::new(UrlStore::open(config.clone()).unwrap());

    let mut server = Server::new(config, Arc::clone(&store));
    let addr = server.bind().unwrap();
    assert_eq!(server.local_addr(), Some(addr));
    let handle = server.shutdown_handle();
    let thread = thread::spawn(move || server.run());

    RunningServer { addr, handle, thread, store }
}

struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: BufWriter::new(stream),
        }
    }

    fn send(&mut self, command: Command) -> Response {
        write_command(&mut self.writer, &command).unwrap();
        read_response(&mut self.reader).unwrap()
    }
}

/// Poll `condition` until it holds or `timeout` passes
fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

// =============================================================================
// Command Execution Tests
// =============================================================================

#[test]
fn test_execute_put_and_get() {
    let temp_dir = TempDir::new().unwrap();
    let store = UrlStore::open(test_config(&temp_dir)).unwrap();

    let put = execute_command(&store, Command::Put { url: "http://a.com".to_string() });
    assert_eq!(put, Response::ok_text("0"));

    let get = execute_command(&store, Command::Get { key: "0".to_string() });
    assert_eq!(get, Response::ok_text("http://a.com"));
}

#[test]
fn test_execute_get_missing() {
    let temp_dir = TempDir::new().unwrap();
    let store = UrlStore::open(test_config(&temp_dir)).unwrap();

    let response = execute_command(&store, Command::Get { key: "nope".to_string() });
    assert_eq!(response.status, Status::NotFound);
}

#[test]
fn test_execute_put_collision_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let store = UrlStore::open(test_config(&temp_dir)).unwrap();
    store.set("1", "http://taken.com");

    let response = execute_command(&store, Command::Put { url: "http://b.com".to_string() });
    assert_eq!(response.status, Status::Error);
}

#[test]
fn test_execute_count_and_ping() {
    let temp_dir = TempDir::new().unwrap();
    let store = UrlStore::open(test_config(&temp_dir)).unwrap();
    store.put("http://a.com").unwrap();

    assert_eq!(execute_command(&store, Command::Count), Response::ok_text("1"));
    assert_eq!(execute_command(&store, Command::Ping), Response::ok_text("PONG"));
}

// =============================================================================
// Live Server Tests
// =============================================================================

#[test]
fn test_server_put_get_over_tcp() {
    let temp_dir = TempDir::new().unwrap();
    let server = start_server(&temp_dir);

    let mut client = Client::connect(server.addr);

    assert_eq!(client.send(Command::Ping), Response::ok_text("PONG"));

    let put = client.send(Command::Put { url: "http://a.com".to_string() });
    assert_eq!(put.status, Status::Ok);
    let key = put.payload_text().unwrap();

    let get = client.send(Command::Get { key: key.clone() });
    assert_eq!(get, Response::ok_text("http://a.com"));

    assert_eq!(client.send(Command::Count), Response::ok_text("1"));
    assert_eq!(server.store.get(&key), Some("http://a.com".to_string()));

    drop(client);
    server.handle.shutdown();
    server.thread.join().unwrap().unwrap();
}

#[test]
fn test_server_multiple_clients() {
    let temp_dir = TempDir::new().unwrap();
    let server = start_server(&temp_dir);

    let clients: Vec<_> = (0..4)
        .map(|i| {
            let addr = server.addr;
            thread::spawn(move || {
                let mut client = Client::connect(addr);
                let url = format!("http://client{}.com", i);
                let put = client.send(Command::Put { url: url.clone() });
                if put.status != Status::Ok {
                    return None;
                }
                let key = put.payload_text().unwrap();
                assert_eq!(client.send(Command::Get { key: key.clone() }), Response::ok_text(&url));
                Some(key)
            })
        })
        .collect();

    let minted: Vec<String> = clients
        .into_iter()
        .filter_map(|c| c.join().unwrap())
        .collect();

    assert_eq!(server.store.count(), minted.len());

    server.handle.shutdown();
    server.thread.join().unwrap().unwrap();
}

#[test]
fn test_server_data_survives_restart() {
    let temp_dir = TempDir::new().unwrap();

    let key = {
        let server = start_server(&temp_dir);
        let mut client = Client::connect(server.addr);
        let key = client
            .send(Command::Put { url: "http://persist.com".to_string() })
            .payload_text()
            .unwrap();
        drop(client);
        server.handle.shutdown();
        server.thread.join().unwrap().unwrap();
        key
    };

    let server = start_server(&temp_dir);
    let mut client = Client::connect(server.addr);
    assert_eq!(client.send(Command::Get { key }), Response::ok_text("http://persist.com"));

    drop(client);
    server.handle.shutdown();
    server.thread.join().unwrap().unwrap();
}

#[test]
fn test_server_bad_frame_gets_error_response() {
    use std::io::Write;

    let temp_dir = TempDir::new().unwrap();
    let server = start_server(&temp_dir);

    let mut stream = TcpStream::connect(server.addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(&[0x7F, 0, 0, 0, 0]).unwrap();

    let mut reader = BufReader::new(stream);
    let response = read_response(&mut reader).unwrap();
    assert_eq!(response.status, Status::Error);

    drop(reader);
    server.handle.shutdown();
    server.thread.join().unwrap().unwrap();
}

// =============================================================================
// Connection Limit Tests
// =============================================================================

#[test]
fn test_server_refuses_over_connection_limit() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        max_connections: 1,
        ..test_config(&temp_dir)
    };
    let server = start_server_with(config);

    let mut first = Client::connect(server.addr);
    assert_eq!(first.send(Command::Ping), Response::ok_text("PONG"));
    assert_eq!(server.handle.active_connections(), 1);

    let mut second = Client::connect(server.addr);
    let refused = read_response(&mut second.reader).unwrap();
    assert_eq!(refused, Response::error("too many connections"));
    assert_eq!(refused.status, Status::Error);

    // The first client is unaffected
    assert_eq!(first.send(Command::Count), Response::ok_text("0"));

    drop(first);
    assert!(wait_until(Duration::from_secs(5), || server.handle.active_connections() == 0));

    // A slot is free again
    let mut third = Client::connect(server.addr);
    assert_eq!(third.send(Command::Ping), Response::ok_text("PONG"));

    drop(third);
    drop(second);
    server.handle.shutdown();
    server.thread.join().unwrap().unwrap();
}

#[test]
fn test_server_queues_connections_beyond_workers() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        worker_threads: 1,
        max_connections: 10,
        ..test_config(&temp_dir)
    };
    let server = start_server_with(config);

    let mut first = Client::connect(server.addr);
    assert_eq!(first.send(Command::Ping), Response::ok_text("PONG"));

    // Waits behind the first client instead of being refused
    let mut second = Client::connect(server.addr);
    write_command(&mut second.writer, &Command::Ping).unwrap();
    assert!(wait_until(Duration::from_secs(5), || server.handle.active_connections() == 2));

    drop(first);
    assert_eq!(read_response(&mut second.reader).unwrap(), Response::ok_text("PONG"));

    drop(second);
    server.handle.shutdown();
    server.thread.join().unwrap().unwrap();
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_server_shutdown_with_connected_clients() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        worker_threads: 1,
        max_connections: 100,
        read_timeout_ms: 0,
        ..test_config(&temp_dir)
    };
    let server = start_server_with(config);

    let mut served = Client::connect(server.addr);
    assert_eq!(served.send(Command::Ping), Response::ok_text("PONG"));

    let _queued: Vec<Client> = (0..2).map(|_| Client::connect(server.addr)).collect();
    assert!(wait_until(Duration::from_secs(5), || server.handle.active_connections() == 3));

    let (done_tx, done_rx) = channel::bounded(1);
    let RunningServer { handle, thread: server_thread, .. } = server;
    thread::spawn(move || {
        let _ = done_tx.send(server_thread.join().unwrap());
    });

    handle.shutdown();
    let result = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("run() did not return after shutdown");
    result.unwrap();
    assert_eq!(handle.active_connections(), 0);

    // The served client sees its connection closed
    assert!(read_response(&mut served.reader).is_err());
}
