//! End-to-end tests: a real server on an ephemeral port, driven over TCP.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use protocol_memcache::Request;
use server::{Config, ServerHandle};
use slab_cache::SlabRouter;

/// Start a server on an ephemeral port with a small (two page) budget.
fn start_server() -> ServerHandle {
    let mut config = Config::default();
    config.listener.address = "127.0.0.1:0".parse().unwrap();
    config.cache.max_bytes = 32 * 1024 * 1024;

    let cache = Arc::new(
        SlabRouter::builder()
            .max_bytes(config.cache.max_bytes)
            .lookup_threads(2)
            .build()
            .expect("failed to build cache"),
    );
    server::spawn(&config, cache).expect("failed to start server")
}

fn connect(handle: &ServerHandle) -> TcpStream {
    let stream = TcpStream::connect(handle.local_addr()).expect("connect");
    stream.set_nodelay(true).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

fn read_exactly(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).expect("response");
    buf
}

fn send_set(stream: &mut TcpStream, key: &[u8], value: &[u8], flags: u16) {
    let mut buf = vec![0u8; value.len() + key.len() + 64];
    let len = Request::set(key, value).flags(flags).encode(&mut buf);
    stream.write_all(&buf[..len]).unwrap();
}

fn send_get(stream: &mut TcpStream, key: &[u8]) {
    let mut buf = vec![0u8; key.len() + 16];
    let len = Request::get(key).encode(&mut buf);
    stream.write_all(&buf[..len]).unwrap();
}

fn expect(stream: &mut TcpStream, expected: &[u8]) {
    assert_eq!(read_exactly(stream, expected.len()), expected);
}

#[test]
fn test_set_then_get_hit() {
    let handle = start_server();
    let mut conn = connect(&handle);

    send_set(&mut conn, b"foo", b"hello", 1);
    expect(&mut conn, b"STORED\r\n");

    send_get(&mut conn, b"foo");
    expect(&mut conn, b"VALUE foo 1 5\r\nhello\r\nEND\r\n");
}

#[test]
fn test_get_miss() {
    let handle = start_server();
    let mut conn = connect(&handle);

    send_get(&mut conn, b"missing");
    expect(&mut conn, b"END\r\n");
}

#[test]
fn test_zero_byte_value() {
    let handle = start_server();
    let mut conn = connect(&handle);

    conn.write_all(b"set empty 0 0 0\r\n\r\n").unwrap();
    expect(&mut conn, b"STORED\r\n");

    send_get(&mut conn, b"empty");
    expect(&mut conn, b"VALUE empty 0 0\r\n\r\nEND\r\n");
}

#[test]
fn test_oversize_value_is_not_stored() {
    let handle = start_server();
    let mut conn = connect(&handle);

    // 4 MiB of payload serializes past the largest slab class.
    let payload = vec![b'x'; 4 * 1024 * 1024];
    send_set(&mut conn, b"big", &payload, 0);
    expect(&mut conn, b"NOT_STORED\r\n");

    send_get(&mut conn, b"big");
    expect(&mut conn, b"END\r\n");
}

#[test]
fn test_unknown_verb_errors_and_closes() {
    let handle = start_server();
    let mut conn = connect(&handle);

    conn.write_all(b"del foo\r\n").unwrap();
    expect(&mut conn, b"ERROR\r\n");

    // The server closed its end afterward.
    let mut rest = Vec::new();
    assert_eq!(conn.read_to_end(&mut rest).unwrap(), 0);
}

#[test]
fn test_pipelined_commands() {
    let handle = start_server();
    let mut conn = connect(&handle);

    // Two complete commands in a single write.
    conn.write_all(b"set a 0 0 1\r\nx\r\nset b 0 0 1\r\ny\r\n")
        .unwrap();
    expect(&mut conn, b"STORED\r\nSTORED\r\n");

    send_get(&mut conn, b"a");
    expect(&mut conn, b"VALUE a 0 1\r\nx\r\nEND\r\n");
    send_get(&mut conn, b"b");
    expect(&mut conn, b"VALUE b 0 1\r\ny\r\nEND\r\n");
}

#[test]
fn test_noreply_set() {
    let handle = start_server();
    let mut conn = connect(&handle);

    let mut buf = [0u8; 64];
    let len = Request::set(b"quiet", b"hi").noreply().encode(&mut buf);
    conn.write_all(&buf[..len]).unwrap();

    // No response for the set; the first bytes back answer the get.
    send_get(&mut conn, b"quiet");
    expect(&mut conn, b"VALUE quiet 0 2\r\nhi\r\nEND\r\n");
}

#[test]
fn test_exptime_is_accepted_and_ignored() {
    let handle = start_server();
    let mut conn = connect(&handle);

    let mut buf = [0u8; 64];
    let len = Request::set(b"k", b"v").exptime(-1).encode(&mut buf);
    conn.write_all(&buf[..len]).unwrap();
    expect(&mut conn, b"STORED\r\n");

    send_get(&mut conn, b"k");
    expect(&mut conn, b"VALUE k 0 1\r\nv\r\nEND\r\n");
}

#[test]
fn test_malformed_header_is_client_error() {
    let handle = start_server();
    let mut conn = connect(&handle);

    conn.write_all(b"set foo 1 0\r\n").unwrap();

    let mut buf = vec![0u8; 256];
    let n = conn.read(&mut buf).unwrap();
    assert!(buf[..n].starts_with(b"CLIENT_ERROR "));

    // The connection survives a client error.
    send_get(&mut conn, b"foo");
    expect(&mut conn, b"END\r\n");
}

#[test]
fn test_value_spanning_multiple_reads() {
    let handle = start_server();
    let mut conn = connect(&handle);

    // A payload comfortably larger than a socket buffer.
    let payload: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8 + 1).collect();
    send_set(&mut conn, b"large", &payload, 9);
    expect(&mut conn, b"STORED\r\n");

    send_get(&mut conn, b"large");
    let header = format!("VALUE large 9 {}\r\n", payload.len());
    expect(&mut conn, header.as_bytes());
    assert_eq!(read_exactly(&mut conn, payload.len()), payload);
    expect(&mut conn, b"\r\nEND\r\n");
}

#[test]
fn test_concurrent_connections_distinct_keys() {
    let handle = start_server();
    let handle = Arc::new(handle);

    let mut threads = Vec::new();
    for worker in 0..4u16 {
        let handle = handle.clone();
        threads.push(thread::spawn(move || {
            let mut conn = connect(&handle);
            let padding = "x".repeat(180);
            for round in 0..50u16 {
                let key = format!("w{}-{}", worker, round % 5);
                let value = format!("value-{}-{}-{}", worker, round, padding);
                send_set(&mut conn, key.as_bytes(), value.as_bytes(), worker);
                expect(&mut conn, b"STORED\r\n");

                send_get(&mut conn, key.as_bytes());
                let expected = format!(
                    "VALUE {} {} {}\r\n{}\r\nEND\r\n",
                    key,
                    worker,
                    value.len(),
                    value
                );
                expect(&mut conn, expected.as_bytes());
            }
        }));
    }
    for thread in threads {
        thread.join().unwrap();
    }
}

#[test]
fn test_graceful_shutdown() {
    let handle = start_server();
    let addr = handle.local_addr();

    // Server answers before shutdown.
    let mut conn = connect(&handle);
    send_get(&mut conn, b"anything");
    expect(&mut conn, b"END\r\n");
    drop(conn);

    handle.shutdown();

    // The listening socket is gone; new connections are refused (or, at
    // worst, accepted by nothing and reset).
    thread::sleep(Duration::from_millis(50));
    let refused = match TcpStream::connect(addr) {
        Err(_) => true,
        Ok(mut stream) => {
            stream
                .set_read_timeout(Some(Duration::from_millis(500)))
                .unwrap();
            stream.write_all(b"get x\r\n").is_err()
                || stream.read(&mut [0u8; 1]).map(|n| n == 0).unwrap_or(true)
        }
    };
    assert!(refused, "server still serving after shutdown");
}
