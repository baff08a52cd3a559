//! Non-blocking accept loop feeding the worker pool.
//!
//! One acceptor thread owns the poller. It accepts new connections and,
//! when a connection becomes readable, clears that connection's interest
//! (so no second worker can be dispatched for the same channel) and hands
//! it to the worker pool. The worker runs dispatcher turns, then re-arms
//! read interest or drops the connection.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cache_core::Cache;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Registry, Token};
use parking_lot::Mutex;

use crate::config::Config;
use crate::dispatch::{self, Turn};
use crate::metrics;
use crate::workers::WorkerPool;

const LISTENER: Token = Token(0);

/// Poll timeout; short, so the loop notices shutdown promptly.
const POLL_TIMEOUT: Duration = Duration::from_millis(2);

/// How long shutdown waits for in-flight requests to drain.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(60);

type ConnMap = Arc<Mutex<HashMap<Token, Arc<Mutex<TcpStream>>>>>;

/// Handle to a running server.
///
/// The server is started by [`spawn`]; dropping the handle (or calling
/// [`shutdown`](Self::shutdown)) stops it: the listening socket closes
/// first, in-flight requests drain for up to a minute, then remaining
/// client connections are dropped.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// The bound address (useful when the configured port is 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal shutdown and wait for the acceptor to drain and stop.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.acceptor.take() {
            let _ = handle.join();
        }
    }
}

/// Bind the configured address and start the acceptor and worker pool.
pub fn spawn<C: Cache + 'static>(config: &Config, cache: Arc<C>) -> io::Result<ServerHandle> {
    let mut listener = TcpListener::bind(config.listener.address)?;
    let local_addr = listener.local_addr()?;
    let poll = Poll::new()?;
    poll.registry()
        .register(&mut listener, LISTENER, Interest::READABLE)?;

    let workers = WorkerPool::new(
        config.core_workers(),
        config.max_workers(),
        config.workers.queue_depth,
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let acceptor = thread::Builder::new()
        .name("acceptor".to_string())
        .spawn(move || {
            if let Err(e) = accept_loop(poll, listener, cache, workers, flag) {
                tracing::error!(error = %e, "acceptor failed");
            }
        })?;

    tracing::info!(address = %local_addr, "listening");
    Ok(ServerHandle {
        local_addr,
        shutdown,
        acceptor: Some(acceptor),
    })
}

fn accept_loop<C: Cache + 'static>(
    mut poll: Poll,
    listener: TcpListener,
    cache: Arc<C>,
    workers: WorkerPool,
    shutdown: Arc<AtomicBool>,
) -> io::Result<()> {
    let registry = Arc::new(poll.registry().try_clone()?);
    let connections: ConnMap = Arc::new(Mutex::new(HashMap::new()));
    let mut events = Events::with_capacity(1024);
    let mut next_token = LISTENER.0 + 1;

    while !shutdown.load(Ordering::Acquire) {
        if let Err(e) = poll.poll(&mut events, Some(POLL_TIMEOUT)) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(e);
        }

        for event in events.iter() {
            match event.token() {
                LISTENER => {
                    accept_ready(&listener, &registry, &connections, &mut next_token);
                }
                token => {
                    let conn = connections.lock().get(&token).cloned();
                    let Some(conn) = conn else {
                        // Stale event for a connection a worker already
                        // dropped.
                        continue;
                    };
                    {
                        let mut stream = conn.lock();
                        if let Err(e) = registry.deregister(&mut *stream) {
                            tracing::debug!(error = %e, "deregister failed");
                        }
                    }
                    let cache = cache.clone();
                    let registry = registry.clone();
                    let connections = connections.clone();
                    workers.execute(move || {
                        serve_turns(conn, token, &*cache, &registry, &connections);
                    });
                }
            }
        }
    }

    // Shutdown: stop accepting first, then drain the workers, then drop
    // whatever client channels remain.
    drop(listener);
    drop(poll);
    workers.shutdown(SHUTDOWN_WAIT);
    connections.lock().clear();
    tracing::info!("acceptor stopped");
    Ok(())
}

fn accept_ready(
    listener: &TcpListener,
    registry: &Registry,
    connections: &ConnMap,
    next_token: &mut usize,
) {
    loop {
        match listener.accept() {
            Ok((mut stream, peer)) => {
                metrics::CONNECTIONS_ACCEPTED.increment();
                let token = Token(*next_token);
                *next_token += 1;
                if let Err(e) = registry.register(&mut stream, token, Interest::READABLE) {
                    tracing::warn!(error = %e, "failed to register connection");
                    continue;
                }
                metrics::CONNECTIONS_ACTIVE.increment();
                tracing::debug!(%peer, token = token.0, "accepted connection");
                connections.lock().insert(token, Arc::new(Mutex::new(stream)));
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                break;
            }
        }
    }
}

/// Worker-side: run dispatcher turns until the connection has no buffered
/// request left, then re-arm read interest; drop the connection on close.
fn serve_turns<C: Cache>(
    conn: Arc<Mutex<TcpStream>>,
    token: Token,
    cache: &C,
    registry: &Registry,
    connections: &ConnMap,
) {
    let mut stream = conn.lock();
    loop {
        match dispatch::run(&mut stream, cache) {
            Turn::Continue => {}
            Turn::Idle => {
                let rearmed = registry.register(&mut *stream, token, Interest::READABLE);
                drop(stream);
                if let Err(e) = rearmed {
                    tracing::debug!(error = %e, "re-arm failed, dropping connection");
                    close_connection(token, connections);
                }
                return;
            }
            Turn::Close => {
                drop(stream);
                close_connection(token, connections);
                return;
            }
        }
    }
}

fn close_connection(token: Token, connections: &ConnMap) {
    if connections.lock().remove(&token).is_some() {
        metrics::CONNECTIONS_ACTIVE.decrement();
        tracing::debug!(token = token.0, "connection closed");
    }
}
