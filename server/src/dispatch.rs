//! Per-turn command execution: parse one request, run it against the
//! cache, write the response back on the same socket.

use std::io::{self, Write};
use std::thread;

use bytes::BytesMut;
use cache_core::{Cache, CacheValue};
use mio::net::TcpStream;
use protocol_memcache::{Response, SetHeader, Verb, validate_key};

use crate::framer::{FrameError, LineFramer};
use crate::metrics;

/// Outcome of one dispatcher turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// A request was processed; the connection may carry more.
    Continue,
    /// No request is pending; re-arm read interest.
    Idle,
    /// The connection is done: peer closed, unknown verb, or fatal error.
    Close,
}

/// What the parse/execute phase decided to do with the connection.
enum Action {
    /// Write a response, keep the connection.
    Respond(BytesMut),
    /// `noreply`: nothing to write, keep the connection.
    Quiet,
    /// Write a response, then close.
    RespondClose(BytesMut),
    /// Close without a response.
    Close,
}

/// Run at most one request from `stream` against `cache`.
///
/// Returns [`Turn::Idle`] without consuming anything when no request is
/// buffered, so the caller can re-arm read readiness.
pub fn run<C: Cache>(stream: &mut TcpStream, cache: &C) -> Turn {
    let action = {
        let mut framer = LineFramer::new(stream);
        match framer.poll_ready() {
            Ok(true) => {}
            Ok(false) => return Turn::Idle,
            Err(FrameError::PeerClosed) => return Turn::Close,
            Err(e) => {
                tracing::debug!(error = %e, "probe failed");
                return Turn::Close;
            }
        }
        execute(&mut framer, cache)
    };

    match action {
        Action::Quiet => Turn::Continue,
        Action::Respond(response) => match write_response(stream, &response) {
            Ok(()) => Turn::Continue,
            Err(e) => {
                tracing::debug!(error = %e, "write failed");
                Turn::Close
            }
        },
        Action::RespondClose(response) => {
            if let Err(e) = write_response(stream, &response) {
                tracing::debug!(error = %e, "write failed");
            }
            Turn::Close
        }
        Action::Close => Turn::Close,
    }
}

fn execute<C: Cache>(framer: &mut LineFramer<'_>, cache: &C) -> Action {
    // The verb is always four bytes: `get ` or `set `.
    let verb = match framer.read_exact(4) {
        Ok(bytes) => bytes,
        Err(e) => return frame_failure(e),
    };
    match Verb::parse(&verb) {
        Ok(Verb::Get) => get(framer, cache),
        Ok(Verb::Set) => set(framer, cache),
        Err(_) => {
            metrics::PROTOCOL_ERRORS.increment();
            tracing::debug!("unknown verb");
            respond_close(Response::Error)
        }
    }
}

fn get<C: Cache>(framer: &mut LineFramer<'_>, cache: &C) -> Action {
    let key = match framer.read_until(b"\r\n") {
        Ok(key) => key,
        Err(e) => return frame_failure(e),
    };
    if let Err(e) = validate_key(&key) {
        metrics::PROTOCOL_ERRORS.increment();
        return respond(Response::ClientError(&e.to_string()));
    }

    metrics::GETS.increment();
    let mut buf = BytesMut::new();
    match cache.get(&key) {
        Some(value) => {
            metrics::HITS.increment();
            Response::Value {
                key: &key,
                flags: value.flags(),
                data: value.data(),
            }
            .encode(&mut buf);
        }
        None => {
            metrics::MISSES.increment();
        }
    }
    Response::End.encode(&mut buf);
    Action::Respond(buf)
}

fn set<C: Cache>(framer: &mut LineFramer<'_>, cache: &C) -> Action {
    let key = match framer.read_until(b" ") {
        Ok(key) => key,
        Err(e) => return frame_failure(e),
    };
    if let Err(e) = validate_key(&key) {
        metrics::PROTOCOL_ERRORS.increment();
        return respond(Response::ClientError(&e.to_string()));
    }

    let line = match framer.read_until(b"\r\n") {
        Ok(line) => line,
        Err(e) => return frame_failure(e),
    };
    let header = match SetHeader::parse(&line) {
        Ok(header) => header,
        Err(e) => {
            metrics::PROTOCOL_ERRORS.increment();
            return respond(Response::ClientError(&e.to_string()));
        }
    };

    let data = match framer.read_exact(header.bytes as usize) {
        Ok(data) => data,
        Err(e) => return frame_failure(e),
    };
    // The payload terminator is mandatory even for zero-byte payloads.
    let terminator = match framer.read_exact(2) {
        Ok(bytes) => bytes,
        Err(e) => return frame_failure(e),
    };
    if terminator != b"\r\n" {
        metrics::PROTOCOL_ERRORS.increment();
        return respond(Response::ClientError("bad data chunk"));
    }

    metrics::SETS.increment();
    // `exptime` is accepted for protocol compatibility and ignored.
    let value = CacheValue::new(header.flags, data);
    let stored = cache.set(&key, &value);
    if !stored {
        metrics::SETS_REFUSED.increment();
    }

    if header.noreply {
        return Action::Quiet;
    }
    respond(if stored {
        Response::Stored
    } else {
        Response::NotStored
    })
}

fn respond(response: Response<'_>) -> Action {
    let mut buf = BytesMut::new();
    response.encode(&mut buf);
    Action::Respond(buf)
}

fn respond_close(response: Response<'_>) -> Action {
    let mut buf = BytesMut::new();
    response.encode(&mut buf);
    Action::RespondClose(buf)
}

/// Translate a framing failure into its client-visible category.
fn frame_failure(e: FrameError) -> Action {
    match e {
        // Peer disappeared; nobody is listening for a response.
        FrameError::PeerClosed => Action::Close,
        FrameError::PartialDelimiter => {
            metrics::PROTOCOL_ERRORS.increment();
            respond(Response::ClientError(&e.to_string()))
        }
        FrameError::Io(e) => {
            metrics::SERVER_ERRORS.increment();
            tracing::warn!(error = %e, "connection io failure");
            respond_close(Response::ServerError("io failure"))
        }
    }
}

/// Write the whole response, yielding on `WouldBlock`.
fn write_response(stream: &mut TcpStream, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        match stream.write(data) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => data = &data[n..],
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => thread::yield_now(),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
