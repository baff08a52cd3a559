//! Line-and-payload framing over a non-blocking socket.

use std::io::{self, Read};
use std::thread;

use mio::net::TcpStream;

/// Why a read could not produce a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The peer closed the connection.
    #[error("peer closed connection")]
    PeerClosed,
    /// A partial delimiter prefix followed by other data; the protocol
    /// forbids bare control bytes inside a field.
    #[error("partial line terminator in field")]
    PartialDelimiter,
    /// Underlying socket failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Reads delimiter-terminated fields and fixed-length payloads from a
/// non-blocking stream.
///
/// `WouldBlock` mid-frame yields the thread and retries: the acceptor
/// never hands a connection to two workers at once, so a worker may wait
/// for the rest of a command here without blocking anything but itself.
pub struct LineFramer<'a> {
    stream: &'a mut TcpStream,
}

impl<'a> LineFramer<'a> {
    /// Frame reads over `stream`.
    pub fn new(stream: &'a mut TcpStream) -> Self {
        Self { stream }
    }

    /// Whether at least one byte is buffered, without consuming it.
    ///
    /// Returns `Ok(false)` when nothing is pending, and `PeerClosed` once
    /// the peer has shut down its end.
    pub fn poll_ready(&mut self) -> Result<bool, FrameError> {
        let mut probe = [0u8; 1];
        loop {
            match self.stream.peek(&mut probe) {
                Ok(0) => return Err(FrameError::PeerClosed),
                Ok(_) => return Ok(true),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(FrameError::Io(e)),
            }
        }
    }

    fn read_byte(&mut self) -> Result<u8, FrameError> {
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(FrameError::PeerClosed),
                Ok(_) => return Ok(byte[0]),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => thread::yield_now(),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(FrameError::Io(e)),
            }
        }
    }

    /// Read until the full delimiter sequence appears, returning the bytes
    /// before it (the delimiter is consumed but not returned).
    ///
    /// A partial delimiter prefix followed by a mismatching byte is a
    /// protocol violation.
    pub fn read_until(&mut self, delim: &[u8]) -> Result<Vec<u8>, FrameError> {
        debug_assert!(!delim.is_empty());
        let mut out = Vec::with_capacity(64);
        let mut matched = 0;
        loop {
            let byte = self.read_byte()?;
            if byte == delim[matched] {
                matched += 1;
                if matched == delim.len() {
                    return Ok(out);
                }
            } else if matched != 0 {
                return Err(FrameError::PartialDelimiter);
            } else {
                out.push(byte);
            }
        }
    }

    /// Read exactly `n` bytes.
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, FrameError> {
        let mut out = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            match self.stream.read(&mut out[filled..]) {
                Ok(0) => return Err(FrameError::PeerClosed),
                Ok(read) => filled += read,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => thread::yield_now(),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(FrameError::Io(e)),
            }
        }
        Ok(out)
    }
}
