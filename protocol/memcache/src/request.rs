//! Client-side request encoding.
//!
//! This module encodes the supported command subset for client
//! applications and the end-to-end test suites.

use std::io::Write;

/// A request builder for encoding commands.
#[derive(Debug, Clone)]
pub enum Request<'a> {
    /// GET command: `get <key>\r\n`
    Get {
        /// Key to fetch.
        key: &'a [u8],
    },
    /// SET command: `set <key> <flags> <exptime> <bytes> [noreply]\r\n<data>\r\n`
    Set {
        /// Key to store under.
        key: &'a [u8],
        /// Payload bytes.
        value: &'a [u8],
        /// Opaque client flags.
        flags: u16,
        /// Expiry time in seconds.
        exptime: i64,
        /// Suppress the server's response.
        noreply: bool,
    },
}

impl<'a> Request<'a> {
    /// Create a GET request.
    #[inline]
    pub fn get(key: &'a [u8]) -> Self {
        Request::Get { key }
    }

    /// Create a SET request.
    #[inline]
    pub fn set(key: &'a [u8], value: &'a [u8]) -> SetRequest<'a> {
        SetRequest {
            key,
            value,
            flags: 0,
            exptime: 0,
            noreply: false,
        }
    }

    /// Encode this request into a buffer.
    ///
    /// Returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> usize {
        match self {
            Request::Get { key } => encode_get(buf, key),
            Request::Set {
                key,
                value,
                flags,
                exptime,
                noreply,
            } => encode_set(buf, key, value, *flags, *exptime, *noreply),
        }
    }
}

/// Builder for SET requests with optional flags, exptime and noreply.
#[derive(Debug, Clone)]
pub struct SetRequest<'a> {
    key: &'a [u8],
    value: &'a [u8],
    flags: u16,
    exptime: i64,
    noreply: bool,
}

impl<'a> SetRequest<'a> {
    /// Set the flags value.
    #[inline]
    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// Set the expiration time in seconds.
    #[inline]
    pub fn exptime(mut self, exptime: i64) -> Self {
        self.exptime = exptime;
        self
    }

    /// Ask the server to suppress its response.
    #[inline]
    pub fn noreply(mut self) -> Self {
        self.noreply = true;
        self
    }

    /// Build the final request.
    #[inline]
    pub fn build(self) -> Request<'a> {
        Request::Set {
            key: self.key,
            value: self.value,
            flags: self.flags,
            exptime: self.exptime,
            noreply: self.noreply,
        }
    }

    /// Encode this request directly into a buffer.
    ///
    /// Returns the number of bytes written.
    #[inline]
    pub fn encode(&self, buf: &mut [u8]) -> usize {
        encode_set(
            buf,
            self.key,
            self.value,
            self.flags,
            self.exptime,
            self.noreply,
        )
    }
}

/// Encode a GET command: `get <key>\r\n`
fn encode_get(buf: &mut [u8], key: &[u8]) -> usize {
    let mut pos = 0;
    buf[pos..pos + 4].copy_from_slice(b"get ");
    pos += 4;
    buf[pos..pos + key.len()].copy_from_slice(key);
    pos += key.len();
    buf[pos..pos + 2].copy_from_slice(b"\r\n");
    pos + 2
}

/// Encode a SET command: `set <key> <flags> <exptime> <bytes> [noreply]\r\n<data>\r\n`
fn encode_set(
    buf: &mut [u8],
    key: &[u8],
    value: &[u8],
    flags: u16,
    exptime: i64,
    noreply: bool,
) -> usize {
    let mut pos = 0;

    // set <key>
    buf[pos..pos + 4].copy_from_slice(b"set ");
    pos += 4;
    buf[pos..pos + key.len()].copy_from_slice(key);
    pos += key.len();
    buf[pos] = b' ';
    pos += 1;

    // <flags> <exptime> <bytes> [noreply]
    let mut cursor = std::io::Cursor::new(&mut buf[pos..]);
    if noreply {
        write!(cursor, "{} {} {} noreply\r\n", flags, exptime, value.len()).unwrap();
    } else {
        write!(cursor, "{} {} {}\r\n", flags, exptime, value.len()).unwrap();
    }
    pos += cursor.position() as usize;

    // <data>\r\n
    buf[pos..pos + value.len()].copy_from_slice(value);
    pos += value.len();
    buf[pos..pos + 2].copy_from_slice(b"\r\n");
    pos + 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_get() {
        let mut buf = [0u8; 64];
        let len = Request::get(b"mykey").encode(&mut buf);
        assert_eq!(&buf[..len], b"get mykey\r\n");
    }

    #[test]
    fn test_encode_set() {
        let mut buf = [0u8; 64];
        let len = Request::set(b"mykey", b"myvalue").encode(&mut buf);
        assert_eq!(&buf[..len], b"set mykey 0 0 7\r\nmyvalue\r\n");
    }

    #[test]
    fn test_encode_set_with_options() {
        let mut buf = [0u8; 64];
        let len = Request::set(b"mykey", b"myvalue")
            .flags(123)
            .exptime(3600)
            .encode(&mut buf);
        assert_eq!(&buf[..len], b"set mykey 123 3600 7\r\nmyvalue\r\n");
    }

    #[test]
    fn test_encode_set_noreply() {
        let mut buf = [0u8; 64];
        let len = Request::set(b"k", b"v").noreply().encode(&mut buf);
        assert_eq!(&buf[..len], b"set k 0 0 1 noreply\r\nv\r\n");
    }

    #[test]
    fn test_encode_set_empty_value() {
        let mut buf = [0u8; 64];
        let len = Request::set(b"empty", b"").encode(&mut buf);
        assert_eq!(&buf[..len], b"set empty 0 0 0\r\n\r\n");
    }

    #[test]
    fn test_set_request_build() {
        let mut buf = [0u8; 64];
        let request = Request::set(b"mykey", b"myvalue")
            .flags(42)
            .exptime(600)
            .build();
        let len = request.encode(&mut buf);
        assert_eq!(&buf[..len], b"set mykey 42 600 7\r\nmyvalue\r\n");
    }

    #[test]
    fn test_set_round_trips_through_header_parser() {
        let mut buf = [0u8; 64];
        let len = Request::set(b"key", b"hello")
            .flags(7)
            .exptime(-1)
            .noreply()
            .encode(&mut buf);
        let encoded = &buf[..len];

        // Strip `set key ` and the trailing `\r\nhello\r\n`.
        let header_start = b"set key ".len();
        let header_end = encoded.windows(2).position(|w| w == b"\r\n").unwrap();
        let header = crate::SetHeader::parse(&encoded[header_start..header_end]).unwrap();
        assert_eq!(header.flags, 7);
        assert_eq!(header.exptime, -1);
        assert_eq!(header.bytes, 5);
        assert!(header.noreply);
    }
}
