//! Server-side response encoding.

use bytes::BytesMut;

/// Responses the server writes back on a connection.
///
/// A `get` hit is a [`Value`](Self::Value) followed by [`End`](Self::End);
/// a miss is a bare [`End`](Self::End).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'a> {
    /// `VALUE <key> <flags> <bytes>\r\n<data>\r\n`
    Value {
        /// The key being answered, echoed verbatim.
        key: &'a [u8],
        /// Client flags stored with the value.
        flags: u16,
        /// The payload bytes.
        data: &'a [u8],
    },
    /// `END\r\n`, terminating every `get` response.
    End,
    /// `STORED\r\n`
    Stored,
    /// `NOT_STORED\r\n`
    NotStored,
    /// `ERROR\r\n`, for an unknown verb.
    Error,
    /// `CLIENT_ERROR <msg>\r\n`, for a malformed request.
    ClientError(&'a str),
    /// `SERVER_ERROR <msg>\r\n`, for an internal failure.
    ServerError(&'a str),
}

impl Response<'_> {
    /// Append the wire encoding of this response to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Response::Value { key, flags, data } => {
                let mut flags_buf = itoa::Buffer::new();
                let mut len_buf = itoa::Buffer::new();
                buf.extend_from_slice(b"VALUE ");
                buf.extend_from_slice(key);
                buf.extend_from_slice(b" ");
                buf.extend_from_slice(flags_buf.format(*flags).as_bytes());
                buf.extend_from_slice(b" ");
                buf.extend_from_slice(len_buf.format(data.len()).as_bytes());
                buf.extend_from_slice(b"\r\n");
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\r\n");
            }
            Response::End => buf.extend_from_slice(b"END\r\n"),
            Response::Stored => buf.extend_from_slice(b"STORED\r\n"),
            Response::NotStored => buf.extend_from_slice(b"NOT_STORED\r\n"),
            Response::Error => buf.extend_from_slice(b"ERROR\r\n"),
            Response::ClientError(msg) => {
                buf.extend_from_slice(b"CLIENT_ERROR ");
                buf.extend_from_slice(msg.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
            Response::ServerError(msg) => {
                buf.extend_from_slice(b"SERVER_ERROR ");
                buf.extend_from_slice(msg.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
        }
    }
}
