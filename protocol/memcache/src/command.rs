//! Server-side parsing for the supported command subset.

use crate::error::ParseError;

/// Longest key the protocol accepts, in bytes.
pub const MAX_KEY_LEN: usize = 250;

/// The verbs the server understands, as read from the first four bytes of
/// a request. Verbs are case-sensitive and include the trailing space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// `get <key>\r\n`
    Get,
    /// `set <key> <flags> <exptime> <bytes> [noreply]\r\n<data>\r\n`
    Set,
}

impl Verb {
    /// Classify the four leading bytes of a request.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes == b"get " {
            Ok(Verb::Get)
        } else if bytes == b"set " {
            Ok(Verb::Set)
        } else {
            Err(ParseError::UnknownCommand)
        }
    }
}

/// Validate a key: opaque bytes, 1..=250 long, no spaces, no control bytes.
pub fn validate_key(key: &[u8]) -> Result<(), ParseError> {
    if key.is_empty() {
        return Err(ParseError::KeyEmpty);
    }
    if key.len() > MAX_KEY_LEN {
        return Err(ParseError::KeyTooLong);
    }
    if key.iter().any(|&b| b == b' ' || b < 0x20 || b == 0x7f) {
        return Err(ParseError::KeyIllegalByte);
    }
    Ok(())
}

/// The `<flags> <exptime> <bytes> [noreply]` tail of a `set` header line.
///
/// `exptime` is carried for protocol compatibility; the cache ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetHeader {
    /// Opaque 16-bit client flags, stored and echoed on `get`.
    pub flags: u16,
    /// Expiry time in seconds; accepted and ignored.
    pub exptime: i64,
    /// Payload length in bytes; may be zero.
    pub bytes: u32,
    /// Whether the client asked for the response to be suppressed.
    pub noreply: bool,
}

impl SetHeader {
    /// Parse the header fields from the line following the key.
    pub fn parse(line: &[u8]) -> Result<Self, ParseError> {
        let fields: Vec<&[u8]> = line.split(|&b| b == b' ').collect();
        if !(3..=4).contains(&fields.len()) {
            return Err(ParseError::WrongArgumentCount(fields.len()));
        }

        let flags = parse_number::<u16>(fields[0])?;
        let exptime = parse_number::<i64>(fields[1])?;
        let bytes = parse_number::<u32>(fields[2])?;
        let noreply = match fields.get(3) {
            None => false,
            Some(field) if *field == b"noreply" => true,
            Some(_) => return Err(ParseError::BadOption),
        };

        Ok(Self {
            flags,
            exptime,
            bytes,
            noreply,
        })
    }
}

fn parse_number<T: std::str::FromStr>(field: &[u8]) -> Result<T, ParseError> {
    std::str::from_utf8(field)
        .map_err(|_| ParseError::BadNumber)?
        .parse()
        .map_err(|_| ParseError::BadNumber)
}
