//! Cache values and their fixed slot encoding.

use crate::error::CodecError;

/// Length of the encoded header: 2 bytes of flags, 4 bytes of payload length.
pub const VALUE_HEADER_SIZE: usize = 6;

/// An opaque value as stored in a cache slot.
///
/// Encoded layout is `flags` (u16, big-endian), payload length (u32,
/// big-endian), then the payload bytes. The payload may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValue {
    flags: u16,
    data: Vec<u8>,
}

impl CacheValue {
    /// Create a value from its client-supplied flags and payload.
    pub fn new(flags: u16, data: Vec<u8>) -> Self {
        debug_assert!(data.len() <= u32::MAX as usize);
        Self { flags, data }
    }

    /// Opaque client flags stored alongside the payload.
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Payload length in bytes; may be zero.
    pub fn bytes(&self) -> u32 {
        self.data.len() as u32
    }

    /// The payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Encoded size: header plus payload.
    pub fn serialized_size(&self) -> usize {
        VALUE_HEADER_SIZE + self.data.len()
    }

    /// Encode into the front of `buf`.
    ///
    /// Fails with [`CodecError::Overflow`] when `buf` is shorter than
    /// [`serialized_size`](Self::serialized_size); `buf` is left untouched.
    pub fn serialize_into(&self, buf: &mut [u8]) -> Result<(), CodecError> {
        if buf.len() < self.serialized_size() {
            return Err(CodecError::Overflow);
        }
        buf[0..2].copy_from_slice(&self.flags.to_be_bytes());
        buf[2..VALUE_HEADER_SIZE].copy_from_slice(&self.bytes().to_be_bytes());
        buf[VALUE_HEADER_SIZE..VALUE_HEADER_SIZE + self.data.len()].copy_from_slice(&self.data);
        Ok(())
    }

    /// Decode a value from the front of `buf`.
    ///
    /// Trailing bytes beyond the encoded length are ignored, so a slot can
    /// be larger than the value it holds.
    pub fn deserialize(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < VALUE_HEADER_SIZE {
            return Err(CodecError::Truncated);
        }
        let flags = u16::from_be_bytes([buf[0], buf[1]]);
        let len = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize;
        let payload = &buf[VALUE_HEADER_SIZE..];
        if payload.len() < len {
            return Err(CodecError::Truncated);
        }
        Ok(Self {
            flags,
            data: payload[..len].to_vec(),
        })
    }
}
