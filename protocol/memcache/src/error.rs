//! Parse errors surfaced to clients.

/// Errors from parsing a request.
///
/// [`UnknownCommand`](Self::UnknownCommand) is rendered as a bare `ERROR`
/// response; everything else becomes `CLIENT_ERROR` with the display text
/// as the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The leading verb bytes were neither `get ` nor `set `.
    #[error("unknown command")]
    UnknownCommand,
    /// A key of zero length.
    #[error("empty key")]
    KeyEmpty,
    /// A key longer than 250 bytes.
    #[error("key exceeds 250 bytes")]
    KeyTooLong,
    /// A key containing a space or a control byte.
    #[error("key contains whitespace or control characters")]
    KeyIllegalByte,
    /// A `set` header with fewer than three or more than four fields.
    #[error("expected 3 or 4 arguments, got {0}")]
    WrongArgumentCount(usize),
    /// A numeric field that does not parse in its expected range.
    #[error("invalid numeric argument")]
    BadNumber,
    /// A fourth `set` field other than the literal `noreply`.
    #[error("unexpected option, expected noreply")]
    BadOption,
}
