//! Error types for packwire.

use thiserror::Error;

use crate::format::FormatTag;

/// Main error type for all encode, decode and dispatch operations.
///
/// Every error aborts the call that raised it. The encoder or decoder that
/// produced it is left in an unspecified state and must not be reused.
#[derive(Debug, Error)]
pub enum PackError {
    /// Head byte is unknown, unimplemented (extension types) or not valid here.
    #[error("invalid head byte 0x{0:02x}")]
    InvalidHeadByte(u8),

    /// The decoded value's category does not match the requested extraction.
    #[error("incompatible unpack type: expected {expected}, found {found}")]
    IncompatibleUnpackType {
        /// What the extraction strategy accepts.
        expected: &'static str,
        /// The tag that was actually read.
        found: FormatTag,
    },

    /// A length, count or integer does not fit any wire format.
    #[error("{what} out of range: {len}")]
    OutOfRange {
        /// Which quantity overflowed.
        what: &'static str,
        /// The offending value.
        len: u128,
    },

    /// A sink or source transferred fewer bytes than requested.
    #[error("short I/O: expected {expected} bytes, transferred {actual}")]
    ShortIo {
        /// Requested byte count.
        expected: usize,
        /// Bytes actually transferred.
        actual: usize,
    },

    /// I/O error from a `std::io` backed sink or source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Map collections must carry an even number of elements.
    #[error("map element count must be even, got {0}")]
    OddMapElements(usize),

    /// `finish` was called while a collection still expects values.
    #[error("unclosed collection: expected {expected} values, emitted {emitted}")]
    UnclosedCollection {
        /// Values the innermost open collection was declared with.
        expected: u64,
        /// Values emitted into it so far.
        emitted: u64,
    },

    /// An argument array or tuple has the wrong number of elements.
    #[error("argument count mismatch: expected {expected}, got {actual}")]
    ArgumentCount {
        /// Declared parameter or tuple arity.
        expected: usize,
        /// Count carried by the array header.
        actual: u64,
    },

    /// A str/bin length exceeds the decoder's configured limit.
    #[error("sequence of {len} bytes exceeds limit {max}")]
    SequenceTooLarge {
        /// Length announced on the wire.
        len: u64,
        /// Configured maximum.
        max: u32,
    },

    /// Nested collections exceed the decoder's configured depth.
    #[error("nesting depth {0} exceeded")]
    DepthExceeded(usize),

    /// A `String` destination received bytes that are not UTF-8.
    #[error("invalid UTF-8 in string payload: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// No procedure is registered under this name.
    #[error("unknown procedure: {0}")]
    UnknownProcedure(String),

    /// No procedure is registered under this id.
    #[error("unknown procedure id: {0}")]
    UnknownProcedureId(u32),

    /// The RPC envelope around a call is malformed.
    #[error("malformed envelope: {0}")]
    Envelope(String),
}

/// Result type alias using PackError.
pub type Result<T> = std::result::Result<T, PackError>;
