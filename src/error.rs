use thiserror::Error;

/// Errors produced by the RRset value type and its wire/journal codecs
/// (components A–G of the codec).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CodecError {
    /// Nil/invalid inputs, mismatched (owner, class, type) on merge, or a
    /// position argument out of range.
    #[error("invalid argument: {0}")]
    InvalidArgs(&'static str),

    /// `remove_rr_by_content` found no matching RR.
    #[error("no matching RR found")]
    NotFound,

    /// The encoder's output buffer was exhausted, or the deserializer's
    /// declared length exceeds the bytes available.
    #[error("insufficient space")]
    NoSpace,

    /// The decoder overshot `rdlength`, a NAPTR length byte was invalid, or
    /// a name was truncated.
    #[error("malformed wire data: {0}")]
    Malformed(&'static str),

    /// Allocation failure. Rust's global allocator aborts the process
    /// before this would normally be observable; retained for API parity
    /// with callers that pre-validate sizes against external limits.
    #[error("out of memory")]
    OutOfMemory,
}

/// Errors produced by the RRL table's administrative operations.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RrlError {
    #[error("invalid argument: {0}")]
    InvalidArgs(&'static str),
}

pub type CodecResult<T> = Result<T, CodecError>;
pub type RrlResult<T> = Result<T, RrlError>;
