//! Error types for binary format parsing and section lookup.

use thiserror::Error;

/// Error type for binary format parsing.
///
/// Every variant is fatal to [`File::parse`](crate::File::parse) except
/// [`ParseError::InvalidEncoding`], which decoders recover from locally by
/// substituting an empty name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Magic bytes match none of the supported formats.
    #[error("unknown binary format")]
    UnknownFormat,

    /// A header or table references bytes beyond the end of the buffer.
    #[error("range {offset:#x}+{len:#x} is out of bounds (buffer size {size:#x})")]
    OutOfBounds { offset: usize, len: usize, size: usize },

    /// Offset or size arithmetic does not fit the address space.
    #[error("integer overflow while computing {context}")]
    Overflow { context: &'static str },

    /// A string-table entry is unusable.
    #[error("invalid string encoding at offset {offset:#x}")]
    InvalidEncoding { offset: usize },

    /// A magic number inside a container is wrong.
    #[error("invalid magic number: expected {expected}, got {actual:02x?}")]
    InvalidMagic {
        expected: &'static str,
        actual: Vec<u8>,
    },

    /// A header field holds a value the format does not allow.
    #[error("invalid {kind} at offset {offset:#x}: {reason}")]
    InvalidStructure {
        kind: &'static str,
        offset: u64,
        reason: String,
    },
}

impl ParseError {
    /// Creates a new InvalidMagic error.
    pub fn invalid_magic(expected: &'static str, actual: &[u8]) -> Self {
        Self::InvalidMagic {
            expected,
            actual: actual.to_vec(),
        }
    }

    /// Creates a new InvalidStructure error.
    pub fn invalid_structure(kind: &'static str, offset: u64, reason: impl Into<String>) -> Self {
        Self::InvalidStructure {
            kind,
            offset,
            reason: reason.into(),
        }
    }

    /// Returns true if the input ended before a declared header or table did.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::OutOfBounds { .. })
    }
}

/// Error returned by the section lookups of [`File`](crate::File).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("section index {index} out of range ({count} sections)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("no section named {name:?}")]
    NotFound { name: String },
}
