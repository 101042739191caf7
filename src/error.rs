//! Crate-wide error taxonomy.
//!
//! Variants correspond to the failure kinds a worker can hit while
//! applying a rename: source-tree issues (`IdentifierMismatch`,
//! `OverlappingReferences`), class-file issues (`ConstantPoolDecode`,
//! `InvalidMappings`, `UnsupportedTag`), mapping-file issues
//! (`BinaryMappings`), and the catch-alls (`Invariant`, `Io`, `Command`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    #[error("identifier mismatch at offset {offset}: expected {expected:?}, got {actual:?}")]
    IdentifierMismatch {
        offset: u64,
        expected: String,
        actual: String,
    },

    #[error("overlapping references in {file}: {first:?} overlaps {second:?}")]
    OverlappingReferences {
        file: String,
        first: String,
        second: String,
    },

    #[error("unexpected end of file at offset {offset}")]
    UnexpectedEof { offset: u64 },

    #[error("malformed constant pool: {0}")]
    ConstantPoolDecode(String),

    #[error("invalid mappings: {0}")]
    InvalidMappings(String),

    #[error("unsupported constant pool tag {0}")]
    UnsupportedTag(u8),

    #[error("malformed binary mappings: {0}")]
    BinaryMappings(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Command(String),
}

pub type Result<T> = std::result::Result<T, Error>;
