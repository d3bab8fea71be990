//! Error types for tome operations.

use thiserror::Error;

/// Errors that can occur while building, reading or writing books.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid UMD: {0}")]
    InvalidUmd(String),

    #[error("Invalid text book: {0}")]
    InvalidText(String),

    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    /// A content or text reference could not be resolved to live bytes.
    #[error("Unresolved reference: {0}")]
    Reference(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Index {index} out of range for {len} children")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;
