//! Error Types for blobstream
//!
//! This module defines all error types that can occur when reading from a
//! remote object.
//!
//! ## Error Categories
//!
//! ### Stream Lifecycle Errors
//! - `StreamClosed`: Operation attempted on a closed stream
//! - `InvalidConfig`: Construction-time parameter validation failed
//!
//! ### Positioning Errors
//! - `NegativeSeek`: Seek to a negative position
//! - `PastEof`: Seek or skip beyond the end of the object
//!
//! ### Argument Errors
//! - `IndexOutOfBounds`: Read arguments violate destination slice bounds
//!
//! ### Remote Errors
//! - `NotFound`: The object has vanished from the store (HTTP 404)
//! - `Io`: Any other transport or protocol failure
//!
//! ### Feature Errors
//! - `Unsupported`: Operation the stream does not provide (mark/reset)
//!
//! ## Usage
//! All operations return `Result<T>` which is aliased to `Result<T, Error>`.
//! This allows using the `?` operator for error propagation.
//!
//! ## Example
//! ```ignore
//! use blobstream_core::{Error, Result};
//!
//! fn check_bounds(dst_len: usize, off: usize, len: usize) -> Result<()> {
//!     if off + len > dst_len {
//!         return Err(Error::IndexOutOfBounds {
//!             offset: off,
//!             length: len,
//!             buffer_len: dst_len,
//!         });
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("stream is closed")]
    StreamClosed,

    #[error("read arguments out of bounds: offset {offset} + length {length} exceeds buffer of {buffer_len} bytes")]
    IndexOutOfBounds {
        offset: usize,
        length: usize,
        buffer_len: usize,
    },

    #[error("cannot seek to a negative position: {0}")]
    NegativeSeek(i64),

    #[error("cannot seek past the end of the stream")]
    PastEof,

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("{0} is not supported by this stream")]
    Unsupported(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this error reports the object missing from the store.
    ///
    /// A vanished object is never recovered by the optimised read paths; the
    /// error surfaces to the caller unchanged.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
