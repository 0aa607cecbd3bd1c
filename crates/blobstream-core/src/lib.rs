//! blobstream Core Types
//!
//! Shared foundation for the blobstream workspace: the error taxonomy, the
//! upstream `RangeClient` contract, and the constants fixed by the columnar
//! formats the streams are tuned for.
//!
//! Everything here is consumed by the `blobstream` engine crate; nothing in
//! this crate performs I/O.

pub mod client;
pub mod error;

pub use client::RangeClient;
pub use error::{Error, Result};

/// Trailing region treated as "footer" by the first-read optimisation.
///
/// Sized to cover the metadata tail of both Parquet and ORC files, so a
/// footer-first probe can be answered with a single request.
pub const FOOTER_SIZE: u64 = 16 * 1024;

/// Attempts an optimised first read makes before falling back to the plain
/// block-by-block path.
pub const MAX_OPTIMIZED_READ_ATTEMPTS: usize = 2;
