//! Upstream Client Contract
//!
//! The stream engine never talks HTTP itself. All remote access goes through
//! `RangeClient`, a single-method contract for a positioned range read.
//! Authentication, retry policy, and connection pooling belong to the
//! implementation behind this trait, not to the stream.
//!
//! ## Contract
//!
//! - One call maps to one ranged GET of `[position, position + length)`.
//! - A *short* reply (fewer bytes than requested) is legal; the caller copes.
//! - A reply longer than requested is a protocol violation the caller rejects.
//! - A missing object must surface as `Error::NotFound` so the stream can
//!   keep it distinguishable from transient transport failures.
//! - `etag` is the version captured when the stream was opened, or the
//!   literal `"*"` when the stream tolerates out-of-band appends.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// A positioned range-read client for a remote object store.
#[async_trait]
pub trait RangeClient: Send + Sync + 'static {
    /// Read up to `length` bytes starting at `position` of the object at
    /// `path`, conditional on `etag`.
    async fn read_range(
        &self,
        path: &str,
        position: u64,
        length: usize,
        etag: &str,
    ) -> Result<Bytes>;
}
