//! Range Reader - One Positioned Read Against the Store
//!
//! `RangeReader` is the thin adapter between the stream engine and the
//! upstream `RangeClient`. It owns the per-object facts captured at open
//! (path, content length, etag) and turns one refill request into one
//! conditional ranged GET.
//!
//! ## Responsibilities
//!
//! 1. **Bounds checking** of the destination slice arguments
//! 2. **End-of-object reporting**: a read at or past `content_length`
//!    returns `Ok(None)` rather than an error, so callers can treat EOF as
//!    a value
//! 3. **Length clamping**: the object size is fixed at open, so requests
//!    never ask the server for bytes that cannot exist
//! 4. **ETag selection**: the captured etag by default, the literal `"*"`
//!    when the stream tolerates out-of-band appends
//! 5. **Reply validation**: a reply longer than the request is rejected as
//!    a protocol failure
//!
//! Retries do not live here. The client behind the `RangeClient` trait owns
//! the retry policy; this layer reports exactly what one attempt produced.

use std::sync::Arc;

use bytes::Bytes;
use tracing::trace;

use blobstream_core::{Error, RangeClient, Result};

/// Issues positioned range reads for a single remote object.
pub struct RangeReader {
    client: Arc<dyn RangeClient>,
    path: String,
    content_length: u64,
    etag: String,
    tolerate_oob: bool,
}

impl RangeReader {
    pub fn new(
        client: Arc<dyn RangeClient>,
        path: String,
        content_length: u64,
        etag: String,
        tolerate_oob: bool,
    ) -> Self {
        Self {
            client,
            path,
            content_length,
            etag,
            tolerate_oob,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Read up to `length` bytes at `position` into `dst[dst_off..]`.
    ///
    /// Returns `Ok(None)` at or past end-of-object, otherwise the number of
    /// bytes received, which may be fewer than requested.
    pub async fn read_range(
        &self,
        position: u64,
        dst: &mut [u8],
        dst_off: usize,
        length: usize,
    ) -> Result<Option<usize>> {
        if dst_off.checked_add(length).map_or(true, |end| end > dst.len()) {
            return Err(Error::IndexOutOfBounds {
                offset: dst_off,
                length,
                buffer_len: dst.len(),
            });
        }

        if position >= self.content_length {
            return Ok(None);
        }

        let clamped = length.min((self.content_length - position) as usize);
        if clamped == 0 {
            return Ok(Some(0));
        }

        let data = self.fetch(position, clamped).await?;
        dst[dst_off..dst_off + data.len()].copy_from_slice(&data);
        Ok(Some(data.len()))
    }

    /// Pool-worker entry point: same read, reply kept in its own buffer.
    pub(crate) async fn read_range_to_bytes(&self, position: u64, length: usize) -> Result<Bytes> {
        if position >= self.content_length {
            return Ok(Bytes::new());
        }
        let clamped = length.min((self.content_length - position) as usize);
        self.fetch(position, clamped).await
    }

    async fn fetch(&self, position: u64, length: usize) -> Result<Bytes> {
        let etag = if self.tolerate_oob { "*" } else { &self.etag };
        let data = self
            .client
            .read_range(&self.path, position, length, etag)
            .await?;

        if data.len() > length {
            return Err(Error::Io(format!(
                "server returned {} bytes for a {} byte range of {}",
                data.len(),
                length,
                self.path
            )));
        }

        trace!(
            path = %self.path,
            position,
            requested = length,
            received = data.len(),
            "Range read"
        );

        Ok(data)
    }
}
