//! Positioned Blob Reader - The Consumer-Facing Stream
//!
//! This module implements `BlobReader`, a positioned, buffered, read-only
//! byte stream over one immutable remote object whose size is known at open.
//! It is built for the read patterns of columnar formats: a footer-first
//! probe, then sequential scans and random seeks into row groups.
//!
//! ## The Window
//!
//! The stream holds a single lazily-allocated buffer, the *window*, covering
//! the object range `[f_cursor - limit, f_cursor)`:
//!
//! ```text
//!  object:   ....|...........window...........|...............
//!                ^                ^           ^
//!          f_cursor - limit    b_cursor    f_cursor
//!                          (consumer view) (next server byte)
//! ```
//!
//! The externally visible position is always
//! `f_cursor - limit + b_cursor`. Reads inside the window are memory
//! copies; a read past `limit` triggers a refill. A seek inside the window
//! only moves `b_cursor`; a seek outside invalidates it.
//!
//! ## First-Read Strategies
//!
//! The first read of a stream may take one of two optimised paths before
//! settling into block-by-block reading:
//!
//! - **full file**: the object fits in the window, so fetch all of it and
//!   serve every later read from memory.
//! - **tail block**: the read targets the footer region, so fetch the last
//!   window-sized block in one request instead of dribbling through the
//!   metadata tail.
//!
//! Both paths snapshot the cursor tuple first. If the optimised fetch fails
//! or comes up short of the requested range, the snapshot is restored and
//! the plain block path re-runs the read, so the optimisations are
//! invisible except in round-trip counts. A vanished object is the one
//! exception: it surfaces immediately.
//!
//! ## Read-Ahead
//!
//! Block refills that resume exactly where the previous read ended (or that
//! drain full windows) are treated as sequential: the refill schedules up
//! to `read_ahead_queue_depth` prefetches through the shared
//! `ReadAheadPool` and serves the current window from the pool when it can.
//! Seek-then-short-read patterns bypass read-ahead entirely and fetch just
//! what the caller can hold.
//!
//! ## Concurrency
//!
//! All state lives behind one async mutex, so concurrent calls on a shared
//! stream serialise in FIFO order. Only refills perform I/O while holding
//! the lock; `seek`, `get_pos`, `available`, `length`, and `close` never
//! touch the network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use blobstream_core::{Error, RangeClient, Result, FOOTER_SIZE, MAX_OPTIMIZED_READ_ATTEMPTS};

use crate::config::ReaderConfig;
use crate::range_reader::RangeReader;
use crate::read_ahead::{ReadAheadPool, StreamId};

/// Per-stream read accounting.
#[derive(Debug, Default)]
pub struct ReadStats {
    bytes_read: AtomicU64,
    remote_reads: AtomicU64,
    read_ahead_hits: AtomicU64,
}

impl ReadStats {
    /// Bytes handed to consumers from the window.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Direct server round trips issued by this stream (prefetches excluded).
    pub fn remote_reads(&self) -> u64 {
        self.remote_reads.load(Ordering::Relaxed)
    }

    /// Refills satisfied from the read-ahead pool.
    pub fn read_ahead_hits(&self) -> u64 {
        self.read_ahead_hits.load(Ordering::Relaxed)
    }
}

/// The four-field cursor tuple, saved before an optimised path and applied
/// again if that path has to be abandoned.
#[derive(Debug, Clone, Copy, Default)]
struct CursorSnapshot {
    f_cursor: u64,
    b_cursor: usize,
    limit: usize,
    f_cursor_after_last_read: Option<u64>,
}

struct StreamState {
    /// Window buffer, allocated on first refill, released on close.
    buffer: Option<Vec<u8>>,
    /// Object offset of the next byte to fetch from the server.
    f_cursor: u64,
    /// Window offset of the next byte to hand to the consumer.
    b_cursor: usize,
    /// Count of valid bytes in the window.
    limit: usize,
    /// Where the last server read ended; `None` before any read.
    f_cursor_after_last_read: Option<u64>,
    first_read: bool,
    closed: bool,
    snapshot: CursorSnapshot,
}

impl StreamState {
    fn position(&self) -> u64 {
        self.f_cursor - self.limit as u64 + self.b_cursor as u64
    }

    fn save_cursors(&mut self) {
        self.snapshot = CursorSnapshot {
            f_cursor: self.f_cursor,
            b_cursor: self.b_cursor,
            limit: self.limit,
            f_cursor_after_last_read: self.f_cursor_after_last_read,
        };
    }

    fn restore_cursors(&mut self) {
        let snapshot = self.snapshot;
        self.f_cursor = snapshot.f_cursor;
        self.b_cursor = snapshot.b_cursor;
        self.limit = snapshot.limit;
        self.f_cursor_after_last_read = snapshot.f_cursor_after_last_read;
    }
}

/// Positioned, buffered, read-only stream over a remote object.
pub struct BlobReader {
    id: StreamId,
    path: String,
    content_length: u64,
    buffer_size: usize,
    read_ahead_queue_depth: usize,
    read_small_files_completely: bool,
    optimize_footer_read: bool,
    range_reader: Arc<RangeReader>,
    pool: Arc<ReadAheadPool>,
    stats: ReadStats,
    state: Mutex<StreamState>,
}

impl BlobReader {
    /// Open a stream over `path`, using the process-wide read-ahead pool.
    ///
    /// `content_length` and `etag` are the size and version observed by the
    /// caller at open time; the stream treats both as immutable.
    pub fn open(
        client: Arc<dyn RangeClient>,
        path: impl Into<String>,
        content_length: u64,
        etag: impl Into<String>,
        config: ReaderConfig,
    ) -> Result<Self> {
        Self::open_with_pool(client, path, content_length, etag, config, ReadAheadPool::global())
    }

    /// Open a stream bound to a private read-ahead pool.
    pub fn open_with_pool(
        client: Arc<dyn RangeClient>,
        path: impl Into<String>,
        content_length: u64,
        etag: impl Into<String>,
        config: ReaderConfig,
        pool: Arc<ReadAheadPool>,
    ) -> Result<Self> {
        config.validate()?;
        let path = path.into();
        let range_reader = Arc::new(RangeReader::new(
            Arc::clone(&client),
            path.clone(),
            content_length,
            etag.into(),
            config.tolerate_oob_appends,
        ));

        let id = StreamId::next();
        debug!(?id, path = %path, content_length, buffer_size = config.buffer_size, "Opened blob reader");

        Ok(Self {
            id,
            path,
            content_length,
            buffer_size: config.buffer_size,
            read_ahead_queue_depth: config.effective_queue_depth(),
            read_small_files_completely: config.read_small_files_completely,
            optimize_footer_read: config.optimize_footer_read,
            range_reader,
            pool,
            stats: ReadStats::default(),
            state: Mutex::new(StreamState {
                buffer: None,
                f_cursor: 0,
                b_cursor: 0,
                limit: 0,
                f_cursor_after_last_read: None,
                first_read: true,
                closed: false,
                snapshot: CursorSnapshot::default(),
            }),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    /// Read up to `len` bytes into `dst[off..off + len)`.
    ///
    /// Returns `Some(n)` for bytes copied, `Some(0)` only when `len == 0`,
    /// and `None` at end of stream.
    pub async fn read(&self, dst: &mut [u8], off: usize, len: usize) -> Result<Option<usize>> {
        let mut state = self.state.lock().await;

        if state.closed {
            return Err(Error::StreamClosed);
        }
        check_slice_bounds(dst.len(), off, len)?;
        if len == 0 {
            return Ok(Some(0));
        }
        // EOF wins over every strategy, including the first-read paths.
        if state.position() >= self.content_length {
            return Ok(None);
        }

        let mut current_off = off;
        let mut current_len = len;
        let mut total = 0usize;
        loop {
            let last = if self.should_read_fully(&state) {
                self.read_file_completely(&mut state, dst, current_off, current_len)
                    .await?
            } else if self.should_read_last_block(&state) {
                self.read_last_block(&mut state, dst, current_off, current_len)
                    .await?
            } else {
                self.read_one_block(&mut state, dst, current_off, current_len)
                    .await?
            };

            match last {
                Some(n) if n > 0 => {
                    total += n;
                    current_off += n;
                    current_len -= n;
                    if current_len == 0 {
                        return Ok(Some(total));
                    }
                }
                last => {
                    return Ok(if total > 0 { Some(total) } else { last });
                }
            }
        }
    }

    /// Read a single byte through the buffered path.
    pub async fn read_byte(&self) -> Result<Option<u8>> {
        let mut one = [0u8; 1];
        match self.read(&mut one, 0, 1).await? {
            Some(n) if n > 0 => Ok(Some(one[0])),
            _ => Ok(None),
        }
    }

    /// Move the stream position to `pos`.
    ///
    /// A position inside the current window is a cursor move; anything else
    /// invalidates the window and redirects the next refill.
    pub async fn seek(&self, pos: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(Error::StreamClosed);
        }
        if pos < 0 {
            return Err(Error::NegativeSeek(pos));
        }
        let target = pos as u64;
        if target > self.content_length {
            return Err(Error::PastEof);
        }
        Self::seek_in_state(&mut state, target);
        Ok(())
    }

    fn seek_in_state(state: &mut StreamState, target: u64) {
        let window_start = state.f_cursor - state.limit as u64;
        if target >= window_start && target <= state.f_cursor {
            state.b_cursor = (target - window_start) as usize;
            return;
        }

        // next refill starts here
        state.f_cursor = target;

        // invalidate the window
        state.limit = 0;
        state.b_cursor = 0;
    }

    /// Advance the position by `n` (which may be negative), clamped to
    /// `[0, content_length]`. Returns the delta actually applied.
    pub async fn skip(&self, n: i64) -> Result<i64> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(Error::StreamClosed);
        }
        let current = state.position();
        if current == self.content_length && n > 0 {
            return Err(Error::PastEof);
        }

        let target = current as i128 + n as i128;
        let (new_pos, applied) = if target < 0 {
            (0u64, -(current as i64))
        } else if target > self.content_length as i128 {
            (self.content_length, (self.content_length - current) as i64)
        } else {
            (target as u64, n)
        };

        Self::seek_in_state(&mut state, new_pos);
        Ok(applied)
    }

    /// Current position from the start of the object.
    pub async fn get_pos(&self) -> Result<u64> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(Error::StreamClosed);
        }
        Ok(state.position())
    }

    /// Remaining bytes, capped at `i32::MAX` for parity with HDFS-style
    /// streams whose callers treat the value as a signed 32-bit count.
    pub async fn available(&self) -> Result<u64> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(Error::StreamClosed);
        }
        let remaining = self.content_length - state.position();
        Ok(remaining.min(i32::MAX as u64))
    }

    /// Object length as observed at open; later appends are not reflected.
    pub async fn length(&self) -> Result<u64> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(Error::StreamClosed);
        }
        Ok(self.content_length)
    }

    /// Close the stream, release the window, and drop any prefetches.
    ///
    /// Idempotent; every other operation on a closed stream fails with
    /// `StreamClosed`.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.buffer = None;
        self.pool.evict(self.id);
        debug!(id = ?self.id, path = %self.path, "Closed blob reader");
        Ok(())
    }

    /// Not supported by this stream.
    pub fn mark(&self, _read_limit: usize) -> Result<()> {
        Err(Error::Unsupported("mark"))
    }

    /// Not supported by this stream.
    pub fn reset(&self) -> Result<()> {
        Err(Error::Unsupported("reset"))
    }

    pub fn mark_supported(&self) -> bool {
        false
    }

    /// There is never an alternate replica of an immutable blob.
    pub fn seek_to_new_source(&self, _target: u64) -> Result<bool> {
        Ok(false)
    }

    fn should_read_fully(&self, state: &StreamState) -> bool {
        state.first_read
            && self.read_small_files_completely
            && self.content_length <= self.buffer_size as u64
    }

    fn should_read_last_block(&self, state: &StreamState) -> bool {
        let footer_start = self.content_length.saturating_sub(FOOTER_SIZE);
        let last_block_start = self.content_length.saturating_sub(self.buffer_size as u64);
        state.first_read
            && self.optimize_footer_read
            && state.f_cursor >= footer_start
            // a window smaller than the footer cannot reach back to the
            // probe position; those reads take the block path instead
            && state.f_cursor >= last_block_start
    }

    /// Returns false when no bytes remain before EOF.
    fn validate(&self, state: &StreamState, dst_len: usize, off: usize, len: usize) -> Result<bool> {
        if state.closed {
            return Err(Error::StreamClosed);
        }
        check_slice_bounds(dst_len, off, len)?;
        Ok(state.position() < self.content_length)
    }

    /// Plain strategy: serve from the window, refilling it when drained.
    async fn read_one_block(
        &self,
        state: &mut StreamState,
        dst: &mut [u8],
        off: usize,
        len: usize,
    ) -> Result<Option<usize>> {
        if len == 0 {
            return Ok(Some(0));
        }
        if !self.validate(state, dst.len(), off, len)? {
            return Ok(None);
        }

        if state.b_cursor == state.limit {
            if state.f_cursor >= self.content_length {
                return Ok(None);
            }

            state.b_cursor = 0;
            state.limit = 0;
            let mut buffer = match state.buffer.take() {
                Some(buffer) => buffer,
                None => vec![0u8; self.buffer_size],
            };

            // Sequential readers (and readers draining full windows) get
            // read-ahead; a short read after a random seek fetches only what
            // the caller can hold.
            let sequential = state.f_cursor_after_last_read.is_none()
                || state.f_cursor_after_last_read == Some(state.f_cursor)
                || dst.len() >= self.buffer_size;
            let refill = if sequential {
                self.refill_with_read_ahead(state.f_cursor, &mut buffer).await
            } else {
                let direct_len = self.buffer_size.min(dst.len());
                self.refill_direct(state.f_cursor, &mut buffer[..direct_len])
                    .await
            };
            state.buffer = Some(buffer);
            let bytes_read = refill?;

            state.first_read = false;

            let Some(n) = bytes_read else {
                return Ok(None);
            };
            state.limit += n;
            state.f_cursor += n as u64;
            state.f_cursor_after_last_read = Some(state.f_cursor);
        }

        Ok(Some(self.copy_to_consumer(state, dst, off, len)))
    }

    /// First-read strategy for objects that fit in the window.
    async fn read_file_completely(
        &self,
        state: &mut StreamState,
        dst: &mut [u8],
        off: usize,
        len: usize,
    ) -> Result<Option<usize>> {
        if len == 0 {
            return Ok(Some(0));
        }
        if !self.validate(state, dst.len(), off, len)? {
            return Ok(None);
        }
        state.save_cursors();
        debug_assert!(
            state.f_cursor <= self.content_length
                && self.content_length <= self.buffer_size as u64
        );
        // the whole object lands at window offset 0, so the consumer view
        // is simply the pre-read position
        state.b_cursor = state.f_cursor as usize;
        self.optimised_read(state, dst, off, len, 0, self.content_length as usize)
            .await
    }

    /// First-read strategy for footer probes: fetch the last window-sized
    /// block in one request.
    async fn read_last_block(
        &self,
        state: &mut StreamState,
        dst: &mut [u8],
        off: usize,
        len: usize,
    ) -> Result<Option<usize>> {
        if len == 0 {
            return Ok(Some(0));
        }
        if !self.validate(state, dst.len(), off, len)? {
            return Ok(None);
        }
        state.save_cursors();
        let last_block_start = self.content_length.saturating_sub(self.buffer_size as u64);
        state.b_cursor = (state.f_cursor - last_block_start) as usize;
        let actual_len = self.content_length.min(self.buffer_size as u64) as usize;
        self.optimised_read(state, dst, off, len, last_block_start, actual_len)
            .await
    }

    /// Shared optimised refill: up to `MAX_OPTIMIZED_READ_ATTEMPTS` direct
    /// reads of `[read_from, read_from + actual_len)` into a fresh window.
    ///
    /// Failure or a short result that misses the consumer's offset rolls the
    /// cursors back and re-runs the request through `read_one_block`.
    async fn optimised_read(
        &self,
        state: &mut StreamState,
        dst: &mut [u8],
        off: usize,
        len: usize,
        read_from: u64,
        actual_len: usize,
    ) -> Result<Option<usize>> {
        state.f_cursor = read_from;
        let mut buffer = vec![0u8; self.buffer_size];
        let mut total = 0usize;
        let mut failure: Option<Error> = None;

        let mut attempts = 0;
        while attempts < MAX_OPTIMIZED_READ_ATTEMPTS && state.f_cursor < self.content_length {
            attempts += 1;
            match self
                .refill_direct(state.f_cursor, &mut buffer[state.limit..actual_len])
                .await
            {
                Ok(Some(n)) if n > 0 => {
                    total += n;
                    state.limit += n;
                    state.f_cursor += n as u64;
                    state.f_cursor_after_last_read = Some(state.f_cursor);
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    // a vanished object is never recovered
                    state.first_read = false;
                    state.buffer = Some(buffer);
                    state.restore_cursors();
                    return Err(e);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        // optimised strategies run at most once per stream, succeed or fail
        state.first_read = false;
        state.buffer = Some(buffer);

        if let Some(e) = failure {
            warn!(
                path = %self.path,
                read_from,
                error = %e,
                "Optimised refill failed, falling back to block read"
            );
            state.restore_cursors();
            return self.read_one_block(state, dst, off, len).await;
        }

        if total < 1 {
            state.restore_cursors();
            return Ok(None);
        }

        // A short fetch can leave the consumer's window offset past the
        // bytes actually present; the block path re-reads from the original
        // position instead.
        if state.f_cursor < self.content_length && state.b_cursor > state.limit {
            trace!(
                path = %self.path,
                fetched = state.limit,
                wanted_from = state.b_cursor,
                "Optimised refill fell short of the requested offset"
            );
            state.restore_cursors();
            return self.read_one_block(state, dst, off, len).await;
        }

        Ok(Some(self.copy_to_consumer(state, dst, off, len)))
    }

    fn copy_to_consumer(&self, state: &mut StreamState, dst: &mut [u8], off: usize, len: usize) -> usize {
        let remaining = state.limit - state.b_cursor;
        let n = len.min(remaining);
        let buffer = state
            .buffer
            .as_ref()
            .expect("window buffer allocated before copy");
        dst[off..off + n].copy_from_slice(&buffer[state.b_cursor..state.b_cursor + n]);
        state.b_cursor += n;
        self.stats.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
        n
    }

    /// Sequential refill: schedule prefetches for the windows ahead, then
    /// serve this one from the pool or fall back to a direct read.
    ///
    /// `window` must be the stream's own buffer starting at its first byte;
    /// the sequential branch of `read_one_block` is the only call site.
    async fn refill_with_read_ahead(
        &self,
        position: u64,
        window: &mut [u8],
    ) -> Result<Option<usize>> {
        let mut remaining_depth = self.read_ahead_queue_depth;
        let mut next_offset = position;
        while remaining_depth > 0 && next_offset < self.content_length {
            let next_size =
                (self.content_length - next_offset).min(self.buffer_size as u64) as usize;
            self.pool
                .enqueue(self.id, Arc::clone(&self.range_reader), next_offset, next_size);
            next_offset += next_size as u64;
            remaining_depth -= 1;
        }

        let serve_len = window
            .len()
            .min((self.content_length - position) as usize);
        let received = self.pool.try_serve(self.id, position, serve_len, window).await;
        if received > 0 {
            self.stats.read_ahead_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(received));
        }

        self.refill_direct(position, window).await
    }

    async fn refill_direct(&self, position: u64, dst: &mut [u8]) -> Result<Option<usize>> {
        self.stats.remote_reads.fetch_add(1, Ordering::Relaxed);
        let len = dst.len();
        self.range_reader.read_range(position, dst, 0, len).await
    }
}

impl Drop for BlobReader {
    fn drop(&mut self) {
        // a reader dropped without close still releases its pool entries
        self.pool.evict(self.id);
    }
}

fn check_slice_bounds(dst_len: usize, off: usize, len: usize) -> Result<()> {
    if off.checked_add(len).map_or(true, |end| end > dst_len) {
        return Err(Error::IndexOutOfBounds {
            offset: off,
            length: len,
            buffer_len: dst_len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex as StdMutex;

    struct ArrayClient {
        data: Vec<u8>,
        calls: StdMutex<Vec<(u64, usize)>>,
    }

    #[async_trait]
    impl RangeClient for ArrayClient {
        async fn read_range(
            &self,
            _path: &str,
            position: u64,
            length: usize,
            _etag: &str,
        ) -> Result<Bytes> {
            self.calls.lock().unwrap().push((position, length));
            let start = position as usize;
            let end = (start + length).min(self.data.len());
            Ok(Bytes::copy_from_slice(&self.data[start..end]))
        }
    }

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn open_reader(data: Vec<u8>, config: ReaderConfig) -> (Arc<ArrayClient>, BlobReader) {
        let client = Arc::new(ArrayClient {
            data,
            calls: StdMutex::new(Vec::new()),
        });
        let len = client.data.len() as u64;
        let pool = Arc::new(ReadAheadPool::new(PoolConfig {
            queue_depth: Some(2),
            ..Default::default()
        }));
        let reader = BlobReader::open_with_pool(
            client.clone(),
            "bucket/object.parquet",
            len,
            "etag-0",
            config,
            pool,
        )
        .unwrap();
        (client, reader)
    }

    fn plain_config(buffer_size: usize) -> ReaderConfig {
        ReaderConfig {
            buffer_size,
            read_ahead_queue_depth: Some(2),
            read_small_files_completely: false,
            optimize_footer_read: false,
            ..Default::default()
        }
    }

    // ---------------------------------------------------------------
    // Positioning
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_new_stream_starts_at_zero() {
        let (_, reader) = open_reader(patterned(100), plain_config(16));
        assert_eq!(reader.get_pos().await.unwrap(), 0);
        assert_eq!(reader.available().await.unwrap(), 100);
        assert_eq!(reader.length().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_seek_bounds() {
        let (_, reader) = open_reader(patterned(100), plain_config(16));
        assert!(matches!(
            reader.seek(-1).await.unwrap_err(),
            Error::NegativeSeek(-1)
        ));
        assert!(matches!(reader.seek(101).await.unwrap_err(), Error::PastEof));
        reader.seek(100).await.unwrap();
        assert_eq!(reader.get_pos().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_seek_within_window_is_cursor_move() {
        let config = ReaderConfig {
            // one prefetch per refill keeps the call count deterministic
            read_ahead_queue_depth: Some(1),
            ..plain_config(32)
        };
        let (client, reader) = open_reader(patterned(100), config);
        let mut dst = vec![0u8; 8];
        reader.read(&mut dst, 0, 8).await.unwrap();
        let calls_after_first = client.calls.lock().unwrap().len();

        // window now covers [0, 32); a seek inside must not refetch
        reader.seek(20).await.unwrap();
        reader.read(&mut dst, 0, 8).await.unwrap();
        assert_eq!(dst, &patterned(100)[20..28]);
        assert_eq!(client.calls.lock().unwrap().len(), calls_after_first);
    }

    #[tokio::test]
    async fn test_seek_to_current_pos_is_noop() {
        let (_, reader) = open_reader(patterned(64), plain_config(16));
        let mut dst = vec![0u8; 10];
        reader.read(&mut dst, 0, 10).await.unwrap();
        let pos = reader.get_pos().await.unwrap();
        reader.seek(pos as i64).await.unwrap();
        assert_eq!(reader.get_pos().await.unwrap(), pos);
    }

    #[tokio::test]
    async fn test_skip_clamps_and_reports_delta() {
        let (_, reader) = open_reader(patterned(100), plain_config(16));
        assert_eq!(reader.skip(40).await.unwrap(), 40);
        assert_eq!(reader.get_pos().await.unwrap(), 40);

        // clamped forward
        assert_eq!(reader.skip(1000).await.unwrap(), 60);
        assert_eq!(reader.get_pos().await.unwrap(), 100);

        // at EOF, forward skip is an error, backward is fine
        assert!(matches!(reader.skip(1).await.unwrap_err(), Error::PastEof));
        assert_eq!(reader.skip(-30).await.unwrap(), -30);
        assert_eq!(reader.get_pos().await.unwrap(), 70);

        // clamped backward
        assert_eq!(reader.skip(-500).await.unwrap(), -70);
        assert_eq!(reader.get_pos().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_available_tracks_position() {
        let (_, reader) = open_reader(patterned(100), plain_config(16));
        let mut dst = vec![0u8; 30];
        reader.read(&mut dst, 0, 30).await.unwrap();
        assert_eq!(reader.available().await.unwrap(), 70);
        reader.seek(95).await.unwrap();
        assert_eq!(reader.available().await.unwrap(), 5);
    }

    // ---------------------------------------------------------------
    // Reading
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_sequential_read_matches_object() {
        let data = patterned(1000);
        let (_, reader) = open_reader(data.clone(), plain_config(64));
        let mut out = Vec::new();
        let mut chunk = vec![0u8; 37];
        while let Some(n) = reader.read(&mut chunk, 0, 37).await.unwrap() {
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn test_zero_length_read_returns_zero() {
        let (_, reader) = open_reader(patterned(10), plain_config(16));
        let mut dst = vec![0u8; 4];
        assert_eq!(reader.read(&mut dst, 0, 0).await.unwrap(), Some(0));
        // even at EOF
        reader.seek(10).await.unwrap();
        assert_eq!(reader.read(&mut dst, 0, 0).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_read_at_eof_returns_none() {
        let (_, reader) = open_reader(patterned(10), plain_config(16));
        reader.seek(10).await.unwrap();
        let mut dst = vec![0u8; 4];
        assert_eq!(reader.read(&mut dst, 0, 4).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_rejects_bad_slice_bounds() {
        let (_, reader) = open_reader(patterned(10), plain_config(16));
        let mut dst = vec![0u8; 4];
        assert!(matches!(
            reader.read(&mut dst, 2, 4).await.unwrap_err(),
            Error::IndexOutOfBounds { .. }
        ));
        assert!(matches!(
            reader.read(&mut dst, usize::MAX, 2).await.unwrap_err(),
            Error::IndexOutOfBounds { .. }
        ));
    }

    #[tokio::test]
    async fn test_read_byte_walks_the_stream() {
        let data = vec![250u8, 251, 252];
        let (_, reader) = open_reader(data, plain_config(2));
        assert_eq!(reader.read_byte().await.unwrap(), Some(250));
        assert_eq!(reader.read_byte().await.unwrap(), Some(251));
        assert_eq!(reader.read_byte().await.unwrap(), Some(252));
        assert_eq!(reader.read_byte().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_position_identity_after_mixed_operations() {
        let data = patterned(500);
        let (_, reader) = open_reader(data.clone(), plain_config(64));
        let mut dst = vec![0u8; 48];

        reader.read(&mut dst, 0, 48).await.unwrap();
        assert_eq!(reader.get_pos().await.unwrap(), 48);

        reader.seek(130).await.unwrap();
        let n = reader.read(&mut dst, 0, 48).await.unwrap().unwrap();
        assert_eq!(reader.get_pos().await.unwrap(), 130 + n as u64);
        assert_eq!(&dst[..n], &data[130..130 + n]);
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let (_, reader) = open_reader(patterned(10), plain_config(16));
        reader.close().await.unwrap();
        reader.close().await.unwrap();

        let mut dst = vec![0u8; 4];
        assert!(matches!(
            reader.read(&mut dst, 0, 4).await.unwrap_err(),
            Error::StreamClosed
        ));
        assert!(matches!(reader.seek(0).await.unwrap_err(), Error::StreamClosed));
        assert!(matches!(reader.skip(1).await.unwrap_err(), Error::StreamClosed));
        assert!(matches!(
            reader.get_pos().await.unwrap_err(),
            Error::StreamClosed
        ));
        assert!(matches!(
            reader.available().await.unwrap_err(),
            Error::StreamClosed
        ));
        assert!(matches!(
            reader.length().await.unwrap_err(),
            Error::StreamClosed
        ));
    }

    #[tokio::test]
    async fn test_mark_reset_unsupported() {
        let (_, reader) = open_reader(patterned(10), plain_config(16));
        assert!(matches!(
            reader.mark(5).unwrap_err(),
            Error::Unsupported("mark")
        ));
        assert!(matches!(
            reader.reset().unwrap_err(),
            Error::Unsupported("reset")
        ));
        assert!(!reader.mark_supported());
        assert!(!reader.seek_to_new_source(3).unwrap());
    }

    #[tokio::test]
    async fn test_empty_object() {
        let (client, reader) = open_reader(Vec::new(), plain_config(16));
        let mut dst = vec![0u8; 4];
        assert_eq!(reader.read(&mut dst, 0, 4).await.unwrap(), None);
        assert_eq!(reader.available().await.unwrap(), 0);
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats_count_consumer_bytes() {
        let (_, reader) = open_reader(patterned(100), plain_config(32));
        let mut dst = vec![0u8; 50];
        reader.read(&mut dst, 0, 50).await.unwrap();
        assert_eq!(reader.stats().bytes_read(), 50);
        assert!(reader.stats().remote_reads() + reader.stats().read_ahead_hits() >= 1);
    }
}
