//! Read-Ahead Pool - Background Prefetch for Sequential Streams
//!
//! This module implements `ReadAheadPool`, the process-wide coordinator that
//! hides object-store latency behind the consumer's own reads.
//!
//! ## The Problem
//!
//! Object stores answer a ranged GET in tens to hundreds of milliseconds.
//! A sequential scan that refills its window synchronously pays that latency
//! on every window boundary:
//!
//! ```text
//! read ──wait 80ms── read ──wait 80ms── read ──wait 80ms── ...
//! ```
//!
//! ## The Solution
//!
//! When a stream refills sequentially, it asks the pool to fetch the next
//! few windows in the background. By the time the consumer drains the
//! current window, the next one is usually already in memory:
//!
//! ```text
//! refill(offset)
//!     ↓
//! enqueue offset, offset+W, offset+2W, ...   (up to the stream's depth)
//!     ↓
//! try_serve(offset) ── completed? ──YES──→ copy, consume entry, done
//!     │
//!     in flight? → wait briefly for the worker
//!     │
//!     miss → caller performs its own direct read
//! ```
//!
//! ## Ownership and Identity
//!
//! Entries are keyed by `(StreamId, offset, length)`. The id is a
//! monotonically assigned handle allocated at open, so the pool never keeps
//! a stream alive and eviction after close is a plain key sweep. Prefetched
//! bytes live in pool-owned `Bytes` buffers; `try_serve` hands them to the
//! stream by copy, never by aliasing the stream's window.
//!
//! ## Bounds
//!
//! - At most `queue_depth` prefetches run at once; `enqueue` drops requests
//!   when every slot is busy rather than queueing unboundedly.
//! - At most `max_cached_buffers` completed buffers are retained; the oldest
//!   unconsumed result is dropped first.
//! - Served entries are consumed immediately (single-reader semantics), so
//!   a hit costs one buffer for exactly one refill.
//!
//! Failed prefetches never satisfy `try_serve`; the caller falls back to a
//! direct read and surfaces that read's own outcome.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use lazy_static::lazy_static;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::config::PoolConfig;
use crate::range_reader::RangeReader;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(0);

/// Stable, collision-free identity of one open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u64);

impl StreamId {
    pub(crate) fn next() -> Self {
        StreamId(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EntryKey {
    stream: StreamId,
    offset: u64,
    length: usize,
}

enum EntryStatus {
    Queued,
    Running,
    Done(Bytes),
    Failed,
}

struct Entry {
    key: EntryKey,
    status: Mutex<EntryStatus>,
    done: Notify,
}

struct PoolState {
    entries: HashMap<EntryKey, Arc<Entry>>,
    /// Completed keys, oldest first, for bounding the cache.
    completed: VecDeque<EntryKey>,
    slots_in_use: usize,
}

/// Point-in-time pool counters, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub slots_in_use: usize,
    pub cached_buffers: usize,
    pub tracked_entries: usize,
}

lazy_static! {
    static ref GLOBAL_POOL: Arc<ReadAheadPool> = Arc::new(ReadAheadPool::new(PoolConfig::default()));
}

/// Process-wide prefetch coordinator.
pub struct ReadAheadPool {
    queue_depth: usize,
    max_cached_buffers: usize,
    serve_timeout: Duration,
    state: Mutex<PoolState>,
}

impl ReadAheadPool {
    /// The shared pool every stream uses unless handed a private one.
    pub fn global() -> Arc<ReadAheadPool> {
        Arc::clone(&GLOBAL_POOL)
    }

    pub fn new(config: PoolConfig) -> Self {
        Self {
            queue_depth: config.effective_queue_depth().max(1),
            max_cached_buffers: config.max_cached_buffers,
            serve_timeout: Duration::from_millis(config.serve_timeout_ms),
            state: Mutex::new(PoolState {
                entries: HashMap::new(),
                completed: VecDeque::new(),
                slots_in_use: 0,
            }),
        }
    }

    /// Schedule a background fetch of `[offset, offset + length)`.
    ///
    /// Idempotent: a request matching an in-flight or cached entry is
    /// absorbed. Non-blocking: when every worker slot is busy the request
    /// is dropped, not queued.
    pub fn enqueue(
        self: &Arc<Self>,
        stream: StreamId,
        reader: Arc<RangeReader>,
        offset: u64,
        length: usize,
    ) {
        if length == 0 {
            return;
        }
        let key = EntryKey {
            stream,
            offset,
            length,
        };

        let entry = {
            let mut state = self.state.lock().unwrap();
            if state.entries.contains_key(&key) {
                trace!(?stream, offset, length, "Prefetch already scheduled");
                return;
            }
            if state.slots_in_use >= self.queue_depth {
                debug!(
                    ?stream,
                    offset,
                    length,
                    slots = self.queue_depth,
                    "All prefetch slots busy, dropping request"
                );
                return;
            }
            state.slots_in_use += 1;
            let entry = Arc::new(Entry {
                key,
                status: Mutex::new(EntryStatus::Queued),
                done: Notify::new(),
            });
            state.entries.insert(key, Arc::clone(&entry));
            entry
        };

        trace!(?stream, offset, length, "Prefetch scheduled");

        let pool = Arc::clone(self);
        tokio::spawn(async move {
            *entry.status.lock().unwrap() = EntryStatus::Running;
            let result = reader.read_range_to_bytes(offset, length).await;
            pool.publish(&entry, result);
        });
    }

    /// Serve `[position, position + length)` from a prefetched buffer.
    ///
    /// Matches any entry of the same stream whose requested range covers the
    /// requested one; waits up to the configured bound for an in-flight
    /// entry; copies up to `length` bytes into `dst` and consumes the entry.
    /// Returns `0` on miss.
    pub async fn try_serve(
        &self,
        stream: StreamId,
        position: u64,
        length: usize,
        dst: &mut [u8],
    ) -> usize {
        if length == 0 {
            return 0;
        }
        let deadline = tokio::time::Instant::now() + self.serve_timeout;

        loop {
            let entry = match self.find_covering(stream, position, length) {
                Some(entry) => entry,
                None => return 0,
            };

            {
                let status = entry.status.lock().unwrap();
                match &*status {
                    EntryStatus::Done(data) => {
                        let start = (position - entry.key.offset) as usize;
                        let avail = data.len().saturating_sub(start);
                        let n = length.min(avail).min(dst.len());
                        dst[..n].copy_from_slice(&data[start..start + n]);
                        drop(status);
                        self.consume(entry.key);
                        trace!(?stream, position, served = n, "Read-ahead hit");
                        return n;
                    }
                    EntryStatus::Failed => {
                        drop(status);
                        self.consume(entry.key);
                        return 0;
                    }
                    EntryStatus::Queued | EntryStatus::Running => {}
                }
            }

            if tokio::time::Instant::now() >= deadline {
                trace!(?stream, position, "In-flight prefetch missed the deadline");
                return 0;
            }
            // Re-check after either a completion signal or the deadline.
            let _ = tokio::time::timeout_at(deadline, entry.done.notified()).await;
        }
    }

    /// Discard every entry belonging to `stream`.
    ///
    /// In-flight fetches are not interrupted; their results arrive
    /// unreferenced and are reclaimed in `publish`.
    pub fn evict(&self, stream: StreamId) {
        let mut state = self.state.lock().unwrap();
        state.entries.retain(|key, _| key.stream != stream);
        state.completed.retain(|key| key.stream != stream);
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock().unwrap();
        PoolStats {
            slots_in_use: state.slots_in_use,
            cached_buffers: state.completed.len(),
            tracked_entries: state.entries.len(),
        }
    }

    /// Ranges currently tracked for `stream`, in no particular order.
    pub fn scheduled_ranges(&self, stream: StreamId) -> Vec<(u64, usize)> {
        let state = self.state.lock().unwrap();
        state
            .entries
            .keys()
            .filter(|key| key.stream == stream)
            .map(|key| (key.offset, key.length))
            .collect()
    }

    fn find_covering(&self, stream: StreamId, position: u64, length: usize) -> Option<Arc<Entry>> {
        let state = self.state.lock().unwrap();
        state
            .entries
            .iter()
            .find(|(key, _)| {
                key.stream == stream
                    && key.offset <= position
                    && position + length as u64 <= key.offset + key.length as u64
            })
            .map(|(_, entry)| Arc::clone(entry))
    }

    fn consume(&self, key: EntryKey) {
        let mut state = self.state.lock().unwrap();
        state.entries.remove(&key);
        state.completed.retain(|k| *k != key);
    }

    /// Worker completion: release the slot and publish or discard the result.
    fn publish(&self, entry: &Arc<Entry>, result: blobstream_core::Result<Bytes>) {
        {
            let mut state = self.state.lock().unwrap();
            state.slots_in_use -= 1;

            let still_wanted = state
                .entries
                .get(&entry.key)
                .map(|current| Arc::ptr_eq(current, entry))
                .unwrap_or(false);

            match result {
                Ok(data) if still_wanted => {
                    *entry.status.lock().unwrap() = EntryStatus::Done(data);
                    state.completed.push_back(entry.key);
                    while state.completed.len() > self.max_cached_buffers {
                        if let Some(oldest) = state.completed.pop_front() {
                            state.entries.remove(&oldest);
                            trace!(
                                stream = ?oldest.stream,
                                offset = oldest.offset,
                                "Cache full, dropping oldest prefetch"
                            );
                        }
                    }
                }
                Ok(_) => {
                    trace!(
                        stream = ?entry.key.stream,
                        offset = entry.key.offset,
                        "Stream gone before prefetch completed, dropping result"
                    );
                }
                Err(e) => {
                    *entry.status.lock().unwrap() = EntryStatus::Failed;
                    state.entries.remove(&entry.key);
                    debug!(
                        stream = ?entry.key.stream,
                        offset = entry.key.offset,
                        length = entry.key.length,
                        error = %e,
                        "Prefetch failed, callers will read directly"
                    );
                }
            }
        }
        entry.done.notify_one();
    }
}
