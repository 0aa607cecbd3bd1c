//! Stream and Pool Configuration
//!
//! This module defines configuration for opened streams and for the
//! read-ahead pool.
//!
//! ## ReaderConfig
//!
//! Controls how a single stream buffers and optimises its reads:
//!
//! - **buffer_size**: Size of the in-memory window (default: 4MB)
//! - **read_ahead_queue_depth**: Prefetches scheduled per sequential refill
//!   (default: number of available processors)
//! - **tolerate_oob_appends**: Re-read with a wildcard etag so appends made
//!   after open do not fail the stream
//! - **read_small_files_completely**: Inline the whole object on the first
//!   read when it fits in the window (default: on)
//! - **optimize_footer_read**: Inline the last window-sized block on a
//!   footer-first probe (default: on)
//!
//! ## PoolConfig
//!
//! Controls the process-wide read-ahead pool:
//!
//! - **queue_depth**: Concurrent prefetch slots (default: available processors)
//! - **max_cached_buffers**: Completed prefetch buffers retained (default: 16)
//! - **serve_timeout_ms**: Upper bound on waiting for an in-flight prefetch
//!   in `try_serve` before the caller falls back to a direct read
//!
//! ## Usage
//!
//! ```ignore
//! use blobstream::ReaderConfig;
//!
//! // Footer-heavy workload on small windows
//! let config = ReaderConfig {
//!     buffer_size: 256 * 1024,
//!     read_small_files_completely: false,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use blobstream_core::{Error, Result};

/// Per-stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Window buffer size in bytes (default: 4MB)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Prefetches scheduled per sequential refill.
    /// `None` defaults to the number of available processors.
    #[serde(default)]
    pub read_ahead_queue_depth: Option<usize>,

    /// Re-read with a wildcard etag, tolerating out-of-band appends
    #[serde(default)]
    pub tolerate_oob_appends: bool,

    /// Inline small objects entirely on the first read (default: true)
    #[serde(default = "default_true")]
    pub read_small_files_completely: bool,

    /// Inline the tail block on footer-first probes (default: true)
    #[serde(default = "default_true")]
    pub optimize_footer_read: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            read_ahead_queue_depth: None,
            tolerate_oob_appends: false,
            read_small_files_completely: true,
            optimize_footer_read: true,
        }
    }
}

impl ReaderConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::InvalidConfig(
                "buffer_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn effective_queue_depth(&self) -> usize {
        self.read_ahead_queue_depth.unwrap_or_else(available_processors)
    }
}

/// Read-ahead pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Concurrent prefetch slots.
    /// `None` defaults to the number of available processors.
    #[serde(default)]
    pub queue_depth: Option<usize>,

    /// Completed prefetch buffers retained before the oldest is dropped
    /// (default: 16)
    #[serde(default = "default_max_cached_buffers")]
    pub max_cached_buffers: usize,

    /// How long `try_serve` waits for an in-flight prefetch (default: 500ms)
    #[serde(default = "default_serve_timeout_ms")]
    pub serve_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            queue_depth: None,
            max_cached_buffers: default_max_cached_buffers(),
            serve_timeout_ms: default_serve_timeout_ms(),
        }
    }
}

impl PoolConfig {
    pub(crate) fn effective_queue_depth(&self) -> usize {
        self.queue_depth.unwrap_or_else(available_processors)
    }
}

fn available_processors() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_buffer_size() -> usize {
    4 * 1024 * 1024 // 4MB, sized for full columnar row groups
}

fn default_max_cached_buffers() -> usize {
    16
}

fn default_serve_timeout_ms() -> u64 {
    500 // covers one object-store round trip
}

fn default_true() -> bool {
    true
}
