//! blobstream - Buffered Positioned Reads over Cloud Objects
//!
//! This crate implements the read path used to serve columnar analytics
//! formats (Parquet, ORC) directly from object storage: a positioned,
//! buffered, read-only byte stream over one immutable remote object whose
//! size is known at open time.
//!
//! ## What Problem Does It Solve?
//!
//! Object stores answer a ranged GET in ~50-200ms. Columnar readers issue
//! three very different access patterns against the same file:
//!
//! 1. **Footer-first probes**: open, seek near the end, read the metadata
//! 2. **Sequential scans**: read row groups front to back
//! 3. **Random seeks**: jump between column chunks
//!
//! A naive stream pays one round trip per buffer refill for all three.
//! This crate keeps byte-exact equivalence with that naive reader while
//! collapsing round trips three ways:
//!
//! - **Read-ahead**: sequential refills schedule background prefetches of
//!   the next windows through a process-wide pool of fetch slots
//! - **Small-file inlining**: a first read of an object that fits in the
//!   window fetches the whole object at once
//! - **Tail-block inlining**: a first read inside the footer region fetches
//!   the entire last window-sized block at once
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  read/seek/skip   ┌───────────────┐
//! │   Consumer   │ ────────────────→ │   BlobReader  │ window + cursors
//! └──────────────┘                   └───────┬───────┘
//!                                  refill    │     ↑ serve by copy
//!                                            ▼     │
//!                                    ┌───────────────┐
//!                                    │ ReadAheadPool │ slots + cache
//!                                    └───────┬───────┘
//!                                            │
//!                                            ▼
//!                                    ┌───────────────┐
//!                                    │  RangeReader  │ one ranged GET
//!                                    └───────┬───────┘
//!                                            │
//!                                            ▼
//!                                    ┌───────────────┐
//!                                    │  RangeClient  │ object_store, ...
//!                                    └───────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use blobstream::{BlobReader, ObjectStoreClient, ReaderConfig};
//!
//! let store: Arc<dyn object_store::ObjectStore> = make_store()?;
//! let meta = store.head(&"warehouse/part-0.parquet".into()).await?;
//!
//! let client = Arc::new(ObjectStoreClient::new(store));
//! let reader = BlobReader::open(
//!     client,
//!     "warehouse/part-0.parquet",
//!     meta.size as u64,
//!     meta.e_tag.unwrap_or_default(),
//!     ReaderConfig::default(),
//! )?;
//!
//! // footer probe: one request thanks to tail-block inlining
//! reader.seek(meta.size as i64 - 8).await?;
//! let mut magic = [0u8; 8];
//! reader.read(&mut magic, 0, 8).await?;
//! ```
//!
//! ## Guarantees
//!
//! - Successive reads return bytes in strict object order from the current
//!   position; optimisations never change observed bytes, only round trips
//! - A failed optimised first read rolls back and retries through the plain
//!   path; only a vanished object (404) surfaces directly
//! - One window buffer per open stream, allocated lazily, freed on close
//! - Prefetch buffers are pool-owned and handed over by copy, never shared

pub mod config;
pub mod range_reader;
pub mod read_ahead;
pub mod reader;
pub mod store_client;

pub use blobstream_core::{Error, RangeClient, Result, FOOTER_SIZE, MAX_OPTIMIZED_READ_ATTEMPTS};

pub use config::{PoolConfig, ReaderConfig};
pub use range_reader::RangeReader;
pub use read_ahead::{PoolStats, ReadAheadPool, StreamId};
pub use reader::{BlobReader, ReadStats};
pub use store_client::ObjectStoreClient;
