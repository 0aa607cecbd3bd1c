//! Shared test client: a deterministic in-memory object with a call log and
//! an optional reply script for fault injection.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use blobstream::{BlobReader, Error, PoolConfig, RangeClient, ReadAheadPool, ReaderConfig, Result};

/// What the next call should answer with. The script is consumed front to
/// back; once empty, every call serves real data.
pub enum Reply {
    Data,
    Short(usize),
    Fail,
    Missing,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub position: u64,
    pub length: usize,
    pub etag: String,
}

pub struct ScriptedClient {
    pub data: Vec<u8>,
    calls: Mutex<Vec<Call>>,
    script: Mutex<VecDeque<Reply>>,
}

impl ScriptedClient {
    pub fn new(data: Vec<u8>) -> Arc<Self> {
        Self::with_script(data, Vec::new())
    }

    pub fn with_script(data: Vec<u8>, script: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            data,
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(script.into_iter().collect()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn positions(&self) -> Vec<u64> {
        self.calls.lock().unwrap().iter().map(|c| c.position).collect()
    }
}

#[async_trait]
impl RangeClient for ScriptedClient {
    async fn read_range(
        &self,
        _path: &str,
        position: u64,
        length: usize,
        etag: &str,
    ) -> Result<Bytes> {
        self.calls.lock().unwrap().push(Call {
            position,
            length,
            etag: etag.to_string(),
        });

        let reply = self.script.lock().unwrap().pop_front().unwrap_or(Reply::Data);
        let start = position as usize;
        let end = (start + length).min(self.data.len());
        match reply {
            Reply::Data => Ok(Bytes::copy_from_slice(&self.data[start..end])),
            Reply::Short(n) => {
                let short_end = (start + n).min(end);
                Ok(Bytes::copy_from_slice(&self.data[start..short_end]))
            }
            Reply::Fail => Err(Error::Io("injected transport failure".to_string())),
            Reply::Missing => Err(Error::NotFound("object vanished".to_string())),
        }
    }
}

/// Deterministic non-trivial content: no byte equals its low offset byte,
/// so off-by-one copies show up as mismatches.
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + 7) % 251) as u8).collect()
}

/// Open a reader over `client` with its own pool, so tests never share
/// prefetch state through the process-wide singleton.
pub fn open_reader(client: Arc<ScriptedClient>, config: ReaderConfig) -> BlobReader {
    let pool = Arc::new(ReadAheadPool::new(PoolConfig {
        queue_depth: Some(2),
        ..Default::default()
    }));
    open_reader_with_pool(client, config, pool)
}

pub fn open_reader_with_pool(
    client: Arc<ScriptedClient>,
    config: ReaderConfig,
    pool: Arc<ReadAheadPool>,
) -> BlobReader {
    let len = client.data.len() as u64;
    BlobReader::open_with_pool(client, "bench/data.parquet", len, "\"v1\"", config, pool).unwrap()
}

/// Wait until the client has logged at least `n` calls; background prefetch
/// workers log asynchronously.
pub async fn wait_for_calls(client: &ScriptedClient, n: usize) {
    for _ in 0..200 {
        if client.call_count() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!(
        "expected at least {} client calls, saw {}",
        n,
        client.call_count()
    );
}
