//! Object-Store Backed Range Client
//!
//! `ObjectStoreClient` implements the `RangeClient` contract on top of any
//! `object_store::ObjectStore`, which is how production deployments talk to
//! S3, Azure, GCS, or MinIO, and how tests talk to an in-memory store.
//!
//! One `read_range` call becomes one conditional ranged `get_opts`:
//! the captured etag rides as an `If-Match` precondition so a rewritten
//! object fails loudly instead of serving mixed bytes, and the wildcard
//! `"*"` drops the precondition for streams tolerating out-of-band appends.
//! A missing object maps to the typed `NotFound` error; everything else is
//! a transport failure.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{GetOptions, GetRange, ObjectStore};

use blobstream_core::{Error, RangeClient, Result};

/// `RangeClient` over an `object_store` backend.
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreClient {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RangeClient for ObjectStoreClient {
    async fn read_range(
        &self,
        path: &str,
        position: u64,
        length: usize,
        etag: &str,
    ) -> Result<Bytes> {
        let location = object_store::path::Path::from(path);
        let options = GetOptions {
            if_match: if etag == "*" || etag.is_empty() {
                None
            } else {
                Some(etag.to_string())
            },
            range: Some(GetRange::Bounded(
                position as usize..position as usize + length,
            )),
            ..Default::default()
        };

        let result = self
            .store
            .get_opts(&location, options)
            .await
            .map_err(map_store_error)?;
        result.bytes().await.map_err(map_store_error)
    }
}

fn map_store_error(e: object_store::Error) -> Error {
    match e {
        object_store::Error::NotFound { path, .. } => Error::NotFound(path),
        other => Error::Io(other.to_string()),
    }
}
