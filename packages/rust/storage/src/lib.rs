//! Object storage sink for distributed pipeline output.
//!
//! The [`ObjectStorage`] struct wraps an [`ObjectStore`] backend:
//! - S3-compatible endpoint (path-style, plain HTTP allowed) via [`ObjectStorage::s3`]
//! - local directory via [`ObjectStorage::local`]
//! - in-memory via [`ObjectStorage::in_memory`] (tests, dry runs)

mod jsonl;
mod layout;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hibou_shared::{HibouError, ObjectType, Result, StorageConfig, storage_credentials};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

pub use jsonl::to_jsonl;
pub use layout::ObjectLayout;

/// Retries for a failed put.
const MAX_RETRIES: u32 = 1;

/// Delay between put retries.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Metadata for a single written object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReceipt {
    pub path: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Primary storage handle.
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    location: String,
}

impl ObjectStorage {
    /// Connect to the configured S3-compatible bucket.
    ///
    /// Credentials are read from the env vars named in the config.
    pub fn s3(config: &StorageConfig) -> Result<Self> {
        let (access_key, secret_key) = storage_credentials(config)?;

        let store = AmazonS3Builder::new()
            .with_endpoint(&config.endpoint)
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key)
            .with_virtual_hosted_style_request(false)
            .with_allow_http(true)
            .build()
            .map_err(|e| HibouError::Storage(format!("failed to configure S3 client: {e}")))?;

        Ok(Self::with_store(
            Arc::new(store),
            format!("{}/{}", config.endpoint.trim_end_matches('/'), config.bucket),
        ))
    }

    /// Write objects under a local directory, creating it if needed.
    pub fn local(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| HibouError::io(dir, e))?;

        let store = LocalFileSystem::new_with_prefix(dir)
            .map_err(|e| HibouError::Storage(format!("{}: {e}", dir.display())))?;

        Ok(Self::with_store(Arc::new(store), dir.display().to_string()))
    }

    /// Keep objects in memory.
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(InMemory::new()), "memory".into())
    }

    fn with_store(store: Arc<dyn ObjectStore>, location: String) -> Self {
        Self { store, location }
    }

    /// Human-readable destination (`endpoint/bucket`, directory, or `memory`).
    pub fn location(&self) -> &str {
        &self.location
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Write records as JSON Lines, preceded by the preamble of `object_type` if given.
    pub async fn put_jsonl<T: Serialize>(
        &self,
        path: &str,
        object_type: Option<ObjectType>,
        records: &[T],
    ) -> Result<WriteReceipt> {
        let preamble = object_type.map(ObjectType::preamble);
        let body = to_jsonl(preamble.as_ref(), records)?;
        self.put_bytes(path, body).await
    }

    /// Write a single JSON document.
    pub async fn put_json<T: Serialize + ?Sized>(&self, path: &str, value: &T) -> Result<WriteReceipt> {
        let body = serde_json::to_vec(value)
            .map_err(|e| HibouError::Storage(format!("{path}: failed to serialize: {e}")))?;
        self.put_bytes(path, body).await
    }

    /// Write raw bytes, retrying once on failure.
    pub async fn put_bytes(&self, path: &str, body: Vec<u8>) -> Result<WriteReceipt> {
        let location = ObjectPath::parse(path)
            .map_err(|e| HibouError::Storage(format!("invalid object path '{path}': {e}")))?;

        let mut hasher = Sha256::new();
        hasher.update(&body);
        let receipt = WriteReceipt {
            path: path.to_string(),
            sha256: format!("{:x}", hasher.finalize()),
            size_bytes: body.len(),
        };

        let payload = PutPayload::from(body);
        let mut attempt = 0;
        loop {
            match self.store.put(&location, payload.clone()).await {
                Ok(_) => break,
                Err(e) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    warn!(%path, attempt, error = %e, "put failed, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    return Err(HibouError::Storage(format!(
                        "{}/{path}: put failed: {e}",
                        self.location
                    )));
                }
            }
        }

        debug!(%path, size = receipt.size_bytes, "wrote object");
        Ok(receipt)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Read an object back.
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let location = ObjectPath::parse(path)
            .map_err(|e| HibouError::Storage(format!("invalid object path '{path}': {e}")))?;

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| HibouError::Storage(format!("{path}: {e}")))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| HibouError::Storage(format!("{path}: {e}")))?;

        Ok(bytes.to_vec())
    }
}
