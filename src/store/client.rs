//! Object store client: a thin capability wrapper over remote storage.
//!
//! Every call carries a bounded timeout, and transient failures are retried
//! with exponential backoff here and nowhere else. Missing objects are never
//! retried.

use crate::config::{StoreBackend, StoreConfig};
use crate::constants::store::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS, INITIAL_BACKOFF_MS};
use crate::error::{Error, Result};
use bytes::Bytes;
use futures_util::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload};
use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Capability wrapper exposing list, range-read, full read and write against
/// a remote bucket. Carries no business logic.
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn ObjectStore>,
    timeout: Duration,
    max_retries: u32,
}

impl std::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreClient")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl StoreClient {
    /// Wrap an existing object store.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum retry attempts for transient failures.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Build a client from store configuration.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match config.backend {
            StoreBackend::Memory => Arc::new(InMemory::new()),
            StoreBackend::Local => {
                let root = config
                    .local_root
                    .as_ref()
                    .ok_or_else(|| Error::ConfigValidation {
                        message: "store.local_root is required for the local backend".to_string(),
                    })?;
                Arc::new(LocalFileSystem::new_with_prefix(root).map_err(|e| Error::Store {
                    operation: "init",
                    key: root.display().to_string(),
                    source: e,
                })?)
            }
            StoreBackend::S3 => {
                let mut builder = AmazonS3Builder::new().with_bucket_name(config.bucket.as_str());

                if let Some(region) = &config.region {
                    builder = builder.with_region(region.as_str());
                }
                if let (Some(access_key), Some(secret_key)) =
                    (&config.access_key, &config.secret_key)
                {
                    builder = builder
                        .with_access_key_id(access_key.as_str())
                        .with_secret_access_key(secret_key.as_str());
                }
                if let Some(endpoint) = &config.endpoint {
                    // Path-style addressing for S3-compatible endpoints.
                    builder = builder
                        .with_endpoint(endpoint.as_str())
                        .with_virtual_hosted_style_request(false);
                }
                if config.allow_http {
                    builder = builder.with_allow_http(true);
                }

                Arc::new(builder.build().map_err(|e| Error::Store {
                    operation: "init",
                    key: config.bucket.clone(),
                    source: e,
                })?)
            }
        };

        Ok(Self::new(store)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_max_retries(config.max_retries))
    }

    /// Access the underlying store, for components that drive it directly
    /// (the async parquet reader issues its own byte-range requests).
    pub fn inner(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// List all object keys under a prefix.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let path = ObjectPath::from(prefix);
        let store = Arc::clone(&self.store);
        self.with_retry("list", prefix, move || {
            let store = Arc::clone(&store);
            let path = path.clone();
            async move {
                store
                    .list(Some(&path))
                    .map_ok(|meta| meta.location.to_string())
                    .try_collect::<Vec<_>>()
                    .await
            }
        })
        .await
    }

    /// Object size in bytes, or `None` if the object does not exist.
    pub async fn head(&self, key: &str) -> Result<Option<u64>> {
        let path = ObjectPath::from(key);
        let store = Arc::clone(&self.store);
        let result = self
            .with_retry("head", key, move || {
                let store = Arc::clone(&store);
                let path = path.clone();
                async move { store.head(&path).await }
            })
            .await;

        match result {
            Ok(meta) => Ok(Some(meta.size)),
            Err(Error::ObjectNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether an object exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.head(key).await?.is_some())
    }

    /// Read a byte range from an object.
    pub async fn read_range(&self, key: &str, range: Range<u64>) -> Result<Bytes> {
        let path = ObjectPath::from(key);
        let store = Arc::clone(&self.store);
        self.with_retry("get_range", key, move || {
            let store = Arc::clone(&store);
            let path = path.clone();
            let range = range.clone();
            async move { store.get_range(&path, range).await }
        })
        .await
    }

    /// Read an entire object.
    pub async fn read_all(&self, key: &str) -> Result<Bytes> {
        let path = ObjectPath::from(key);
        let store = Arc::clone(&self.store);
        self.with_retry("get", key, move || {
            let store = Arc::clone(&store);
            let path = path.clone();
            async move { store.get(&path).await?.bytes().await }
        })
        .await
    }

    /// Write an object, replacing any previous contents.
    ///
    /// Callers that need append semantics own their object exclusively (one
    /// log object per session) and rewrite it with the appended record.
    pub async fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        let path = ObjectPath::from(key);
        let store = Arc::clone(&self.store);
        self.with_retry("put", key, move || {
            let store = Arc::clone(&store);
            let path = path.clone();
            let payload = PutPayload::from(bytes.clone());
            async move { store.put(&path, payload).await }
        })
        .await?;
        Ok(())
    }

    /// Run a store operation with timeout and bounded exponential backoff.
    ///
    /// `NotFound` is surfaced immediately: missing data is not a transient
    /// condition and must not look like one to callers.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, key: &str, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = object_store::Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match tokio::time::timeout(self.timeout, f()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(object_store::Error::NotFound { .. })) => {
                    return Err(Error::ObjectNotFound {
                        key: key.to_string(),
                    });
                }
                Ok(Err(e)) => {
                    if attempt > self.max_retries {
                        return Err(Error::Store {
                            operation,
                            key: key.to_string(),
                            source: e,
                        });
                    }
                    warn!(operation, key, attempt, error = %e, "transient store error, retrying");
                }
                Err(_elapsed) => {
                    if attempt > self.max_retries {
                        return Err(Error::Timeout {
                            operation,
                            key: key.to_string(),
                            attempts: attempt,
                        });
                    }
                    warn!(operation, key, attempt, "store call timed out, retrying");
                }
            }

            let backoff = Duration::from_millis(INITIAL_BACKOFF_MS << (attempt - 1).min(8));
            tokio::time::sleep(backoff).await;
        }
    }
}
