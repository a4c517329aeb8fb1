//! Existence checks for resolved partition paths.
//!
//! A resolved path is either concrete (`.../tutor_activity_2024-01-01__2024-12-31.parquet`)
//! or ends in a glob (`.../day=05/*`). Concrete paths are checked with a HEAD;
//! glob paths are checked by listing the directory prefix in front of the
//! first wildcard and looking for at least one object.

use std::sync::Arc;

use futures::StreamExt;
use object_store::path::Path as ObjectPath;
use object_store::{Error as ObjectStoreError, ObjectStore};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

#[cfg(feature = "s3")]
use lakeq_core::config::StorageConfig;

/// Narrows resolved partition paths to the ones that exist.
pub trait PartitionFilter {
    fn retain_existing(&self, paths: &[String]) -> Result<Vec<String>>;
}

pub struct ObjectStoreProbe {
    runtime: Runtime,
    store: Arc<dyn ObjectStore>,
    scheme: String,
    bucket: String,
}

impl ObjectStoreProbe {
    /// `root` is the data root URI (`s3://bucket[/prefix]`); only its scheme
    /// and bucket matter, keys are taken relative to the bucket.
    pub fn new(store: Arc<dyn ObjectStore>, root: &str) -> Result<Self> {
        let parsed =
            Url::parse(root).map_err(|e| Error::Config(format!("invalid data root '{root}': {e}")))?;
        let bucket = parsed
            .host_str()
            .ok_or_else(|| Error::Config(format!("data root '{root}' has no bucket")))?
            .to_string();
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Runtime(e.to_string()))?;
        Ok(Self {
            runtime,
            store,
            scheme: parsed.scheme().to_string(),
            bucket,
        })
    }

    #[cfg(feature = "s3")]
    pub fn from_storage_config(root: &str, cfg: &StorageConfig) -> Result<Self> {
        use object_store::aws::AmazonS3Builder;

        let parsed =
            Url::parse(root).map_err(|e| Error::Config(format!("invalid data root '{root}': {e}")))?;
        let bucket = parsed
            .host_str()
            .ok_or_else(|| Error::Config(format!("data root '{root}' has no bucket")))?;
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(cfg.region.clone());
        if let Some((key, secret)) = cfg.explicit_credentials() {
            builder = builder
                .with_access_key_id(key)
                .with_secret_access_key(secret);
            if let Some(token) = &cfg.session_token {
                builder = builder.with_token(token.clone());
            }
        }
        if let Some(endpoint) = &cfg.endpoint {
            builder = builder.with_endpoint(endpoint.clone());
        }
        let store = builder
            .build()
            .map_err(|e| Error::Storage(format!("s3 builder: {e}")))?;
        Self::new(Arc::new(store), root)
    }

    /// Object key for `path`, or `None` when it lives outside our bucket.
    fn key_of<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.scheme.as_str())?.strip_prefix("://")?;
        let rest = rest.strip_prefix(self.bucket.as_str())?;
        rest.strip_prefix('/').or(if rest.is_empty() { Some("") } else { None })
    }

    fn exists(&self, key: &str) -> Result<bool> {
        match glob_prefix(key) {
            Some(prefix) => {
                let prefix = (!prefix.is_empty()).then(|| ObjectPath::from(prefix));
                let store = Arc::clone(&self.store);
                self.runtime.block_on(async move {
                    let mut stream = store.list(prefix.as_ref());
                    match stream.next().await {
                        None => Ok(false),
                        Some(Ok(_)) => Ok(true),
                        Some(Err(e)) => Err(Error::Storage(e.to_string())),
                    }
                })
            }
            None => {
                let location = ObjectPath::from(key);
                let store = Arc::clone(&self.store);
                self.runtime
                    .block_on(async move { store.head(&location).await })
                    .map(|_| true)
                    .or_else(|e| match e {
                        ObjectStoreError::NotFound { .. } => Ok(false),
                        other => Err(Error::Storage(other.to_string())),
                    })
            }
        }
    }
}

impl PartitionFilter for ObjectStoreProbe {
    fn retain_existing(&self, paths: &[String]) -> Result<Vec<String>> {
        let mut kept = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(key) = self.key_of(path) else {
                debug!(path = %path, "path outside probed bucket, keeping");
                kept.push(path.clone());
                continue;
            };
            if self.exists(key)? {
                kept.push(path.clone());
            } else {
                warn!(path = %path, "partition missing, skipping");
            }
        }
        Ok(kept)
    }
}

/// Directory prefix in front of the first wildcard, if the key has one.
fn glob_prefix(key: &str) -> Option<&str> {
    let first = key.find(['*', '?', '['])?;
    Some(key[..first].rfind('/').map_or("", |slash| &key[..slash]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    #[test]
    fn glob_prefix_cuts_at_last_directory() {
        assert_eq!(
            glob_prefix("event-capture/page_view/year=2024/month=01/day=05/*"),
            Some("event-capture/page_view/year=2024/month=01/day=05")
        );
        assert_eq!(glob_prefix("notes/highlights/*.parquet"), Some("notes/highlights"));
        assert_eq!(glob_prefix("*.parquet"), Some(""));
        assert_eq!(glob_prefix("exercises/exercises.parquet"), None);
    }

    #[test]
    fn keys_are_bucket_relative() {
        let probe = ObjectStoreProbe::new(Arc::new(InMemory::new()), "s3://lake/root").unwrap();
        assert_eq!(probe.key_of("s3://lake/a/b.parquet"), Some("a/b.parquet"));
        assert_eq!(probe.key_of("s3://other/a/b.parquet"), None);
        assert_eq!(probe.key_of("gs://lake/a"), None);
    }

    #[test]
    fn rejects_root_without_bucket() {
        assert!(ObjectStoreProbe::new(Arc::new(InMemory::new()), "not a uri").is_err());
    }
}
