//! Blob storage for intermediate buckets and output partitions.
//!
//! Every artifact has a deterministic name derived from its producer, so
//! concurrent workers writing different artifacts never collide. A blob
//! becomes visible to readers atomically: the filesystem store writes to a
//! unique temporary name and renames into place.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Name of the intermediate bucket produced by `map_task` for `partition`.
pub fn bucket_name(map_task: u64, partition: u32) -> String {
    format!("mr-{map_task}-{partition}")
}

/// Name of the output blob for a reduce partition.
pub fn output_name(partition: u32) -> String {
    format!("mr-out-{partition}")
}

/// Whole-blob storage keyed by name.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Publish `data` under `name`, replacing any previous blob wholesale.
    async fn put(&self, name: &str, data: Bytes) -> Result<()>;

    /// Read the blob named `name` in full.
    async fn get(&self, name: &str) -> Result<Bytes>;
}

#[async_trait]
impl<B: BlobStore + ?Sized> BlobStore for std::sync::Arc<B> {
    async fn put(&self, name: &str, data: Bytes) -> Result<()> {
        (**self).put(name, data).await
    }

    async fn get(&self, name: &str) -> Result<Bytes> {
        (**self).get(name).await
    }
}

/// In-memory store, used by tests and the standalone path.
#[derive(Default)]
pub struct MemBlobStore {
    blobs: DashMap<String, Bytes>,
}

impl MemBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blobs.contains_key(name)
    }
}

#[async_trait]
impl BlobStore for MemBlobStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<()> {
        self.blobs.insert(name.to_string(), data);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Bytes> {
        self.blobs
            .get(name)
            .map(|entry| entry.value().clone())
            .with_context(|| format!("no blob named `{name}`"))
    }
}

/// Store backed by a local directory shared between workers.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        // Stage under a unique temp name so readers never observe a
        // half-written blob; the rename is the publication point.
        let staging = self.root.join(format!(".{}.{}", name, Uuid::new_v4()));
        tokio::fs::write(&staging, &data)
            .await
            .with_context(|| format!("failed to write {}", staging.display()))?;
        let dest = self.root.join(name);
        tokio::fs::rename(&staging, &dest)
            .await
            .with_context(|| format!("failed to publish {}", dest.display()))?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Bytes> {
        let path = self.root.join(name);
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_deterministic() {
        assert_eq!(bucket_name(3, 0), "mr-3-0");
        assert_eq!(bucket_name(3, 1), "mr-3-1");
        assert_eq!(output_name(7), "mr-out-7");
    }

    #[tokio::test]
    async fn mem_store_round_trips() {
        let store = MemBlobStore::new();
        store.put("mr-0-0", Bytes::from_static(b"records")).await.unwrap();
        assert_eq!(store.get("mr-0-0").await.unwrap(), "records");
        assert!(store.get("mr-0-1").await.is_err());
    }

    #[tokio::test]
    async fn fs_store_round_trips_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.put("mr-out-0", Bytes::from_static(b"a 1\n")).await.unwrap();
        store.put("mr-out-0", Bytes::from_static(b"a 2\n")).await.unwrap();
        assert_eq!(store.get("mr-out-0").await.unwrap(), "a 2\n");
    }

    #[tokio::test]
    async fn fs_store_missing_blob_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        assert!(store.get("mr-1-1").await.is_err());
    }
}
