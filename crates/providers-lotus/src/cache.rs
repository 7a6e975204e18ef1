//! A permanent on-disk cache of RPC results.

use serde_json::Value;
use spacemon_derive::errors::ProviderError;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{trace, warn};

/// Stores RPC results as JSON files in a directory, one file per call.
///
/// Only results that can never change may be cached: those scoped to a finalized tipset, or
/// addressed by content.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Opens the cache at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, ProviderError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ProviderError::Cache(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads a cached result. A missing or unreadable entry is a miss.
    pub async fn get(&self, name: &str) -> Option<Value> {
        let path = self.dir.join(name);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(target: "lotus", path = %path.display(), "Failed to read cache entry: {e}");
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(value) => {
                trace!(target: "lotus", name, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(target: "lotus", path = %path.display(), "Ignoring corrupt cache entry: {e}");
                None
            }
        }
    }

    /// Writes a result to the cache.
    pub async fn put(&self, name: &str, value: &Value) -> Result<(), ProviderError> {
        let path = self.dir.join(name);
        let data = serde_json::to_vec(value)
            .map_err(|e| ProviderError::Cache(format!("encode {name}: {e}")))?;
        fs::write(&path, data)
            .await
            .map_err(|e| ProviderError::Cache(format!("write {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path().join("mainnet")).await.unwrap();
        assert!(cache.dir().is_dir());
        assert_eq!(cache.get("entry.json").await, None);

        cache.put("entry.json", &json!({ "Method": 34 })).await.unwrap();
        assert_eq!(cache.get("entry.json").await, Some(json!({ "Method": 34 })));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("bad.json"), b"{not json").unwrap();
        assert_eq!(cache.get("bad.json").await, None);
    }
}
