//! Durable cache tier backed by one JSON file per entry.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

use super::{CacheStore, StoredEntry};
use crate::error::StoreError;
use crate::models::CacheKey;

/// File-per-entry store under a cache directory.
///
/// File names are the sanitized storage key plus a short digest of the raw
/// key, so arbitrary usernames cannot collide or escape the directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        let raw = key.storage_key();
        let safe: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        let digest = hex::encode(Sha256::digest(raw.as_bytes()));
        self.dir.join(format!("{}-{}.json", safe, &digest[..12]))
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = Vec::new();
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }
}

async fn read_entry(path: &Path) -> Result<Option<StoredEntry>, StoreError> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn load(&self, key: &CacheKey) -> Result<Option<StoredEntry>, StoreError> {
        read_entry(&self.entry_path(key)).await
    }

    async fn store(&self, key: &CacheKey, entry: &StoredEntry) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.entry_path(key);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_vec_pretty(entry)?;
        fs::write(&tmp, contents).await?;
        // Rename so readers never observe a partial entry.
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), StoreError> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let mut count = 0;
        for path in self.entry_files().await? {
            fs::remove_file(&path).await?;
            count += 1;
        }
        Ok(count)
    }

    async fn prune_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut count = 0;
        for path in self.entry_files().await? {
            // Unreadable entries are compacted away with the expired ones.
            let expired = match read_entry(&path).await {
                Ok(Some(entry)) => entry.is_expired(now),
                Ok(None) => false,
                Err(_) => true,
            };
            if expired {
                debug!("pruning cache entry {}", path.display());
                fs::remove_file(&path).await?;
                count += 1;
            }
        }
        Ok(count)
    }
}
