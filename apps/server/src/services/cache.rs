// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Disk-based overlay cache using cacache.

use crate::error::ApiError;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Content-addressable disk cache. Entries older than `max_age` are treated
/// as missing and removed on read.
#[derive(Debug, Clone)]
pub struct DiskCache {
    cache_dir: PathBuf,
    max_age: Duration,
}

/// Whether an entry written at `written_ms` (Unix millis) has outlived `max_age`.
fn is_expired(written_ms: u128, now_ms: u128, max_age: Duration) -> bool {
    now_ms.saturating_sub(written_ms) >= max_age.as_millis()
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

impl DiskCache {
    /// Create a new cache in the specified directory.
    pub async fn new(cache_dir: &str, max_age: Duration) -> Self {
        let path = PathBuf::from(cache_dir);

        if let Err(e) = tokio::fs::create_dir_all(&path).await {
            tracing::warn!(
                error = %e,
                path = %path.display(),
                "Failed to create cache directory"
            );
        }

        Self {
            cache_dir: path,
            max_age,
        }
    }

    /// Cache key for a request: SHA256 of its canonical JSON.
    pub fn generate_key<T: Serialize>(request: &T) -> Result<String, ApiError> {
        let data = serde_json::to_vec(request)?;
        let mut hasher = Sha256::new();
        hasher.update(b"overlay:v1:");
        hasher.update(&data);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Get a cached value by key.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ApiError> {
        let Some(metadata) = cacache::metadata(&self.cache_dir, key).await? else {
            return Ok(None);
        };
        if is_expired(metadata.time, now_ms(), self.max_age) {
            tracing::debug!(key = %key, "Cache entry expired");
            if let Err(e) = cacache::remove(&self.cache_dir, key).await {
                tracing::warn!(key = %key, error = %e, "Failed to remove expired entry");
            }
            return Ok(None);
        }

        match cacache::read(&self.cache_dir, key).await {
            Ok(data) => {
                let value: T = serde_json::from_slice(&data)?;
                Ok(Some(value))
            }
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(e) => Err(ApiError::Cache(e.to_string())),
        }
    }

    /// Set a cached value.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ApiError> {
        let data = serde_json::to_vec(value)?;
        cacache::write(&self.cache_dir, key, &data).await?;
        tracing::debug!(key = %key, size = data.len(), "Cached overlay");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_is_stable_and_distinct() {
        let a = DiskCache::generate_key(&json!({"lat": 1.0, "lng": 2.0})).unwrap();
        let b = DiskCache::generate_key(&json!({"lat": 1.0, "lng": 2.0})).unwrap();
        let c = DiskCache::generate_key(&json!({"lat": 1.0, "lng": 2.5})).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_round_trip_and_miss() {
        let dir = std::env::temp_dir().join(format!("roofline-cache-{}", uuid::Uuid::new_v4()));
        let cache = DiskCache::new(dir.to_str().unwrap(), Duration::from_secs(3600)).await;

        assert!(cache.get::<Vec<u32>>("missing").await.unwrap().is_none());
        cache.set("k", &vec![1u32, 2, 3]).await.unwrap();
        assert_eq!(cache.get::<Vec<u32>>("k").await.unwrap(), Some(vec![1, 2, 3]));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[test]
    fn test_expiry_boundary() {
        let day = Duration::from_secs(86_400);
        assert!(!is_expired(1_000, 1_000 + day.as_millis() - 1, day));
        assert!(is_expired(1_000, 1_000 + day.as_millis(), day));
        // Clock skew never expires an entry from the future
        assert!(!is_expired(5_000, 1_000, day));
    }

    #[tokio::test]
    async fn test_stale_entry_is_not_served() {
        let dir = std::env::temp_dir().join(format!("roofline-cache-{}", uuid::Uuid::new_v4()));
        let path = dir.to_str().unwrap();

        let writer = DiskCache::new(path, Duration::from_secs(3600)).await;
        writer.set("k", &vec![1u32]).await.unwrap();
        assert_eq!(writer.get::<Vec<u32>>("k").await.unwrap(), Some(vec![1]));

        let expired = DiskCache::new(path, Duration::ZERO).await;
        assert!(expired.get::<Vec<u32>>("k").await.unwrap().is_none());
        // Expired entries are dropped, not just hidden
        assert!(writer.get::<Vec<u32>>("k").await.unwrap().is_none());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
