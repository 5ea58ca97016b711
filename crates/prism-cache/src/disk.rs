//! Disk tier: one file per key under the cache directory.
//!
//! File names are the SHA-256 of the key, so arbitrary URLs map to safe
//! path segments. Entries carry their TTL in an envelope so freshness
//! survives restart. Writes go through a temp file and rename, so a
//! cancelled writer never leaves a half-written entry. A file that fails
//! to parse is deleted and reported as a miss.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use tracing::debug;
use tracing::warn;

/// On-disk envelope wrapping a cached upstream body.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    /// Unix seconds at which the body was stored.
    stored_at: u64,
    /// Seconds the entry stays fresh.
    ttl_secs: u64,
    /// The cached JSON body.
    body: Value,
}

/// What a disk read produced.
#[derive(Debug)]
pub enum DiskHit {
    /// Entry present and within its TTL.
    Fresh(Arc<Value>),
    /// Entry present but expired; the stale body is kept as a warm copy
    /// that may stand in when the upstream fails transiently.
    Warm(Arc<Value>),
    /// No usable entry.
    Miss,
}

/// File-per-key cache directory.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Open (creating if needed) the cache directory.
    pub async fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Path for a key's cache file.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hash_key(key)))
    }

    /// Read an entry, enforcing its stored TTL.
    pub async fn read(&self, key: &str) -> DiskHit {
        let path = self.path_for(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(_) => return DiskHit::Miss,
        };

        match serde_json::from_slice::<Envelope>(&raw) {
            Ok(envelope) => {
                if now_secs().saturating_sub(envelope.stored_at) <= envelope.ttl_secs {
                    DiskHit::Fresh(Arc::new(envelope.body))
                } else {
                    debug!(key, "disk entry expired, treating as warm miss");
                    DiskHit::Warm(Arc::new(envelope.body))
                }
            }
            Err(e) => {
                warn!(key, error = %e, "corrupt cache file, deleting");
                let _ = tokio::fs::remove_file(&path).await;
                DiskHit::Miss
            }
        }
    }

    /// Write an entry atomically (temp file + rename).
    pub async fn write(&self, key: &str, ttl_secs: u64, body: &Value) -> std::io::Result<()> {
        let envelope = Envelope {
            stored_at: now_secs(),
            ttl_secs,
            body: body.clone(),
        };
        let bytes = serde_json::to_vec(&envelope)?;

        let path = self.path_for(key);
        let tmp = tmp_path(&path);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn round_trips_fresh_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).await.unwrap();

        let body = json!({"name": "express", "dist-tags": {"latest": "4.18.2"}});
        cache.write("https://registry.npmjs.org/express", 300, &body).await.unwrap();

        match cache.read("https://registry.npmjs.org/express").await {
            DiskHit::Fresh(value) => assert_eq!(*value, body),
            other => panic!("expected fresh hit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn expired_entries_are_warm_not_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).await.unwrap();

        cache.write("key", 0, &json!(1)).await.unwrap();
        // ttl of zero is stale as soon as a full second elapses
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        match cache.read("key").await {
            DiskHit::Warm(stale) => assert_eq!(*stale, json!(1)),
            other => panic!("expected warm hit, got {other:?}"),
        }
        // the warm copy stays on disk until replaced
        assert!(cache.path_for("key").exists());
    }

    #[tokio::test]
    async fn corrupt_files_are_deleted_and_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).await.unwrap();

        let path = cache.path_for("key");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        assert!(matches!(cache.read("key").await, DiskHit::Miss));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn distinct_keys_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(dir.path()).await.unwrap();
        assert_ne!(cache.path_for("a"), cache.path_for("b"));
    }

    #[test]
    fn hash_is_hex_sha256() {
        let hashed = hash_key("https://registry.npmjs.org/express");
        assert_eq!(hashed.len(), 64);
        assert!(hashed.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
