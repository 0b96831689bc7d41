use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{WatchError, Result};

/// Keeps the most recent raw body of every watched URL, one file per URL,
/// named after a SHA256 digest of the URL string.
pub struct SnapshotStore {
    cache_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: Into<PathBuf>>(cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Calculate the cache key of a URL. The URL is used verbatim.
    pub fn key(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.html", key))
    }

    /// Read the snapshot for `key`. A missing file is `Ok(None)`; every other
    /// I/O failure is an error.
    pub fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(WatchError::Cache { path, source }),
        }
    }

    /// Replace the snapshot for `key`. Bytes go to a temporary sibling first
    /// and are renamed into place, so readers see the old or the new body.
    pub fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let cache_err = |source| WatchError::Cache {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.cache_dir).map_err(cache_err)?;

        let staging = self.cache_dir.join(format!(".{}.tmp", key));
        std::fs::write(&staging, bytes).map_err(cache_err)?;
        std::fs::rename(&staging, &path).map_err(cache_err)?;

        debug!("Saved snapshot {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}
