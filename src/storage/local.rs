//! Object store backed by a directory on local disk.
//!
//! Object keys are `/`-separated paths relative to the root, so
//! `pc_img/sunset.jpg` lives at `{root}/pc_img/sunset.jpg`. Listing
//! walks the directory that contains the prefix and keeps every regular
//! file whose key starts with it, recursing into subdirectories the way
//! a flat bucket listing would.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;

use super::{ObjectEntry, ObjectStore, StorageError};

pub struct LocalBucket {
    root: PathBuf,
}

impl LocalBucket {
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

/// Weak validator in the same spirit as nginx: size and mtime in hex.
fn etag_for(meta: &std::fs::Metadata) -> Option<String> {
    let modified = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
    Some(format!("\"{:x}-{:x}\"", modified.as_secs(), meta.len()))
}

/// Directory portion of a prefix: `pc_img/2024-` walks `pc_img/`.
fn start_dir(prefix: &str) -> &str {
    prefix.rfind('/').map_or("", |idx| &prefix[..idx])
}

fn key_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

#[async_trait]
impl ObjectStore for LocalBucket {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StorageError> {
        let start = self.root.join(start_dir(prefix));
        let exists = tokio::fs::try_exists(&start)
            .await
            .map_err(|e| StorageError::new("local", e))?;
        if !exists {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let mut pending = vec![start];

        while let Some(dir) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| StorageError::new("local", e))?;

            while let Some(entry) = read_dir
                .next_entry()
                .await
                .map_err(|e| StorageError::new("local", e))?
            {
                let path = entry.path();
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| StorageError::new("local", e))?;

                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !meta.is_file() {
                    continue;
                }

                let Some(key) = key_for(&self.root, &path) else {
                    tracing::debug!(path = %path.display(), "skipping non-UTF-8 object path");
                    continue;
                };
                if key.starts_with(prefix) {
                    entries.push(ObjectEntry {
                        key,
                        etag: etag_for(&meta),
                    });
                }
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}
