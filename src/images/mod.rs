//! Artwork cache: image keys resolved to local JPEG files.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

/// Turns an image key into a local file path.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// `None` when the image can't be made available locally.
    async fn resolve(&self, image_key: &str) -> Option<PathBuf>;

    /// Resolve each distinct key once, concurrently. Keys that fail are
    /// absent from the map.
    async fn resolve_many(&self, image_keys: Vec<String>) -> HashMap<String, PathBuf> {
        let unique: Vec<String> = image_keys
            .into_iter()
            .filter(|key| !key.is_empty())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let resolved = join_all(unique.iter().map(|key| self.resolve(key))).await;

        unique
            .into_iter()
            .zip(resolved)
            .filter_map(|(key, path)| path.map(|p| (key, p)))
            .collect()
    }
}

/// Source of image bytes (the Roon image service).
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch `image_key` scaled to fit `size`×`size`, as JPEG.
    async fn fetch_jpeg(&self, image_key: &str, size: u32) -> anyhow::Result<Vec<u8>>;
}

/// On-disk cache keyed by image key, stored as `<dir>/<image_key>.jpg`.
pub struct ImageCache {
    dir: PathBuf,
    size: u32,
    fetcher: Arc<dyn ImageFetcher>,
}

impl ImageCache {
    pub fn new(dir: impl Into<PathBuf>, size: u32, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            dir: dir.into(),
            size,
            fetcher,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for `image_key`, if the key is usable as a file name.
    pub fn path_for(&self, image_key: &str) -> Option<PathBuf> {
        if image_key.is_empty()
            || image_key.contains(['/', '\\'])
            || image_key.starts_with('.')
        {
            return None;
        }
        Some(self.dir.join(format!("{}.jpg", image_key)))
    }

    /// Remove cached files not modified within `max_age`.
    ///
    /// Returns how many files were removed. Errors are logged, never raised.
    pub async fn clear_old(&self, max_age: Duration) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Image cache not readable ({}): {}", self.dir.display(), e);
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let age = meta
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age > max_age && tokio::fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!("Removed {} stale cached images", removed);
        }
        removed
    }

    async fn fetch_and_store(&self, image_key: &str, path: &Path) -> anyhow::Result<()> {
        let bytes = self.fetcher.fetch_jpeg(image_key, self.size).await?;
        if bytes.is_empty() {
            anyhow::bail!("empty image");
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl ImageResolver for ImageCache {
    async fn resolve(&self, image_key: &str) -> Option<PathBuf> {
        let path = self.path_for(image_key)?;

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Some(path);
        }

        match self.fetch_and_store(image_key, &path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Failed to cache image {}: {}", image_key, e);
                None
            }
        }
    }
}
