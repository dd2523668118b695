//! Local-disk storage for uploaded images

use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_or_default, env_parse_or};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::upload::DEFAULT_MAX_IMAGE_BYTES;

/// Where blobs live on disk and how records refer to them
#[derive(Debug, Clone, PartialEq)]
pub struct BlobStoreConfig {
    pub dir: PathBuf,
    /// URL prefix stored in records and served statically, e.g. `/uploads`
    pub url_prefix: String,
    pub max_image_bytes: usize,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            url_prefix: "/uploads".to_string(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Environment variables:
/// - `UPLOAD_DIR` (default `uploads`)
/// - `UPLOAD_URL_PREFIX` (default `/uploads`)
/// - `UPLOAD_MAX_BYTES` (default 5 MiB)
impl FromEnv for BlobStoreConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url_prefix = env_or_default("UPLOAD_URL_PREFIX", "/uploads");
        let url_prefix = format!("/{}", url_prefix.trim_matches('/'));

        Ok(Self {
            dir: PathBuf::from(env_or_default("UPLOAD_DIR", "uploads")),
            url_prefix,
            max_image_bytes: env_parse_or("UPLOAD_MAX_BYTES", DEFAULT_MAX_IMAGE_BYTES)?,
        })
    }
}

/// Storage for image blobs addressed by relative path
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under a fresh name with `extension`; returns the relative path.
    async fn put(&self, extension: &str, bytes: &[u8]) -> io::Result<String>;

    /// Remove a blob. `Ok(false)` when it was already gone.
    async fn delete(&self, path: &str) -> io::Result<bool>;

    async fn exists(&self, path: &str) -> io::Result<bool>;
}

/// Blobs as files in one flat directory
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        let url_prefix = url_prefix.into();
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Create the store and its directory.
    pub async fn open(config: &BlobStoreConfig) -> io::Result<Self> {
        let store = Self::new(&config.dir, &config.url_prefix);
        tokio::fs::create_dir_all(&store.root).await?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative path back to a file under the root.
    ///
    /// Anything outside the prefix, nested, or hidden resolves to `None`.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let name = path
            .strip_prefix(self.url_prefix.as_str())?
            .strip_prefix('/')?;

        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && name != "..";

        valid.then(|| self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, extension: &str, bytes: &[u8]) -> io::Result<String> {
        let name = format!("{}.{}", Uuid::now_v7(), extension.to_ascii_lowercase());

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.root.join(&name))
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        let path = format!("{}/{}", self.url_prefix, name);
        debug!(%path, "Stored blob");
        Ok(path)
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> io::Result<bool> {
        let Some(file) = self.resolve(path) else {
            return Ok(false);
        };

        match tokio::fs::remove_file(file).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, path: &str) -> io::Result<bool> {
        match self.resolve(path) {
            Some(file) => tokio::fs::try_exists(file).await,
            None => Ok(false),
        }
    }
}
