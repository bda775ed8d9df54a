//! Blob store trait, local filesystem store and scheme router.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::uri::BlobUri;

/// Byte storage addressed by URI.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Materialize `uri` inside `dest_dir` and return the local path.
    async fn fetch(&self, uri: &str, dest_dir: &Path) -> StorageResult<PathBuf>;

    /// Store the file at `local` under `uri` and return the stored URI.
    async fn store(&self, local: &Path, uri: &str) -> StorageResult<String>;
}

/// Name a fetched file gets inside the destination directory.
pub(crate) fn fetched_path(uri: &BlobUri, dest_dir: &Path) -> StorageResult<PathBuf> {
    let name = uri
        .file_name()
        .ok_or_else(|| StorageError::invalid_uri(format!("{uri}: no file name")))?;
    Ok(dest_dir.join(name))
}

/// Store for `file://` URIs and bare paths.
///
/// Fetching copies into the destination directory, so cleaning up a request
/// workspace never touches the original.
#[derive(Debug, Clone, Default)]
pub struct LocalBlobStore {
    /// Base for relative paths; the process working directory when unset
    root: Option<PathBuf>,
}

impl LocalBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, uri: &str) -> StorageResult<PathBuf> {
        match BlobUri::parse(uri)? {
            BlobUri::Local(path) => Ok(match &self.root {
                Some(root) if path.is_relative() => root.join(path),
                _ => path,
            }),
            other => Err(StorageError::UnsupportedScheme(format!(
                "{other} is not a local path"
            ))),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn fetch(&self, uri: &str, dest_dir: &Path) -> StorageResult<PathBuf> {
        let source = self.resolve(uri)?;
        if !tokio::fs::try_exists(&source).await? {
            return Err(StorageError::not_found(source.display().to_string()));
        }

        let dest = fetched_path(&BlobUri::Local(source.clone()), dest_dir)?;
        tokio::fs::create_dir_all(dest_dir).await?;
        tokio::fs::copy(&source, &dest).await?;

        debug!(source = %source.display(), dest = %dest.display(), "Fetched local blob");
        Ok(dest)
    }

    async fn store(&self, local: &Path, uri: &str) -> StorageResult<String> {
        let dest = self.resolve(uri)?;
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local, &dest).await?;

        info!(dest = %dest.display(), "Stored blob locally");
        Ok(uri.to_string())
    }
}

/// Dispatches on URI scheme: local paths to one store, object URIs to another.
#[derive(Clone)]
pub struct BlobRouter {
    local: Arc<dyn BlobStore>,
    object: Option<Arc<dyn BlobStore>>,
}

impl BlobRouter {
    pub fn new(local: Arc<dyn BlobStore>) -> Self {
        Self {
            local,
            object: None,
        }
    }

    /// Backend for `s3://` and `r2://` URIs.
    pub fn with_object_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.object = Some(store);
        self
    }

    fn route(&self, uri: &str) -> StorageResult<&Arc<dyn BlobStore>> {
        match BlobUri::parse(uri)? {
            BlobUri::Local(_) => Ok(&self.local),
            BlobUri::Object { scheme, .. } => self.object.as_ref().ok_or_else(|| {
                StorageError::config_error(format!("no object store configured for {scheme}:// URIs"))
            }),
        }
    }
}

impl Default for BlobRouter {
    fn default() -> Self {
        Self::new(Arc::new(LocalBlobStore::new()))
    }
}

#[async_trait]
impl BlobStore for BlobRouter {
    async fn fetch(&self, uri: &str, dest_dir: &Path) -> StorageResult<PathBuf> {
        self.route(uri)?.fetch(uri, dest_dir).await
    }

    async fn store(&self, local: &Path, uri: &str) -> StorageResult<String> {
        self.route(uri)?.store(local, uri).await
    }
}
