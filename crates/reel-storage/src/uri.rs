//! Blob URI parsing.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{StorageError, StorageResult};

/// A parsed blob location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobUri {
    /// `file:///abs/path` or a bare filesystem path
    Local(PathBuf),
    /// `s3://bucket/key` or `r2://bucket/key`
    Object {
        scheme: String,
        bucket: String,
        key: String,
    },
}

impl BlobUri {
    pub fn parse(uri: &str) -> StorageResult<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(StorageError::invalid_uri("empty URI"));
        }

        if !uri.contains("://") {
            return Ok(BlobUri::Local(PathBuf::from(uri)));
        }

        let url = Url::parse(uri).map_err(|e| StorageError::invalid_uri(format!("{uri}: {e}")))?;

        match url.scheme() {
            "file" => url
                .to_file_path()
                .map(BlobUri::Local)
                .map_err(|_| StorageError::invalid_uri(format!("{uri}: not an absolute file path"))),
            scheme @ ("s3" | "r2") => {
                let bucket = url
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| StorageError::invalid_uri(format!("{uri}: missing bucket")))?;
                let raw_key = url.path().trim_start_matches('/');
                if raw_key.is_empty() {
                    return Err(StorageError::invalid_uri(format!("{uri}: missing object key")));
                }
                let key = urlencoding::decode(raw_key)
                    .map_err(|e| StorageError::invalid_uri(format!("{uri}: {e}")))?;

                Ok(BlobUri::Object {
                    scheme: scheme.to_string(),
                    bucket: bucket.to_string(),
                    key: key.into_owned(),
                })
            }
            other => Err(StorageError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Last path component, used to name fetched files.
    pub fn file_name(&self) -> Option<String> {
        match self {
            BlobUri::Local(path) => path.file_name().map(|n| n.to_string_lossy().to_string()),
            BlobUri::Object { key, .. } => Path::new(key)
                .file_name()
                .map(|n| n.to_string_lossy().to_string()),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, BlobUri::Local(_))
    }
}

impl fmt::Display for BlobUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobUri::Local(path) => write!(f, "{}", path.display()),
            BlobUri::Object { scheme, bucket, key } => write!(f, "{scheme}://{bucket}/{key}"),
        }
    }
}

/// Content type for an uploaded object, from its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
