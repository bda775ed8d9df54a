//! Blob storage for source media, bumper images and finished reels.
//!
//! This crate provides:
//! - The `BlobStore` trait (fetch into a directory, store from a file)
//! - A local filesystem store for `file://` URIs and bare paths
//! - A Cloudflare R2 / S3-compatible store for `r2://` and `s3://` URIs
//! - A router that picks a backend by URI scheme

pub mod client;
pub mod error;
pub mod store;
pub mod uri;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use store::{BlobRouter, BlobStore, LocalBlobStore};
pub use uri::{content_type_for, BlobUri};
