//! User-scoped object storage.

pub mod s3;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use s3::S3StorageGateway;

/// Lifetime of a pre-signed download link when none is configured.
pub const DEFAULT_LINK_EXPIRY_SECS: u64 = 900;

/// Storage partition an object lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Readable by every user of the app.
    Public,
    /// Readable by every user, writable only by the owner.
    Protected,
    /// Readable and writable only by the owning identity.
    #[default]
    Private,
}

impl AccessLevel {
    pub fn label(self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Protected => "protected",
            AccessLevel::Private => "private",
        }
    }

    /// Key prefix of the partition, e.g. `private/{identity}/`.
    pub fn prefix(self, identity_id: Option<&str>) -> Result<String, StorageError> {
        match self {
            AccessLevel::Public => Ok("public/".to_string()),
            AccessLevel::Protected | AccessLevel::Private => {
                let identity = identity_id
                    .filter(|id| !id.is_empty())
                    .ok_or(StorageError::MissingIdentity { level: self })?;
                Ok(format!("{}/{}/", self.label(), identity))
            }
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bytes transferred so far for one upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub loaded: u64,
    pub total: u64,
}

impl ProgressSnapshot {
    pub fn new(loaded: u64, total: u64) -> Self {
        Self { loaded, total }
    }

    /// Completed fraction clamped to `0.0..=1.0`.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.loaded as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    pub fn percent(&self) -> u8 {
        (self.ratio() * 100.0).floor() as u8
    }

    /// Text progress bar of `width` cells followed by `loaded/total`.
    pub fn render(&self, width: usize) -> String {
        let filled = ((self.ratio() * width as f64).floor() as usize).min(width);
        format!(
            "[{}{}] {}/{} bytes ({}%)",
            "#".repeat(filled),
            ".".repeat(width - filled),
            self.loaded,
            self.total,
            self.percent()
        )
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

#[derive(Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub level: AccessLevel,
    pub progress: Option<ProgressCallback>,
}

impl fmt::Debug for PutOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutOptions")
            .field("content_type", &self.content_type)
            .field("level", &self.level)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub level: AccessLevel,
    pub expires_in: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub level: AccessLevel,
}

/// Provider-assigned result of a successful put.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub key: String,
}

/// Temporary URL for fetching a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// One entry of a listing, keyed relative to its partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageItem {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl StorageItem {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: None,
            e_tag: None,
            last_modified: None,
        }
    }
}

pub type FileListing = Vec<StorageItem>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{level} storage requires a signed-in identity")]
    MissingIdentity { level: AccessLevel },
    #[error("storage request rejected: {0}")]
    Backend(String),
    #[error("could not pre-sign download link: {0}")]
    Presign(String),
}

/// Object storage operations consumed by the upload view.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        options: PutOptions,
    ) -> Result<UploadReceipt, StorageError>;

    async fn get(&self, key: &str, options: GetOptions) -> Result<DownloadLink, StorageError>;

    async fn list(&self, prefix: &str, options: ListOptions) -> Result<FileListing, StorageError>;
}
