use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{
    DownloadLink, FileListing, GetOptions, ListOptions, ProgressCallback, ProgressSnapshot,
    PutOptions, StorageError, StorageGateway, StorageItem, UploadReceipt,
};
use crate::config::StorageConfig;

/// Objects larger than this are sent as a multipart upload of parts this size.
pub const PART_SIZE: usize = 5 * 1024 * 1024;

/// S3 bucket partitioned per identity (`private/{identity}/...`).
pub struct S3StorageGateway {
    client: Client,
    bucket: String,
    identity_id: Option<String>,
    link_expiry: Duration,
}

impl S3StorageGateway {
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        identity_id: Option<String>,
        link_expiry: Duration,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            identity_id,
            link_expiry,
        }
    }

    /// Builds a client from the default AWS credential chain.
    pub async fn from_config(config: &StorageConfig, identity_id: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self::new(
            Client::from_conf(builder.build()),
            config.bucket.clone(),
            identity_id,
            config.link_expiry,
        )
    }

    fn object_key(&self, level: super::AccessLevel, key: &str) -> Result<String, StorageError> {
        let scope = level.prefix(self.identity_id.as_deref())?;
        Ok(format!("{scope}{key}"))
    }

    async fn put_multipart(
        &self,
        object_key: &str,
        data: &[u8],
        content_type: Option<String>,
        progress: Option<&ProgressCallback>,
    ) -> Result<(), StorageError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(object_key)
            .set_content_type(content_type)
            .send()
            .await
            .map_err(backend)?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::Backend("multipart upload id missing".to_string()))?
            .to_string();

        let uploaded = match self
            .upload_parts(object_key, &upload_id, data, progress)
            .await
        {
            Ok(parts) => self.complete_multipart(object_key, &upload_id, parts).await,
            Err(err) => Err(err),
        };

        if let Err(err) = uploaded {
            if let Err(abort) = self
                .client
                .abort_multipart_upload()
                .bucket(&self.bucket)
                .key(object_key)
                .upload_id(&upload_id)
                .send()
                .await
            {
                warn!(key = object_key, error = %DisplayErrorContext(&abort), "abort multipart upload failed");
            }
            return Err(err);
        }
        Ok(())
    }

    async fn complete_multipart(
        &self,
        object_key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), StorageError> {
        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(object_key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn upload_parts(
        &self,
        object_key: &str,
        upload_id: &str,
        data: &[u8],
        progress: Option<&ProgressCallback>,
    ) -> Result<Vec<CompletedPart>, StorageError> {
        let total = data.len() as u64;
        let mut loaded = 0u64;
        let mut parts = Vec::new();

        for (index, range) in part_ranges(data.len(), PART_SIZE).into_iter().enumerate() {
            let part_number = (index + 1) as i32;
            let len = range.len() as u64;
            let output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(object_key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(data[range].to_vec()))
                .send()
                .await
                .map_err(backend)?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );

            loaded += len;
            debug!(key = object_key, part_number, loaded, total, "uploaded part");
            if let Some(callback) = progress {
                callback(ProgressSnapshot::new(loaded, total));
            }
        }

        Ok(parts)
    }
}

#[async_trait]
impl StorageGateway for S3StorageGateway {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        options: PutOptions,
    ) -> Result<UploadReceipt, StorageError> {
        let PutOptions {
            content_type,
            level,
            progress,
        } = options;
        let object_key = self.object_key(level, key)?;
        let total = data.len() as u64;

        if data.len() > PART_SIZE {
            self.put_multipart(&object_key, &data, content_type, progress.as_ref())
                .await?;
        } else {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&object_key)
                .set_content_type(content_type)
                .body(ByteStream::from(data))
                .send()
                .await
                .map_err(backend)?;
            if let Some(callback) = &progress {
                callback(ProgressSnapshot::new(total, total));
            }
        }

        Ok(UploadReceipt {
            key: key.to_string(),
        })
    }

    async fn get(&self, key: &str, options: GetOptions) -> Result<DownloadLink, StorageError> {
        let object_key = self.object_key(options.level, key)?;
        let expires_in = options.expires_in.unwrap_or(self.link_expiry);
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|err| StorageError::Presign(err.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .presigned(presigning)
            .await
            .map_err(|err| StorageError::Presign(DisplayErrorContext(&err).to_string()))?;

        let expires_at = chrono::Duration::from_std(expires_in)
            .ok()
            .map(|lifetime| Utc::now() + lifetime);
        Ok(DownloadLink {
            url: request.uri().to_string(),
            expires_at,
        })
    }

    async fn list(&self, prefix: &str, options: ListOptions) -> Result<FileListing, StorageError> {
        let scope = options.level.prefix(self.identity_id.as_deref())?;
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(format!("{scope}{prefix}"))
            .into_paginator()
            .send();

        let mut listing = FileListing::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(backend)?;
            for object in page.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                listing.push(StorageItem {
                    key: strip_scope(key, &scope).to_string(),
                    size: object.size().and_then(|size| u64::try_from(size).ok()),
                    e_tag: object.e_tag().map(str::to_string),
                    last_modified: object.last_modified().and_then(|ts| {
                        DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())
                    }),
                });
            }
        }

        Ok(listing)
    }
}

fn backend<E>(err: E) -> StorageError
where
    E: std::error::Error + 'static,
{
    StorageError::Backend(DisplayErrorContext(&err).to_string())
}

fn strip_scope<'a>(key: &'a str, scope: &str) -> &'a str {
    key.strip_prefix(scope).unwrap_or(key)
}

/// Consecutive byte ranges of at most `part_size` covering `total` bytes.
fn part_ranges(total: usize, part_size: usize) -> Vec<Range<usize>> {
    (0..total)
        .step_by(part_size.max(1))
        .map(|start| start..(start + part_size).min(total))
        .collect()
}
