use super::backend::StorageBackend;
use super::retention::{is_expired, LatestObject};
use crate::config::S3Config;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use s3::config::{Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation};
use s3::primitives::ByteStream;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const NAME: &str = "AWS S3";
const PAGE_SIZE: i32 = 1000;

/// Objects in one S3 (or S3-compatible) bucket.
pub struct S3Backend {
    client: s3::Client,
    bucket: String,
}

fn to_utc(timestamp: &s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp.secs(), timestamp.subsec_nanos()).single()
}

impl S3Backend {
    pub async fn new(config: &S3Config) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(BackupError::Config("S3 storage needs a bucket".to_string()));
        }

        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None,
                None,
                "Static",
            ));
        if let Some(endpoint) = &config.endpoint {
            debug!("Using custom S3 endpoint {}", endpoint);
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let mut builder = s3::config::Builder::from(&sdk_config).force_path_style(config.force_path_style);
        if config.endpoint.is_some() {
            // S3-compatible stores often reject the default checksum trailers.
            builder = builder
                .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
                .response_checksum_validation(ResponseChecksumValidation::WhenRequired);
        }
        let s3_config = builder.build();

        Ok(Self {
            client: s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        })
    }

    async fn latest_object_name(&self) -> Result<String> {
        let mut latest = LatestObject::default();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(PAGE_SIZE)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| BackupError::backend(NAME, format!("failed to list objects: {}", e)))?;
            for object in page.contents() {
                if let (Some(key), Some(modified)) =
                    (object.key(), object.last_modified().and_then(to_utc))
                {
                    latest.observe(key, modified);
                }
            }
        }

        latest
            .into_name()
            .ok_or_else(|| BackupError::NotFound(format!("no objects found in bucket {}", self.bucket)))
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn upload(&self, object_name: &str, payload: Bytes) -> Result<String> {
        let size = payload.len();
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(object_name)
            .body(ByteStream::from(payload))
            .send()
            .await
            .map_err(|e| {
                BackupError::backend(
                    NAME,
                    format!("failed to upload {} to bucket {}: {}", object_name, self.bucket, e),
                )
            })?;

        debug!("Uploaded {} bytes to s3://{}/{}", size, self.bucket, object_name);
        Ok(output.e_tag().unwrap_or_default().to_string())
    }

    async fn download(&self, object_name: &str, destination: &Path) -> Result<()> {
        let mut object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_name)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    BackupError::NotFound(format!("s3://{}/{}", self.bucket, object_name))
                } else {
                    BackupError::backend(NAME, format!("failed to get object: {}", service_err))
                }
            })?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut output = File::create(destination).await?;
        let mut total = 0usize;
        while let Some(chunk) = object
            .body
            .try_next()
            .await
            .map_err(|e| BackupError::backend(NAME, format!("failed to download object: {}", e)))?
        {
            output.write_all(&chunk).await?;
            total += chunk.len();
        }
        output.flush().await?;

        info!(
            "Downloaded {} bytes from s3://{}/{} to {}",
            total,
            self.bucket,
            object_name,
            destination.display()
        );
        Ok(())
    }

    async fn resolve_target_object_name(&self, requested: &str) -> Result<String> {
        if requested.is_empty() {
            return self.latest_object_name().await;
        }

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(requested)
            .send()
            .await
        {
            Ok(_) => Ok(requested.to_string()),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    warn!("Object {} not found, falling back to the latest one", requested);
                    self.latest_object_name().await
                } else {
                    Err(BackupError::backend(
                        NAME,
                        format!("failed to retrieve metadata: {}", service_err),
                    ))
                }
            }
        }
    }

    async fn delete_expired(&self, expiry_days: u32) -> Result<()> {
        if expiry_days == 0 {
            return Ok(());
        }

        let now = Utc::now();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(PAGE_SIZE)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| BackupError::sweep(NAME, format!("error listing S3 objects: {}", e)))?;
            for object in page.contents() {
                let (Some(key), Some(modified)) = (object.key(), object.last_modified().and_then(to_utc))
                else {
                    continue;
                };
                if !is_expired(modified, now, expiry_days) {
                    continue;
                }

                match self
                    .client
                    .delete_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .send()
                    .await
                {
                    Ok(_) => info!("Deleted object: {}", key),
                    Err(e) => warn!("Failed to delete object {}: {}", key, e),
                }
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
