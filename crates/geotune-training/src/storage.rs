//! S3-compatible object storage access.

use crate::config::StorageConfig;
use crate::error::{TrainingError, TrainingResult};
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::debug;

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Token for the next page; `None` once the listing is exhausted.
    pub next_token: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of keys under `prefix`, continuing from `continuation_token`.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> TrainingResult<ListPage>;

    /// Fetch `key` and write it to `dest`. The parent directory must exist.
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> TrainingResult<()>;
}

/// [`ObjectStore`] backed by the AWS S3 SDK, usable against any
/// S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// Build a client bound to the configured endpoint and region.
    ///
    /// Credentials come from `config.credentials`. Nothing is sent over the
    /// network until the first call.
    pub fn new(config: &StorageConfig) -> TrainingResult<Self> {
        let creds = config.credentials.as_ref().ok_or_else(|| {
            TrainingError::Config("object storage credentials are not configured".to_string())
        })?;

        let credentials = Credentials::new(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
            None,
            None,
            "geotune-environment",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(config.endpoint.clone())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self { client: aws_sdk_s3::Client::from_conf(s3_config) })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> TrainingResult<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| {
                TrainingError::Storage(format!(
                    "failed to list s3://{bucket}/{prefix}: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let keys: Vec<String> =
            output.contents().iter().filter_map(|object| object.key().map(str::to_string)).collect();
        debug!(bucket, prefix, keys = keys.len(), "listed page");

        Ok(ListPage { keys, next_token: output.next_continuation_token().map(str::to_string) })
    }

    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> TrainingResult<()> {
        let output = self.client.get_object().bucket(bucket).key(key).send().await.map_err(|e| {
            TrainingError::Storage(format!("failed to get s3://{bucket}/{key}: {}", DisplayErrorContext(&e)))
        })?;

        let body = output.body.into_async_read();
        tokio::pin!(body);
        let written = stream_to_file(&mut body, dest).await.map_err(|e| {
            TrainingError::Storage(format!("failed to write s3://{bucket}/{key} to {}: {e}", dest.display()))
        })?;
        debug!(bucket, key, bytes = written, "downloaded object");
        Ok(())
    }
}

/// Sibling path the body is streamed into before it is renamed over `dest`.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Copy `reader` to `dest`. `dest` only appears once the whole stream has
/// been written; on error the partial file is removed.
pub(crate) async fn stream_to_file<R>(reader: &mut R, dest: &Path) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let part = partial_path(dest);
    let result = async {
        let mut file = tokio::fs::File::create(&part).await?;
        let written = tokio::io::copy(reader, &mut file).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&part, dest).await?;
        Ok::<_, std::io::Error>(written)
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&part).await;
    }
    result
}
