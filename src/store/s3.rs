use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::{ObjectHead, OriginObject, OriginStore, DEFAULT_CONTENT_TYPE};
use crate::error::StoreError;

/// S3-backed implementation of [`OriginStore`].
///
/// The asset identifier is used verbatim as the object key within the bucket.
#[derive(Clone)]
pub struct S3OriginStore {
    client: Client,
    bucket: String,
}

impl S3OriginStore {
    /// Create a new store for the given bucket.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Get the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

/// Check whether an SDK error means "no such object".
///
/// S3-compatible services do not all map a missing key to a modeled service
/// error, so the raw status and finally the message are checked as well.
fn is_not_found<E>(err: &SdkError<E, HttpResponse>, modeled_not_found: bool) -> bool
where
    E: std::error::Error + 'static,
{
    if modeled_not_found {
        return true;
    }

    if err
        .raw_response()
        .map(|r| r.status().as_u16() == 404)
        .unwrap_or(false)
    {
        return true;
    }

    let err_str = err.to_string();
    err_str.contains("NotFound") || err_str.contains("NoSuchKey")
}

#[async_trait]
impl OriginStore for S3OriginStore {
    async fn get(&self, key: &str) -> Result<Option<OriginObject>, StoreError> {
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                let no_such_key = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if is_not_found(&e, no_such_key) {
                    return Ok(None);
                }
                return Err(StoreError::S3(format!("{}: {}", self.location(key), e)));
            }
        };

        let content_type = resp
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let integrity_tag = resp.e_tag().map(str::to_string);

        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {}", self.location(key), e)))?
            .into_bytes();

        Ok(Some(OriginObject {
            bytes,
            content_type,
            integrity_tag,
        }))
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<ObjectHead, StoreError> {
        let content_length = body.len() as u64;
        let resp = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StoreError::S3(format!("{}: {}", self.location(key), e)))?;

        Ok(ObjectHead {
            content_type: content_type.to_string(),
            content_length,
            integrity_tag: resp.e_tag().map(str::to_string),
        })
    }

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::S3(e.to_string()))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| StoreError::S3(e.to_string()))?;

        let resp = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| StoreError::S3(format!("s3://{}: {}", self.bucket, e)))?;

        if let Some(failed) = resp.errors().first() {
            return Err(StoreError::S3(format!(
                "failed to delete {}: {}",
                failed.key().unwrap_or("<unknown>"),
                failed.message().unwrap_or("unknown error")
            )));
        }

        Ok(())
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectHead>, StoreError> {
        let head = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(head) => head,
            Err(e) => {
                let not_found = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false);
                if is_not_found(&e, not_found) {
                    return Ok(None);
                }
                return Err(StoreError::S3(format!("{}: {}", self.location(key), e)));
            }
        };

        Ok(Some(ObjectHead {
            content_type: head
                .content_type()
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            content_length: head.content_length().unwrap_or(0).max(0) as u64,
            integrity_tag: head.e_tag().map(str::to_string),
        }))
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO or R2:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
///
/// For AWS S3, pass `None` to use the default endpoint:
/// ```ignore
/// let client = create_s3_client(None, "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services generally need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
