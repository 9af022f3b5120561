use crate::config::S3Config;
use crate::error::MetadataError;
use crate::metadata::DicomMetadata;
use crate::s3path::S3Path;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, info, instrument};

/// Path-addressed access to the object store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the raw bytes of the object at an `s3://bucket/key` path.
    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, MetadataError>;

    /// Write a record as a JSON document at an `s3://bucket/key` path,
    /// overwriting any existing object. Last writer wins.
    async fn put_json(&self, path: &str, record: &DicomMetadata) -> Result<(), MetadataError>;
}

/// Blob store gateway backed by S3.
pub struct S3BlobStore {
    client: S3Client,
}

impl S3BlobStore {
    pub async fn new(config: &S3Config) -> anyhow::Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(region = %config.region, "S3 blob store initialized");

        Ok(Self { client })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[instrument(skip(self))]
    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, MetadataError> {
        let parsed = S3Path::parse(path)?;

        let response = self
            .client
            .get_object()
            .bucket(&parsed.bucket)
            .key(&parsed.key)
            .send()
            .await
            .map_err(|err| map_get_error(err, path))?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|err| MetadataError::transport(path, err))?;

        let bytes = body.to_vec();
        debug!(bucket = %parsed.bucket, key = %parsed.key, size_bytes = bytes.len(), "fetched object");

        Ok(bytes)
    }

    #[instrument(skip(self, record))]
    async fn put_json(&self, path: &str, record: &DicomMetadata) -> Result<(), MetadataError> {
        let parsed = S3Path::parse(path)?;

        let payload = serde_json::to_vec(record)
            .map_err(|err| MetadataError::Validation(format!("unserializable record: {err}")))?;

        self.client
            .put_object()
            .bucket(&parsed.bucket)
            .key(&parsed.key)
            .body(ByteStream::from(payload))
            .content_type("application/json")
            .send()
            .await
            .map_err(|err| map_put_error(err, path))?;

        info!(bucket = %parsed.bucket, key = %parsed.key, "uploaded JSON document");

        Ok(())
    }
}

fn map_get_error(err: SdkError<GetObjectError>, path: &str) -> MetadataError {
    if let Some(service_error) = err.as_service_error() {
        if service_error.is_no_such_key() {
            return MetadataError::NotFound(path.to_string());
        }
        if service_error.code() == Some("AccessDenied") {
            return MetadataError::AccessDenied(path.to_string());
        }
    }
    MetadataError::transport(path, err)
}

fn map_put_error(err: SdkError<PutObjectError>, path: &str) -> MetadataError {
    if err.as_service_error().and_then(|e| e.code()) == Some("AccessDenied") {
        return MetadataError::AccessDenied(path.to_string());
    }
    MetadataError::transport(path, err)
}
