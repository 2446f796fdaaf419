use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default lifetime of a signed download link.
pub const DEFAULT_LINK_TTL_SECS: u64 = 3600;

/// Disposition hint that makes browsers save the object instead of rendering it.
pub const ATTACHMENT_DISPOSITION: &str = "attachment";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Upload of {key} failed: {message}")]
    Upload { key: String, message: String },

    #[error("Signing link for {key} failed: {message}")]
    Sign { key: String, message: String },

    #[error("Bucket {bucket} is unreachable: {message}")]
    Unreachable { bucket: String, message: String },
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Bucket every operation targets.
    fn bucket(&self) -> &str;

    /// Copies a local file to `key` in the bucket.
    async fn upload_file(&self, local_path: &Path, key: &str) -> Result<(), StorageError>;

    /// Mints a time-bounded GET URL for `key`.
    async fn generate_presigned_url(
        &self,
        key: &str,
        expires_in_secs: u64,
        content_disposition: &str,
    ) -> Result<String, StorageError>;

    /// Cheap connectivity check used by the health endpoint.
    async fn check_bucket(&self) -> Result<(), StorageError>;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload_file(&self, local_path: &Path, key: &str) -> Result<(), StorageError> {
        let upload_err = |message: String| StorageError::Upload {
            key: key.to_string(),
            message,
        };

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| upload_err(e.to_string()))?;

        let res = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type_for(key))
            .body(body)
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                "S3 put_object failed: bucket={}, key={}, error={:?}",
                self.bucket,
                key,
                e
            );
            return Err(upload_err(DisplayErrorContext(&e).to_string()));
        }
        Ok(())
    }

    async fn generate_presigned_url(
        &self,
        key: &str,
        expires_in_secs: u64,
        content_disposition: &str,
    ) -> Result<String, StorageError> {
        let sign_err = |message: String| StorageError::Sign {
            key: key.to_string(),
            message,
        };

        let presigning = PresigningConfig::expires_in(Duration::from_secs(expires_in_secs))
            .map_err(|e| sign_err(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_disposition(content_disposition)
            .presigned(presigning)
            .await
            .map_err(|e| sign_err(e.to_string()))?;

        Ok(request.uri().to_string())
    }

    async fn check_bucket(&self) -> Result<(), StorageError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| StorageError::Unreachable {
                bucket: self.bucket.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })
    }
}

/// MIME type for an object key, from its extension.
pub fn content_type_for(key: &str) -> &'static str {
    let extension = Path::new(key)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("opus") | Some("ogg") | Some("vorbis") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("wav") => "audio/wav",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

    fn offline_service(bucket: &str) -> S3StorageService {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new(
                "AKIDEXAMPLE",
                "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
                None,
                None,
                "static",
            ))
            .build();
        S3StorageService::new(Client::from_conf(config), bucket.to_string())
    }

    #[tokio::test]
    async fn test_presigned_url_encodes_bucket_key_and_expiry() {
        let storage = offline_service("music-bucket");
        let url = storage
            .generate_presigned_url(
                "musicas/My Song Remix.mp3",
                DEFAULT_LINK_TTL_SECS,
                ATTACHMENT_DISPOSITION,
            )
            .await
            .unwrap();

        assert!(url.contains("music-bucket"), "{url}");
        assert!(url.contains("musicas/My%20Song%20Remix.mp3"), "{url}");
        assert!(url.contains("X-Amz-Expires=3600"), "{url}");
        assert!(url.contains("response-content-disposition=attachment"), "{url}");
        assert!(url.contains("X-Amz-Signature="), "{url}");
    }

    #[tokio::test]
    async fn test_presigned_url_rejects_excessive_ttl() {
        let storage = offline_service("music-bucket");
        // SigV4 links are capped at seven days
        let err = storage
            .generate_presigned_url("musicas/a.mp3", 8 * 24 * 3600, ATTACHMENT_DISPOSITION)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Sign { .. }));
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_upload_error() {
        let storage = offline_service("music-bucket");
        let err = storage
            .upload_file(Path::new("/definitely/not/here.mp3"), "musicas/x.mp3")
            .await
            .unwrap_err();
        match err {
            StorageError::Upload { key, .. } => assert_eq!(key, "musicas/x.mp3"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_content_type_follows_extension() {
        assert_eq!(content_type_for("musicas/Song.mp3"), "audio/mpeg");
        assert_eq!(content_type_for("musicas/Song.M4A"), "audio/mp4");
        assert_eq!(content_type_for("musicas/Song.opus"), "audio/ogg");
        assert_eq!(content_type_for("musicas/Song.flac"), "audio/flac");
        assert_eq!(content_type_for("musicas/Song.wav"), "audio/wav");
        assert_eq!(content_type_for("musicas/Song"), "application/octet-stream");
    }

    /// Client pointed at a closed local port, so every request fails to dispatch.
    fn unreachable_service(bucket: &str) -> S3StorageService {
        use aws_sdk_s3::config::retry::RetryConfig;

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("AKID", "SECRET", None, None, "static"))
            .endpoint_url("http://127.0.0.1:1")
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .build();
        S3StorageService::new(Client::from_conf(config), bucket.to_string())
    }

    #[tokio::test]
    async fn test_upload_dispatch_failure_keeps_cause() {
        let storage = unreachable_service("music-bucket");
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"ID3").unwrap();

        let err = storage
            .upload_file(file.path(), "musicas/x.mp3")
            .await
            .unwrap_err();
        match err {
            StorageError::Upload { message, .. } => {
                assert!(message.contains("dispatch failure"), "{message}");
                assert_ne!(message, "unhandled error");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_check_bucket_dispatch_failure_keeps_cause() {
        let storage = unreachable_service("music-bucket");
        let err = storage.check_bucket().await.unwrap_err();
        match err {
            StorageError::Unreachable { bucket, message } => {
                assert_eq!(bucket, "music-bucket");
                assert!(message.contains("dispatch failure"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
