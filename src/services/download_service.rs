use crate::config::AppConfig;
use crate::services::cleanup::{self, CleanupOutcome};
use crate::services::extractor::{ExtractionError, MediaExtractor};
use crate::services::storage::{ATTACHMENT_DISPOSITION, StorageError, StorageService};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Stages a single download request moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStage {
    Received,
    Extracting,
    Uploading,
    Signing,
    CleaningUp,
    Responded,
}

impl fmt::Display for DownloadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Extracting => "extracting",
            Self::Uploading => "uploading",
            Self::Signing => "signing",
            Self::CleaningUp => "cleaning_up",
            Self::Responded => "responded",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of a fully processed request.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub request_id: Uuid,
    pub local_path: PathBuf,
    pub display_name: String,
    pub storage_key: String,
    pub signed_url: String,
    pub cleanup: CleanupOutcome,
}

/// Runs extraction, upload, signing and cleanup for one source URL.
pub struct DownloadService {
    extractor: Arc<dyn MediaExtractor>,
    storage: Arc<dyn StorageService>,
    config: Arc<AppConfig>,
}

impl DownloadService {
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        storage: Arc<dyn StorageService>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            extractor,
            storage,
            config,
        }
    }

    /// Object key for a display name: `{prefix}/{name}.{ext}`, or
    /// `{prefix}/{request_id}/{name}.{ext}` when unique keys are enabled.
    pub fn storage_key(&self, display_name: &str, request_id: Uuid) -> String {
        let file_name = format!("{}.{}", display_name, self.extractor.extension());
        let prefix = &self.config.key_prefix;
        match (prefix.is_empty(), self.config.unique_object_keys) {
            (true, false) => file_name,
            (true, true) => format!("{}/{}", request_id, file_name),
            (false, false) => format!("{}/{}", prefix, file_name),
            (false, true) => format!("{}/{}/{}", prefix, request_id, file_name),
        }
    }

    pub async fn process(&self, source_url: &str) -> Result<DownloadResult, DownloadError> {
        let request_id = Uuid::new_v4();
        let scratch_dir = self.config.temp_dir.join(request_id.to_string());
        info!(%request_id, stage = %DownloadStage::Received, "Download requested: {}", source_url);

        let result = self.run(source_url, request_id, &scratch_dir).await;

        // Leftovers (partial downloads, files from failed runs) go with the directory
        cleanup::remove_scratch_dir(&scratch_dir).await;

        match &result {
            Ok(done) => info!(
                %request_id,
                stage = %DownloadStage::Responded,
                key = %done.storage_key,
                "Download link issued"
            ),
            Err(e) => warn!(%request_id, stage = %DownloadStage::Responded, "Download failed: {}", e),
        }
        result
    }

    async fn run(
        &self,
        source_url: &str,
        request_id: Uuid,
        scratch_dir: &std::path::Path,
    ) -> Result<DownloadResult, DownloadError> {
        info!(%request_id, stage = %DownloadStage::Extracting);
        let extracted = self
            .extractor
            .resolve_and_extract(source_url, scratch_dir)
            .await?;

        if !tokio::fs::try_exists(&extracted.final_path)
            .await
            .unwrap_or(false)
        {
            return Err(ExtractionError::OutputMissing(extracted.final_path).into());
        }

        let storage_key = self.storage_key(&extracted.display_name, request_id);

        info!(%request_id, stage = %DownloadStage::Uploading, "Sending {} to bucket {} as {}",
            extracted.final_path.display(), self.storage.bucket(), storage_key);
        let uploaded = self
            .storage
            .upload_file(&extracted.final_path, &storage_key)
            .await;

        let signed = match uploaded {
            Ok(()) => {
                info!(%request_id, stage = %DownloadStage::Signing);
                self.storage
                    .generate_presigned_url(
                        &storage_key,
                        self.config.link_ttl_secs,
                        ATTACHMENT_DISPOSITION,
                    )
                    .await
            }
            Err(e) => Err(e),
        };

        info!(%request_id, stage = %DownloadStage::CleaningUp);
        let cleanup = cleanup::delete_if_exists(&extracted.final_path).await;

        let signed_url = signed.inspect_err(|e| error!(%request_id, "Storage error: {}", e))?;

        Ok(DownloadResult {
            request_id,
            local_path: extracted.final_path,
            display_name: extracted.display_name,
            storage_key,
            signed_url,
            cleanup,
        })
    }
}
