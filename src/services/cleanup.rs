use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

/// What happened to a local file during cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed,
    Missing,
    Failed,
}

/// Removes `path` if it exists. Never fails; the outcome is only logged.
pub async fn delete_if_exists(path: &Path) -> CleanupOutcome {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            info!("Local file {} deleted.", path.display());
            CleanupOutcome::Removed
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("The file {} does not exist.", path.display());
            CleanupOutcome::Missing
        }
        Err(e) => {
            warn!("Failed to delete local file {}: {}", path.display(), e);
            CleanupOutcome::Failed
        }
    }
}

/// Removes a per-request scratch directory and anything left inside it.
pub async fn remove_scratch_dir(dir: &Path) -> CleanupOutcome {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => CleanupOutcome::Removed,
        Err(e) if e.kind() == ErrorKind::NotFound => CleanupOutcome::Missing,
        Err(e) => {
            warn!("Failed to remove scratch dir {}: {}", dir.display(), e);
            CleanupOutcome::Failed
        }
    }
}
