use crate::config::ExtractorConfig;
use crate::services::extractor::YtDlpExtractor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Resolves a binary name against PATH, or checks that an explicit path is executable.
pub fn locate_binary(bin: &Path) -> Option<PathBuf> {
    which::which(bin).ok()
}

pub fn setup_extractor(config: &ExtractorConfig) -> Arc<YtDlpExtractor> {
    let mut config = config.clone();

    match locate_binary(&config.ytdlp_bin) {
        Some(path) => {
            info!("🎵 yt-dlp: {}", path.display());
            config.ytdlp_bin = path;
        }
        None => warn!(
            "⚠️  yt-dlp not found ({}). Downloads will fail until it is installed.",
            config.ytdlp_bin.display()
        ),
    }

    if config.ffmpeg_location.is_none() && which::which("ffmpeg").is_err() {
        warn!("⚠️  ffmpeg not found in PATH; audio transcoding will fail.");
    }

    info!(
        "🎚️  Target audio: {} @ {}kbps",
        config.audio_format, config.audio_quality
    );

    Arc::new(YtDlpExtractor::new(config))
}
