use crate::config::ExtractorConfig;
use crate::utils::validation::sanitize_filename;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tracing::{debug, info, warn};

/// Number of yt-dlp stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 50;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to start yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Could not resolve metadata for {url}: {reason}")]
    Metadata { url: String, reason: String },

    #[error("Source has no usable title: {0}")]
    EmptyTitle(String),

    #[error("yt-dlp exited with error (status={status}): {stderr_tail}")]
    ToolFailed { status: String, stderr_tail: String },

    #[error("The file {} was not found after the download.", .0.display())]
    OutputMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio file produced for one source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAudio {
    pub final_path: PathBuf,
    pub display_name: String,
}

#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Resolves the title of `source_url`, then downloads and transcodes its
    /// best audio stream to `<output_dir>/<display name>.<ext>`.
    ///
    /// `output_dir` is created if absent. Success implies the returned file
    /// exists on disk.
    async fn resolve_and_extract(
        &self,
        source_url: &str,
        output_dir: &Path,
    ) -> Result<ExtractedAudio, ExtractionError>;

    /// Extension of the files this extractor produces.
    fn extension(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct SourceMetadata {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug)]
pub struct YtDlpExtractor {
    config: ExtractorConfig,
}

impl YtDlpExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.config.ytdlp_bin);
        cmd.arg("--no-playlist")
            .arg("--no-progress")
            .arg("--no-part")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(ffmpeg) = &self.config.ffmpeg_location {
            cmd.arg("--ffmpeg-location").arg(ffmpeg);
        }
        cmd
    }

    /// Runs `yt-dlp -J` and returns the display name derived from the title.
    async fn resolve_display_name(&self, source_url: &str) -> Result<String, ExtractionError> {
        let output = self
            .base_command()
            .arg("-J")
            .arg("--")
            .arg(source_url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(ExtractionError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp metadata stderr: {}", stderr);
            return Err(ExtractionError::Metadata {
                url: source_url.to_string(),
                reason: last_lines(&stderr, STDERR_TAIL_LINES),
            });
        }

        let metadata: SourceMetadata =
            serde_json::from_slice(&output.stdout).map_err(|e| ExtractionError::Metadata {
                url: source_url.to_string(),
                reason: e.to_string(),
            })?;

        let title = metadata.title.ok_or_else(|| ExtractionError::Metadata {
            url: source_url.to_string(),
            reason: "metadata has no title".to_string(),
        })?;
        debug!("Resolved title {:?} (id={:?})", title, metadata.id);

        let display_name = sanitize_filename(&title);
        if display_name.trim().is_empty() {
            return Err(ExtractionError::EmptyTitle(title));
        }
        Ok(display_name)
    }

    async fn download_audio(
        &self,
        source_url: &str,
        output_stem: &Path,
    ) -> Result<(), ExtractionError> {
        let template = output_template(output_stem);

        let mut child = self
            .base_command()
            .arg("-f")
            .arg("bestaudio/best")
            .arg("--extract-audio")
            .arg("--audio-format")
            .arg(&self.config.audio_format)
            .arg("--audio-quality")
            .arg(format!("{}K", self.config.audio_quality))
            .arg("-o")
            .arg(&template)
            .arg("--")
            .arg(source_url)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ExtractionError::Spawn)?;

        if let Some(pid) = child.id() {
            info!("yt-dlp started (pid={}) for {}", pid, source_url);
        }

        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_stderr(stderr)));

        let status = child.wait().await?;
        let tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => VecDeque::new(),
        };

        if !status.success() {
            return Err(ExtractionError::ToolFailed {
                status: status.to_string(),
                stderr_tail: render_tail(&tail),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn resolve_and_extract(
        &self,
        source_url: &str,
        output_dir: &Path,
    ) -> Result<ExtractedAudio, ExtractionError> {
        info!("Resolving source: {}", source_url);
        let display_name = self.resolve_display_name(source_url).await?;

        tokio::fs::create_dir_all(output_dir).await?;
        let output_stem = output_dir.join(&display_name);

        self.download_audio(source_url, &output_stem).await?;

        let final_path = output_dir.join(format!("{}.{}", display_name, self.extension()));
        if !tokio::fs::try_exists(&final_path).await.unwrap_or(false) {
            warn!("yt-dlp succeeded but {} is missing", final_path.display());
            return Err(ExtractionError::OutputMissing(final_path));
        }

        info!("Downloaded file: {}", final_path.display());
        Ok(ExtractedAudio {
            final_path,
            display_name,
        })
    }

    fn extension(&self) -> &str {
        &self.config.audio_format
    }
}

/// yt-dlp `-o` template writing to `<stem>.<ext>`. The stem is literal text,
/// so `%` must be doubled to keep yt-dlp from reading it as a field.
fn output_template(output_stem: &Path) -> String {
    format!(
        "{}.%(ext)s",
        output_stem.display().to_string().replace('%', "%%")
    )
}

async fn collect_stderr(stderr: ChildStderr) -> VecDeque<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim_end().to_string();
        if line.is_empty() {
            continue;
        }
        debug!(target: "yt_dlp", "{}", line);
        if tail.len() >= STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail
}

fn render_tail(tail: &VecDeque<String>) -> String {
    if tail.is_empty() {
        return "no stderr output captured".to_string();
    }
    tail.iter().cloned().collect::<Vec<_>>().join("\n")
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    let tail = lines[start..].join("\n");
    if tail.is_empty() {
        "no stderr output captured".to_string()
    } else {
        tail
    }
}
