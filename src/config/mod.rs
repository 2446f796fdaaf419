use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::services::storage::DEFAULT_LINK_TTL_SECS;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// How storage-layer failures (upload or link signing) are reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageFailureMode {
    /// Respond `200` with `"aws_url": null`.
    #[default]
    Lenient,
    /// Respond `502` with an error message.
    Strict,
}

impl FromStr for StorageFailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(other.to_string()),
        }
    }
}

/// Object storage connection settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Target bucket (env: BUCKET)
    pub bucket: String,

    pub access_key_id: String,
    pub secret_access_key: String,

    /// Region used for signing (default: "us-east-1")
    pub region: String,

    /// Custom S3-compatible endpoint, e.g. MinIO. Enables path-style addressing.
    pub endpoint_url: Option<String>,
}

/// yt-dlp invocation settings
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// yt-dlp binary name or path (default: "yt-dlp")
    pub ytdlp_bin: PathBuf,

    /// Passed to yt-dlp as --ffmpeg-location when set
    pub ffmpeg_location: Option<PathBuf>,

    /// Target codec, also the file extension (default: "mp3")
    pub audio_format: String,

    /// Target bitrate in kbps (default: "192")
    pub audio_quality: String,
}

/// Process-wide configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub extractor: ExtractorConfig,

    /// Local scratch directory (default: "./temp")
    pub temp_dir: PathBuf,

    /// Object key prefix (default: "musicas")
    pub key_prefix: String,

    /// Lifetime of signed download links in seconds (default: 3600)
    pub link_ttl_secs: u64,

    pub storage_failure_mode: StorageFailureMode,

    /// Place each object under a per-request id: `{prefix}/{id}/{name}.mp3`
    pub unique_object_keys: bool,

    /// Allowed CORS origins; empty means any
    pub allowed_origins: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            ytdlp_bin: PathBuf::from("yt-dlp"),
            ffmpeg_location: None,
            audio_format: "mp3".to_string(),
            audio_quality: "192".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let default_extractor = ExtractorConfig::default();

        let storage = StorageConfig {
            bucket: required("BUCKET")?,
            access_key_id: required("AWS_ACCESS_KEY_ID")?,
            secret_access_key: required("AWS_SECRET_ACCESS_KEY")?,
            region: get("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            endpoint_url: get("S3_ENDPOINT"),
        };

        let extractor = ExtractorConfig {
            ytdlp_bin: get("YTDLP_BIN")
                .map(PathBuf::from)
                .unwrap_or(default_extractor.ytdlp_bin),
            ffmpeg_location: get("FFMPEG_LOCATION").map(PathBuf::from),
            audio_format: get("AUDIO_FORMAT")
                .map(|v| v.to_ascii_lowercase())
                .unwrap_or(default_extractor.audio_format),
            audio_quality: get("AUDIO_QUALITY").unwrap_or(default_extractor.audio_quality),
        };

        let temp_dir = get("TEMP_DIR").map(PathBuf::from).unwrap_or_else(|| {
            env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("temp")
        });

        let link_ttl_secs = match get("LINK_TTL_SECS") {
            Some(v) => v
                .parse::<u64>()
                .ok()
                .filter(|ttl| *ttl > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: "LINK_TTL_SECS",
                    value: v,
                })?,
            None => DEFAULT_LINK_TTL_SECS,
        };

        let storage_failure_mode = match get("STORAGE_FAILURE_MODE") {
            Some(v) => v.parse().map_err(|value| ConfigError::InvalidValue {
                key: "STORAGE_FAILURE_MODE",
                value,
            })?,
            None => StorageFailureMode::default(),
        };

        Ok(Self {
            storage,
            extractor,
            temp_dir,
            key_prefix: get("OBJECT_KEY_PREFIX")
                .map(|v| v.trim_matches('/').to_string())
                .unwrap_or_else(|| "musicas".to_string()),
            link_ttl_secs,
            storage_failure_mode,
            unique_object_keys: get("UNIQUE_OBJECT_KEYS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty() && s != "*")
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("BUCKET", "my-bucket"),
        ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
        ("AWS_SECRET_ACCESS_KEY", "secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.storage.bucket, "my-bucket");
        assert_eq!(config.storage.region, "us-east-1");
        assert!(config.storage.endpoint_url.is_none());
        assert!(config.temp_dir.ends_with("temp"));
        assert_eq!(config.key_prefix, "musicas");
        assert_eq!(config.link_ttl_secs, DEFAULT_LINK_TTL_SECS);
        assert_eq!(DEFAULT_LINK_TTL_SECS, 3600);
        assert_eq!(config.storage_failure_mode, StorageFailureMode::Lenient);
        assert!(!config.unique_object_keys);
        assert_eq!(config.extractor.audio_format, "mp3");
        assert_eq!(config.extractor.audio_quality, "192");
        assert!(config.allowed_origins.is_empty());
    }

    #[test]
    fn test_missing_bucket() {
        let err = AppConfig::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("BUCKET"));
    }

    #[test]
    fn test_blank_credentials_are_missing() {
        let err = AppConfig::from_lookup(lookup(&[
            ("BUCKET", "b"),
            ("AWS_ACCESS_KEY_ID", "  "),
            ("AWS_SECRET_ACCESS_KEY", "s"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("AWS_ACCESS_KEY_ID"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("TEMP_DIR", "/tmp/scratch"),
            ("STORAGE_FAILURE_MODE", "Strict"),
            ("UNIQUE_OBJECT_KEYS", "1"),
            ("LINK_TTL_SECS", "600"),
            ("OBJECT_KEY_PREFIX", "/audio/"),
            ("S3_ENDPOINT", "http://127.0.0.1:9000"),
            ("ALLOWED_ORIGINS", "http://a.test, http://b.test"),
        ]);
        let config = AppConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.temp_dir, PathBuf::from("/tmp/scratch"));
        assert_eq!(config.storage_failure_mode, StorageFailureMode::Strict);
        assert!(config.unique_object_keys);
        assert_eq!(config.link_ttl_secs, 600);
        assert_eq!(config.key_prefix, "audio");
        assert_eq!(
            config.storage.endpoint_url.as_deref(),
            Some("http://127.0.0.1:9000")
        );
        assert_eq!(config.allowed_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("STORAGE_FAILURE_MODE", "loud"));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::InvalidValue { key: "STORAGE_FAILURE_MODE", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("LINK_TTL_SECS", "0"));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::InvalidValue { key: "LINK_TTL_SECS", .. })
        ));
    }
}
