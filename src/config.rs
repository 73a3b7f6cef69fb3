//! Configuration for the talkback client
//!
//! Supports `~/.config/talkback/config.toml` as a persistent config source.
//! All fields are optional, the file is a partial overlay on top of
//! defaults, and the CLI `--host` flag wins over everything.

use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::{Error, Result};

/// Capture sample rate (16 kHz for speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Capture channel count (mono)
pub const CHANNELS: u16 = 1;

/// File name of the capture artifact
pub const CAPTURE_FILE_NAME: &str = "audio_record.m4a";

/// Recording parameters, immutable per capture session
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Channel count
    pub channels: u16,

    /// Where the recorded artifact is written
    pub output_path: PathBuf,
}

impl CaptureConfig {
    /// Capture config writing into the given directory
    #[must_use]
    pub fn in_dir(dir: &std::path::Path) -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            output_path: dir.join(CAPTURE_FILE_NAME),
        }
    }
}

/// Talkback client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Processing server host (bare `host:port` or full URL)
    pub server_host: String,

    /// Directory for capture artifacts
    pub data_dir: PathBuf,

    /// Capture parameters
    pub capture: CaptureConfig,
}

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    /// Processing server host
    #[serde(default)]
    server_host: Option<String>,

    /// Capture artifact directory override
    #[serde(default)]
    data_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration, overlaying the TOML file (if present) on
    /// defaults and applying the CLI host override last
    ///
    /// # Errors
    ///
    /// Returns error if the config file exists but cannot be parsed, or if
    /// no server host is configured anywhere, or if no cache directory can
    /// be determined.
    pub fn load(host_override: Option<&str>) -> Result<Self> {
        let dirs = ProjectDirs::from("dev", "talkback", "talkback")
            .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))?;

        let file = Self::read_file(&dirs.config_dir().join("config.toml"))?;

        let server_host = host_override
            .map(ToString::to_string)
            .or(file.server_host)
            .ok_or_else(|| {
                Error::Config("no server host configured (pass --host)".to_string())
            })?;

        let data_dir = file
            .data_dir
            .unwrap_or_else(|| dirs.cache_dir().to_path_buf());

        std::fs::create_dir_all(&data_dir)?;

        let capture = CaptureConfig::in_dir(&data_dir);

        tracing::debug!(
            host = %server_host,
            data_dir = %data_dir.display(),
            "configuration loaded"
        );

        Ok(Self {
            server_host,
            data_dir,
            capture,
        })
    }

    /// Read the optional TOML overlay
    fn read_file(path: &std::path::Path) -> Result<ConfigFile> {
        if !path.exists() {
            return Ok(ConfigFile::default());
        }

        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("bad config file {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_config_defaults() {
        let cfg = CaptureConfig::in_dir(std::path::Path::new("/tmp/talkback"));
        assert_eq!(cfg.sample_rate, 16_000);
        assert_eq!(cfg.channels, 1);
        assert_eq!(
            cfg.output_path,
            PathBuf::from("/tmp/talkback/audio_record.m4a")
        );
    }

    #[test]
    fn config_file_overlay_parses() {
        let file: ConfigFile =
            toml::from_str("server_host = \"example.com:8080\"").expect("parse");
        assert_eq!(file.server_host.as_deref(), Some("example.com:8080"));
        assert!(file.data_dir.is_none());
    }

    #[test]
    fn empty_config_file_is_all_defaults() {
        let file: ConfigFile = toml::from_str("").expect("parse");
        assert!(file.server_host.is_none());
    }
}
