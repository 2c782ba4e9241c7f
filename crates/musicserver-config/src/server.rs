//! JSON configuration file consumed by the music server application.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::defaults::{
    MAX_STOP_GRACE_MS, default_playlist_size, default_port, default_songdir, default_stop_grace,
};
use crate::logging::{LogFormat, LogLevel};

/// Parsed configuration file.
///
/// Every section and every key is optional; missing values fall back to
/// [`DEFAULT_PORT`](crate::DEFAULT_PORT) and its siblings. Unknown keys are
/// ignored so the same file can carry settings for components this crate does
/// not model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Logging settings.
    pub general: GeneralSection,
    /// Web interface settings.
    pub webserver: WebServerSection,
    /// Playlist storage settings.
    pub musicserver: MusicServerSection,
}

/// `general` section: where and how the server logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeneralSection {
    /// Log file; the server logs to stderr when absent.
    pub logfile: Option<PathBuf>,
    /// Minimum severity written to the log.
    pub loglevel: LogLevel,
    /// Output format of log records.
    pub logformat: LogFormat,
}

/// `webserver` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WebServerSection {
    /// TCP port of the web interface.
    pub port: u16,
}

impl Default for WebServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// `musicserver` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MusicServerSection {
    /// Directory where enqueued songs are stored.
    pub songdir: PathBuf,
    /// Number of songs the playlist keeps.
    pub playlistsize: usize,
    /// Milliseconds spent draining after a stop request before returning.
    pub stopgrace: u64,
}

impl MusicServerSection {
    /// Drain period as a [`Duration`].
    #[must_use]
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stopgrace)
    }
}

impl Default for MusicServerSection {
    fn default() -> Self {
        Self {
            songdir: default_songdir(),
            playlistsize: default_playlist_size(),
            stopgrace: default_stop_grace(),
        }
    }
}

/// Errors raised while loading a [`ServerConfig`].
#[derive(Debug, Error)]
pub enum ServerConfigError {
    /// The file could not be read.
    #[error("failed to read configuration '{path}': {source}")]
    Read {
        /// Configuration file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The file is not valid JSON or holds values of the wrong type.
    #[error("failed to parse configuration '{path}': {source}")]
    Parse {
        /// Configuration file path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A value parsed but is out of range.
    #[error("invalid configuration '{path}': {message}")]
    Invalid {
        /// Configuration file path.
        path: PathBuf,
        /// Description of the rejected value.
        message: String,
    },
}

impl ServerConfig {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ServerConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ServerConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content).map_err(|source| ServerConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate().map_err(|message| ServerConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    /// Parses a configuration document without validating it.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    fn validate(&self) -> Result<(), String> {
        if self.musicserver.playlistsize == 0 {
            return Err("musicserver.playlistsize must be at least 1".to_owned());
        }
        if self.musicserver.songdir.as_os_str().is_empty() {
            return Err("musicserver.songdir must not be empty".to_owned());
        }
        if self.musicserver.stopgrace > MAX_STOP_GRACE_MS {
            return Err(format!(
                "musicserver.stopgrace must not exceed {MAX_STOP_GRACE_MS} ms"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_PLAYLIST_SIZE, DEFAULT_PORT, DEFAULT_SONGDIR, DEFAULT_STOP_GRACE_MS};
    use rstest::rstest;
    use tempfile::TempDir;

    fn write(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("ms.conf");
        fs::write(&path, content).expect("write configuration");
        path
    }

    #[rstest]
    fn empty_object_uses_defaults() {
        let config = ServerConfig::from_json("{}").expect("empty object should parse");
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.webserver.port, DEFAULT_PORT);
        assert_eq!(config.musicserver.songdir, PathBuf::from(DEFAULT_SONGDIR));
        assert_eq!(config.musicserver.playlistsize, DEFAULT_PLAYLIST_SIZE);
        assert_eq!(config.musicserver.stopgrace, DEFAULT_STOP_GRACE_MS);
        assert_eq!(config.musicserver.stop_grace(), Duration::ZERO);
        assert_eq!(config.general.logfile, None);
        assert_eq!(config.general.loglevel, LogLevel::Info);
    }

    #[rstest]
    fn reads_every_section() {
        let dir = TempDir::new().expect("temp dir");
        let path = write(
            &dir,
            r#"{
                "general": {"logfile": "/var/log/ms.log", "loglevel": "DEBUG", "logformat": "json"},
                "webserver": {"port": 9000},
                "musicserver": {"songdir": "/srv/songs", "playlistsize": 3, "stopgrace": 250},
                "unrelated": {"ignored": true}
            }"#,
        );
        let config = ServerConfig::load(&path).expect("configuration should load");
        assert_eq!(config.general.logfile, Some(PathBuf::from("/var/log/ms.log")));
        assert_eq!(config.general.loglevel, LogLevel::Debug);
        assert_eq!(config.general.logformat, LogFormat::Json);
        assert_eq!(config.webserver.port, 9000);
        assert_eq!(config.musicserver.songdir, PathBuf::from("/srv/songs"));
        assert_eq!(config.musicserver.playlistsize, 3);
        assert_eq!(config.musicserver.stop_grace(), Duration::from_millis(250));
    }

    #[rstest]
    fn missing_file_reports_read_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("absent.conf");
        let error = ServerConfig::load(&path).expect_err("missing file should fail");
        assert!(matches!(error, ServerConfigError::Read { .. }));
        assert!(error.to_string().contains("absent.conf"));
    }

    #[rstest]
    #[case::not_json("port = 1")]
    #[case::wrong_type(r#"{"webserver": {"port": "loud"}}"#)]
    #[case::port_out_of_range(r#"{"webserver": {"port": 70000}}"#)]
    fn malformed_documents_report_parse_error(#[case] content: &str) {
        let dir = TempDir::new().expect("temp dir");
        let path = write(&dir, content);
        let error = ServerConfig::load(&path).expect_err("document should be rejected");
        assert!(matches!(error, ServerConfigError::Parse { .. }), "{error}");
    }

    #[rstest]
    #[case::zero_playlist(r#"{"musicserver": {"playlistsize": 0}}"#)]
    #[case::empty_songdir(r#"{"musicserver": {"songdir": ""}}"#)]
    #[case::endless_grace(r#"{"musicserver": {"stopgrace": 60001}}"#)]
    fn out_of_range_values_are_invalid(#[case] content: &str) {
        let dir = TempDir::new().expect("temp dir");
        let path = write(&dir, content);
        let error = ServerConfig::load(&path).expect_err("value should be rejected");
        assert!(matches!(error, ServerConfigError::Invalid { .. }), "{error}");
    }
}
