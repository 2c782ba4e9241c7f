use crate::logging::{LogFormat, LogLevel};

/// Default TCP port for the web interface.
pub const DEFAULT_PORT: u16 = 8888;

/// Default directory where enqueued songs are stored.
pub const DEFAULT_SONGDIR: &str = "/var/lib/musicserver/songs";

/// Default number of songs the playlist keeps.
pub const DEFAULT_PLAYLIST_SIZE: usize = 10;

/// Default milliseconds the server keeps draining after a stop request.
pub const DEFAULT_STOP_GRACE_MS: u64 = 0;

/// Largest accepted `musicserver.stopgrace`, in milliseconds.
pub const MAX_STOP_GRACE_MS: u64 = 60_000;

/// File name of the PID file inside the runtime directory.
pub const PID_FILE_NAME: &str = "music-server.pid";

/// Directory component namespacing runtime artefacts.
pub const RUNTIME_NAMESPACE: &str = "musicserver";

/// Default log level used when the configuration names none.
#[must_use]
pub const fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// Default logging format for the server.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

pub(crate) const fn default_port() -> u16 {
    DEFAULT_PORT
}

pub(crate) fn default_songdir() -> std::path::PathBuf {
    std::path::PathBuf::from(DEFAULT_SONGDIR)
}

pub(crate) const fn default_playlist_size() -> usize {
    DEFAULT_PLAYLIST_SIZE
}

pub(crate) const fn default_stop_grace() -> u64 {
    DEFAULT_STOP_GRACE_MS
}
