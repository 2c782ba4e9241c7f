//! Startup options and configuration file model for the music server.
//!
//! Two layers live here. [`StartupConfig`] is the typed record parsed from the
//! command line: the configuration file path, whether to detach into the
//! background, and an optional PID-file override. [`ServerConfig`] is the JSON
//! document that path points to; the daemon hands the path to the application
//! factory, which loads it through [`ServerConfig::load`].
//!
//! [`RuntimePaths`] resolves where the PID file lives for a given start-up,
//! applying the default runtime directory when the server detaches without an
//! explicit `--pidfile`.

mod cli;
mod defaults;
mod logging;
mod runtime;
mod server;

pub use cli::StartupConfig;
pub use defaults::{
    DEFAULT_PLAYLIST_SIZE, DEFAULT_PORT, DEFAULT_SONGDIR, DEFAULT_STOP_GRACE_MS,
    MAX_STOP_GRACE_MS, PID_FILE_NAME, RUNTIME_NAMESPACE, default_log_format, default_log_level,
};
pub use logging::{LogFormat, LogFormatParseError, LogLevel, LogLevelParseError};
pub use runtime::{RuntimePaths, RuntimePathsError, default_pid_file, default_runtime_directory};
pub use server::{
    GeneralSection, MusicServerSection, ServerConfig, ServerConfigError, WebServerSection,
};
