//! Defines the unified error surface for server launch and supervision.

use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use musicserver_config::RuntimePathsError;

use crate::application::{AppError, ConfigError};

use super::daemonizer::DaemonizeError;
use super::shutdown::ShutdownError;

/// Exit status reported when the application run fails.
pub const EXIT_APPLICATION: u8 = 1;
/// Exit status reported when the configuration cannot be loaded.
pub const EXIT_CONFIG: u8 = 3;
/// Exit status reported when another instance holds the PID file or its lock.
pub const EXIT_ALREADY_RUNNING: u8 = 4;
/// Exit status reported when the process cannot detach.
pub const EXIT_DETACH: u8 = 5;
/// Exit status reported for PID-file and signal-handler failures.
pub const EXIT_RUNTIME: u8 = 6;
/// Exit status used when a repeated termination signal forces shutdown.
pub const EXIT_FORCED: u8 = 130;

/// Errors surfaced while launching or supervising the server process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The application factory rejected the configuration.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying configuration error.
        #[source]
        source: ConfigError,
    },
    /// Runtime paths could not be derived.
    #[error(transparent)]
    RuntimePaths(#[from] RuntimePathsError),
    /// A live process already holds the PID file.
    #[error("music server already running with pid {pid} (pid file '{path}')")]
    AlreadyRunning {
        /// PID recorded in the existing PID file.
        pid: u32,
        /// PID file path.
        path: PathBuf,
    },
    /// Another server holds the PID-file lock.
    #[error("music server already running (lock '{path}' is held)")]
    Locked {
        /// Lock file path.
        path: PathBuf,
    },
    /// The lock file kept being replaced under us while locking it.
    #[error("gave up locking '{path}' after repeated contention")]
    PidContention {
        /// Lock file path.
        path: PathBuf,
    },
    /// Opening or inspecting the lock file failed.
    #[error("failed to open lock file '{path}': {source}")]
    LockOpen {
        /// Lock file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Taking the lock failed for a reason other than contention.
    #[error("failed to lock '{path}': {source}")]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying OS error.
        source: Errno,
    },
    /// Writing the PID file failed.
    #[error("failed to write pid file '{path}': {source}")]
    PidWrite {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Reading an existing PID file failed.
    #[error("failed to read pid file '{path}': {source}")]
    PidRead {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Removing a stale PID file failed.
    #[error("failed to remove stale pid file '{path}': {source}")]
    Cleanup {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Checking whether a recorded PID is alive failed.
    #[error("failed to check existing process {pid}: {source}")]
    CheckProcess {
        /// PID that could not be checked.
        pid: u32,
        /// Underlying OS error.
        source: Errno,
    },
    /// Daemonisation failed.
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Underlying daemonisation error.
        #[source]
        source: DaemonizeError,
    },
    /// Installing the termination-signal listener failed.
    #[error("failed to listen for shutdown signals: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// The application run loop failed.
    #[error("music server failed: {source}")]
    Application {
        /// Error returned by the application.
        #[source]
        source: AppError,
    },
}

impl LaunchError {
    /// Process exit status for this error.
    ///
    /// Each failure class gets its own status so init scripts can tell an
    /// instance conflict apart from a broken configuration.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config { .. } => EXIT_CONFIG,
            Self::AlreadyRunning { .. } | Self::Locked { .. } => EXIT_ALREADY_RUNNING,
            Self::Daemonize { .. } => EXIT_DETACH,
            Self::Application { .. } => EXIT_APPLICATION,
            Self::RuntimePaths(_)
            | Self::PidContention { .. }
            | Self::LockOpen { .. }
            | Self::Lock { .. }
            | Self::PidWrite { .. }
            | Self::PidRead { .. }
            | Self::Cleanup { .. }
            | Self::CheckProcess { .. }
            | Self::Shutdown { .. } => EXIT_RUNTIME,
        }
    }
}

impl From<ConfigError> for LaunchError {
    fn from(source: ConfigError) -> Self {
        Self::Config { source }
    }
}

impl From<DaemonizeError> for LaunchError {
    fn from(source: DaemonizeError) -> Self {
        Self::Daemonize { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

impl From<AppError> for LaunchError {
    fn from(source: AppError) -> Self {
        Self::Application { source }
    }
}
