//! Implements the daemonisation backend for the `music-server` process.

use daemonize_me::Daemon;
use std::ffi::OsStr;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Name given to the detached process.
const PROCESS_NAME: &str = "music-server";

/// Abstraction over daemonisation strategies.
pub trait Daemonizer: Send + Sync {
    /// Detaches the process into the background.
    ///
    /// Returns in the detached child only; the original foreground process
    /// exits inside this call.
    fn daemonize(&self) -> Result<(), DaemonizeError>;
}

/// Errors surfaced by the daemonisation backend.
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// System-level daemonisation failed.
    #[error("{0}")]
    System(#[from] daemonize_me::DaemonError),
}

/// Daemoniser that delegates to `daemonize-me`: double fork, new session,
/// working directory `/`, standard streams on `/dev/null`.
#[derive(Debug, Default)]
pub struct SystemDaemonizer;

impl SystemDaemonizer {
    /// Builds a new system daemoniser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self) -> Result<(), DaemonizeError> {
        info!(
            target: PROCESS_TARGET,
            "detaching into background"
        );
        let mut daemon = Daemon::new();
        daemon = daemon.work_dir(Path::new("/"));
        daemon = daemon.name(OsStr::new(PROCESS_NAME));
        daemon.start()?;
        info!(
            target: PROCESS_TARGET,
            pid = std::process::id(),
            "process detached; continuing in child"
        );
        Ok(())
    }
}
