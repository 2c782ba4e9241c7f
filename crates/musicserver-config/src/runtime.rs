//! Resolves where the PID file lives for a given start-up.
//!
//! An explicit `--pidfile` always wins and is made absolute so it stays valid
//! after the daemon changes its working directory to `/`. A detached server
//! without an override writes to the default runtime directory. A server that
//! stays attached to the terminal without an override writes no PID file.

use std::env;
use std::fs;
use std::io;
use std::path::{self, Path, PathBuf};

use thiserror::Error;

use crate::StartupConfig;
use crate::defaults::{PID_FILE_NAME, RUNTIME_NAMESPACE};

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

/// Runtime artefact locations derived from the start-up options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pid_path: Option<PathBuf>,
}

impl RuntimePaths {
    /// Derives the PID-file location, creating the default runtime directory
    /// when it is used.
    pub fn from_startup(startup: &StartupConfig) -> Result<Self, RuntimePathsError> {
        let pid_path = match startup.pid_file() {
            Some(explicit) => Some(absolute(explicit)?),
            None if startup.daemonize() => {
                let runtime_dir = default_runtime_directory();
                fs::create_dir_all(&runtime_dir).map_err(|source| {
                    RuntimePathsError::RuntimeDirectory {
                        path: runtime_dir.clone(),
                        source,
                    }
                })?;
                Some(runtime_dir.join(PID_FILE_NAME))
            }
            None => None,
        };
        Ok(Self { pid_path })
    }

    /// Absolute path of the PID file, when one is maintained.
    #[must_use]
    pub fn pid_path(&self) -> Option<&Path> {
        self.pid_path.as_deref()
    }
}

fn absolute(path: &Path) -> Result<PathBuf, RuntimePathsError> {
    path::absolute(path).map_err(|source| RuntimePathsError::Absolute {
        path: path.to_path_buf(),
        source,
    })
}

/// Directory holding runtime artefacts when no override is given.
#[must_use]
pub fn default_runtime_directory() -> PathBuf {
    #[cfg(unix)]
    {
        if let Some(mut dir) = runtime_dir() {
            dir.push(RUNTIME_NAMESPACE);
            return dir;
        }
        let mut dir = env::temp_dir();
        dir.push(RUNTIME_NAMESPACE);
        dir.push(format!("uid-{}", unsafe { geteuid() }));
        dir
    }

    #[cfg(not(unix))]
    {
        let mut dir = env::temp_dir();
        dir.push(RUNTIME_NAMESPACE);
        dir
    }
}

/// Default PID-file path used by a detached server.
#[must_use]
pub fn default_pid_file() -> PathBuf {
    default_runtime_directory().join(PID_FILE_NAME)
}

/// Errors raised while deriving runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// The PID-file path could not be made absolute.
    #[error("failed to resolve pid file path '{path}': {source}")]
    Absolute {
        /// Path as supplied on the command line.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
