//! Command-line options accepted by the `music-server` launcher.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::Parser;

/// Validated start-up record parsed from the process arguments.
///
/// Parsing never touches the filesystem: the configuration path is passed
/// opaquely to the application factory, and the PID-file path is resolved
/// later by [`crate::RuntimePaths`].
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "music-server",
    version,
    about = "Music-queueing server launcher",
    long_about = "Loads the music server configuration, optionally detaches into the \
                  background, and guards the run with a PID file."
)]
pub struct StartupConfig {
    /// Configuration file handed to the application.
    #[arg(short = 'c', long = "conf", value_name = "PATH")]
    config_path: PathBuf,
    /// Detach from the controlling terminal and run in the background.
    #[arg(short = 'd', long = "daemonize")]
    daemonize: bool,
    /// Location of the PID file guarding single-instance execution.
    #[arg(short = 'p', long = "pidfile", value_name = "PATH")]
    pid_file: Option<PathBuf>,
}

impl StartupConfig {
    /// Builds a start-up record without going through argument parsing.
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>, daemonize: bool, pid_file: Option<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            daemonize,
            pid_file,
        }
    }

    /// Parses the process arguments, including the program name.
    ///
    /// `--help` and `--version` surface as errors whose
    /// [`clap::Error::exit_code`] is zero; malformed input yields exit code 2.
    pub fn try_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args)
    }

    /// Configuration file path supplied with `-c/--conf`.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        self.config_path.as_path()
    }

    /// Whether the process should detach into the background.
    #[must_use]
    pub const fn daemonize(&self) -> bool {
        self.daemonize
    }

    /// PID-file override supplied with `-p/--pidfile`.
    #[must_use]
    pub fn pid_file(&self) -> Option<&Path> {
        self.pid_file.as_deref()
    }
}
