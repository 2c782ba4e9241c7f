//! Launcher for the music-queueing server.
//!
//! The launcher parses the command line, builds the application from its
//! configuration file, and hands it to a lifecycle manager that can detach
//! the process from its terminal and guards single-instance execution with a
//! PID file. Whatever ends the run (a normal return, an application error,
//! or a termination signal) the PID file is removed before the process
//! exits, so a PID file on disk always names a live server.
//!
//! Failures map onto distinct exit statuses; see [`LaunchError::exit_code`].

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use tracing::error;

use musicserver_config::StartupConfig;

mod application;
mod process;
mod telemetry;

pub use application::{
    AppError, Application, ApplicationFactory, ConfigError, MusicApplication,
    MusicApplicationFactory,
};
pub use process::{
    DaemonState, EXIT_ALREADY_RUNNING, EXIT_APPLICATION, EXIT_CONFIG, EXIT_DETACH, EXIT_FORCED,
    EXIT_RUNTIME, LaunchError, run_server,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

/// Exit status used when clap does not supply one.
const EXIT_ARGUMENT: u8 = 2;

/// Parses `args` and runs the server, reporting failures on `stderr`.
///
/// Help and version output go to `stdout` and exit successfully; malformed
/// arguments exit with status 2 before anything else happens.
#[must_use]
pub fn run<I, T, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
    E: Write,
{
    ExitCode::from(run_with(args, stdout, stderr, run_server))
}

fn run_with<I, T, W, E, L>(args: I, stdout: &mut W, stderr: &mut E, launch: L) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
    E: Write,
    L: FnOnce(&StartupConfig) -> Result<(), LaunchError>,
{
    let startup = match StartupConfig::try_from_args(args) {
        Ok(startup) => startup,
        Err(error) => {
            let rendered = error.render();
            let _ = if error.use_stderr() {
                write!(stderr, "{rendered}")
            } else {
                write!(stdout, "{rendered}")
            };
            return u8::try_from(error.exit_code()).unwrap_or(EXIT_ARGUMENT);
        }
    };

    match launch(&startup) {
        Ok(()) => 0,
        Err(launch_error) => {
            error!(
                target: process::PROCESS_TARGET,
                error = %launch_error,
                "music server exited with an error"
            );
            let _ = writeln!(stderr, "music-server: {launch_error}");
            launch_error.exit_code()
        }
    }
}

#[cfg(test)]
mod tests;
