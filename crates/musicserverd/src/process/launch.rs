//! Sequences detachment, PID-file ownership, the application run, and
//! teardown.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use musicserver_config::{RuntimePaths, StartupConfig};

use crate::application::{Application, ApplicationFactory, MusicApplicationFactory};

use super::PROCESS_TARGET;
use super::daemonizer::{Daemonizer, SystemDaemonizer};
use super::errors::LaunchError;
use super::guard::{self, Teardown};
use super::shutdown::{ShutdownHooks, ShutdownSignal, SystemShutdownSignal};

/// Lifecycle state of the managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// Attached to the invoking terminal; nothing acquired yet.
    Foreground,
    /// Detaching from the controlling terminal.
    Detaching,
    /// PID file held; the application is running.
    Running,
    /// The run has ended and teardown is under way.
    ShuttingDown,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Foreground => "foreground",
            Self::Detaching => "detaching",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
        })
    }
}

/// Process-level collaborators needed to control the lifecycle.
pub(crate) struct ProcessControl<D, S> {
    pub(crate) daemonizer: D,
    pub(crate) shutdown: S,
}

/// Runs the server described by `startup` with the production collaborators.
pub fn run_server(startup: &StartupConfig) -> Result<(), LaunchError> {
    let process = ProcessControl {
        daemonizer: SystemDaemonizer::new(),
        shutdown: SystemShutdownSignal::new(),
    };
    run_server_with(startup, &MusicApplicationFactory, process)
}

/// Runs the server with injected collaborators.
///
/// The application is configured before anything else happens, so a broken
/// configuration fails on the caller's terminal with no PID file and no
/// detachment.
pub(crate) fn run_server_with<F, D, S>(
    startup: &StartupConfig,
    factory: &F,
    process: ProcessControl<D, S>,
) -> Result<(), LaunchError>
where
    F: ApplicationFactory,
    D: Daemonizer,
    S: ShutdownSignal,
{
    info!(
        target: PROCESS_TARGET,
        config = %startup.config_path().display(),
        daemonize = startup.daemonize(),
        "starting music server"
    );
    let application = factory.configure(startup.config_path())?;
    let paths = RuntimePaths::from_startup(startup)?;
    let mut daemon = Daemon::new(
        application,
        startup.daemonize(),
        paths.pid_path().map(Path::to_path_buf),
        process,
    );
    daemon.run()
}

/// Lifecycle manager wrapping one application run.
pub(crate) struct Daemon<A, D, S> {
    application: Arc<A>,
    daemonize: bool,
    pid_path: Option<PathBuf>,
    process: ProcessControl<D, S>,
    state: DaemonState,
}

impl<A, D, S> Daemon<A, D, S>
where
    A: Application + 'static,
    D: Daemonizer,
    S: ShutdownSignal,
{
    pub(crate) fn new(
        application: A,
        daemonize: bool,
        pid_path: Option<PathBuf>,
        process: ProcessControl<D, S>,
    ) -> Self {
        Self {
            application: Arc::new(application),
            daemonize,
            pid_path,
            process,
            state: DaemonState::Foreground,
        }
    }

    /// Lifecycle state reached so far.
    pub(crate) const fn state(&self) -> DaemonState {
        self.state
    }

    /// Detaches if requested, takes the PID file, runs the application, and
    /// releases the PID file however the run ends.
    pub(crate) fn run(&mut self) -> Result<(), LaunchError> {
        if let Some(path) = self.pid_path.as_deref() {
            guard::ensure_not_running(path)?;
        }
        if self.daemonize {
            self.transition(DaemonState::Detaching);
            self.process.daemonizer.daemonize()?;
        }

        let teardown = Arc::new(Teardown::default());
        let _scope = TeardownScope(Arc::clone(&teardown));
        let application = Arc::clone(&self.application);
        let hooks = ShutdownHooks::new(move || application.stop(), Arc::clone(&teardown));
        let listener = self.process.shutdown.listen(hooks)?;
        if let Some(path) = self.pid_path.as_deref() {
            teardown.arm(guard::acquire(path, std::process::id())?);
        }

        self.transition(DaemonState::Running);
        let outcome = self.application.run();
        self.transition(DaemonState::ShuttingDown);
        listener.close();
        teardown.run();

        if let Err(error) = &outcome {
            warn!(
                target: PROCESS_TARGET,
                error = %error,
                "application run failed"
            );
        }
        info!(
            target: PROCESS_TARGET,
            state = %self.state(),
            clean = outcome.is_ok(),
            "shutdown sequence completed"
        );
        outcome.map_err(LaunchError::from)
    }

    fn transition(&mut self, next: DaemonState) {
        info!(
            target: PROCESS_TARGET,
            from = %self.state,
            to = %next,
            "lifecycle transition"
        );
        self.state = next;
    }
}

/// Runs teardown when dropped, covering early returns and unwinding.
struct TeardownScope(Arc<Teardown>);

impl Drop for TeardownScope {
    fn drop(&mut self) {
        self.0.run();
    }
}
