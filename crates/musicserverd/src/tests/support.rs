//! Test doubles for the lifecycle manager's collaborators.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use musicserver_config::ServerConfigError;

use crate::application::{AppError, Application, ApplicationFactory, ConfigError};
use crate::process::daemonizer::{DaemonizeError, Daemonizer};
use crate::process::shutdown::{ShutdownError, ShutdownHooks, ShutdownListener, ShutdownSignal};

/// Daemoniser that counts calls and records whether a PID file already
/// existed when detachment was requested.
#[derive(Clone, Default)]
pub struct TestDaemonizer {
    calls: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
    watch: Option<PathBuf>,
    pid_file_seen: Arc<AtomicBool>,
}

impl TestDaemonizer {
    pub fn watching(path: &Path) -> Self {
        Self {
            watch: Some(path.to_path_buf()),
            ..Self::default()
        }
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn saw_pid_file(&self) -> bool {
        self.pid_file_seen.load(Ordering::SeqCst)
    }
}

impl Daemonizer for TestDaemonizer {
    fn daemonize(&self) -> Result<(), DaemonizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.watch.as_deref().is_some_and(Path::exists) {
            self.pid_file_seen.store(true, Ordering::SeqCst);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(DaemonizeError::System(daemonize_me::DaemonError::Fork));
        }
        Ok(())
    }
}

/// Shutdown source driven by the test instead of the operating system.
#[derive(Clone, Default)]
pub struct TestShutdownSignal {
    hooks: Arc<Mutex<Option<ShutdownHooks>>>,
    fail: Arc<AtomicBool>,
    closes: Arc<AtomicUsize>,
}

impl TestShutdownSignal {
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Simulates the first termination signal.
    pub fn deliver(&self) -> bool {
        self.with_hooks(ShutdownHooks::request_stop)
    }

    /// Simulates a repeated termination signal, minus the process exit.
    pub fn force(&self) -> bool {
        self.with_hooks(ShutdownHooks::force_teardown)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn with_hooks(&self, action: impl FnOnce(&ShutdownHooks)) -> bool {
        let hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        hooks.as_ref().map(action).is_some()
    }
}

impl ShutdownSignal for TestShutdownSignal {
    fn listen(&self, hooks: ShutdownHooks) -> Result<ShutdownListener, ShutdownError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ShutdownError::Install {
                source: std::io::Error::other("signal handlers unavailable"),
            });
        }
        *self.hooks.lock().unwrap_or_else(PoisonError::into_inner) = Some(hooks);
        let slot = Arc::clone(&self.hooks);
        let closes = Arc::clone(&self.closes);
        Ok(ShutdownListener::new(move || {
            slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            closes.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// How a [`TestApplication`] behaves once run.
#[derive(Clone, Debug, Default)]
pub enum RunBehaviour {
    /// Return immediately.
    #[default]
    Succeed,
    /// Return an application error.
    Fail(String),
    /// Deliver a termination signal and block until stopped.
    SignalThenWait,
    /// Force teardown as a repeated signal would, then return.
    ForceTeardown,
}

/// Application that records what it observed while running.
#[derive(Clone, Default)]
pub struct TestApplication {
    behaviour: RunBehaviour,
    signal: TestShutdownSignal,
    watch: Option<PathBuf>,
    runs: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    pid_file_during_run: Arc<Mutex<Option<String>>>,
    pid_file_after_force: Arc<AtomicBool>,
    stopped: Arc<(Mutex<bool>, Condvar)>,
}

impl TestApplication {
    pub fn new(behaviour: RunBehaviour, signal: TestShutdownSignal, watch: Option<PathBuf>) -> Self {
        Self {
            behaviour,
            signal,
            watch,
            ..Self::default()
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// PID-file contents seen at the start of the run.
    pub fn pid_file_during_run(&self) -> Option<String> {
        self.pid_file_during_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn pid_file_survived_force(&self) -> bool {
        self.pid_file_after_force.load(Ordering::SeqCst)
    }

    fn wait_for_stop(&self) {
        let (lock, wake) = &*self.stopped;
        let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            stopped = wake.wait(stopped).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Application for TestApplication {
    fn run(&self) -> Result<(), AppError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(path) = self.watch.as_deref() {
            *self
                .pid_file_during_run
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = fs::read_to_string(path).ok();
        }
        match &self.behaviour {
            RunBehaviour::Succeed => Ok(()),
            RunBehaviour::Fail(message) => Err(AppError::new(message.clone())),
            RunBehaviour::SignalThenWait => {
                self.signal.deliver();
                self.wait_for_stop();
                Ok(())
            }
            RunBehaviour::ForceTeardown => {
                self.signal.force();
                let survived = self.watch.as_deref().is_some_and(Path::exists);
                self.pid_file_after_force.store(survived, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let (lock, wake) = &*self.stopped;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        wake.notify_all();
    }
}

/// Factory handing out a prepared [`TestApplication`] or failing outright.
#[derive(Clone, Default)]
pub struct TestApplicationFactory {
    application: TestApplication,
    fail: bool,
    configured: Arc<Mutex<Vec<PathBuf>>>,
}

impl TestApplicationFactory {
    pub fn new(application: TestApplication) -> Self {
        Self {
            application,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn configured(&self) -> Vec<PathBuf> {
        self.configured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ApplicationFactory for TestApplicationFactory {
    type App = TestApplication;

    fn configure(&self, config_path: &Path) -> Result<Self::App, ConfigError> {
        self.configured
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(config_path.to_path_buf());
        if self.fail {
            return Err(ConfigError::Load(ServerConfigError::Invalid {
                path: config_path.to_path_buf(),
                message: "rejected by test factory".to_owned(),
            }));
        }
        Ok(self.application.clone())
    }
}

/// A real, live child process that is killed and reaped when dropped.
pub struct SleepingProcess {
    child: Child,
}

impl SleepingProcess {
    pub fn spawn() -> Self {
        let child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep");
        Self { child }
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl Drop for SleepingProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// PID of a child that has already exited and been reaped.
pub fn exited_pid() -> u32 {
    let mut child = Command::new("true").spawn().expect("spawn true");
    let pid = child.id();
    child.wait().expect("reap child");
    pid
}
