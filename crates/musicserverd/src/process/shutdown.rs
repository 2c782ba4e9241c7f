//! Routes termination signals to the running application.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::{info, warn};

use super::PROCESS_TARGET;
use super::errors::EXIT_FORCED;
use super::guard::Teardown;

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal {
    /// Starts delivering shutdown requests to `hooks` until the returned
    /// listener is closed or dropped.
    fn listen(&self, hooks: ShutdownHooks) -> Result<ShutdownListener, ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Spawning the listener thread failed.
    #[error("failed to spawn signal listener: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Actions a shutdown listener may take.
pub struct ShutdownHooks {
    stop: Box<dyn Fn() + Send + Sync>,
    teardown: Arc<Teardown>,
}

impl ShutdownHooks {
    pub(crate) fn new(stop: impl Fn() + Send + Sync + 'static, teardown: Arc<Teardown>) -> Self {
        Self {
            stop: Box::new(stop),
            teardown,
        }
    }

    /// Asks the application to return from its run loop.
    pub fn request_stop(&self) {
        (self.stop)();
    }

    /// Releases the PID file immediately, ahead of the normal return path.
    pub fn force_teardown(&self) {
        self.teardown.run();
    }
}

/// Handle to an active listener; closing it stops signal delivery.
#[must_use = "dropping the listener stops shutdown signal delivery"]
pub struct ShutdownListener {
    closer: Option<Box<dyn FnOnce() + Send>>,
}

impl ShutdownListener {
    /// Wraps the action that stops the listener.
    #[must_use]
    pub fn new(closer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            closer: Some(Box::new(closer)),
        }
    }

    /// Stops delivery and waits for the listener to finish.
    pub fn close(mut self) {
        self.shut();
    }

    fn shut(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

impl Drop for ShutdownListener {
    fn drop(&mut self) {
        self.shut();
    }
}

/// Listener for SIGTERM, SIGINT, SIGQUIT and SIGHUP.
///
/// The first signal requests a stop; the application's run loop returns and
/// the normal teardown follows. A further signal means the application did
/// not return: the PID file is released at once and the process exits with
/// status 130.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl SystemShutdownSignal {
    /// Builds a signal listener.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn listen(&self, hooks: ShutdownHooks) -> Result<ShutdownListener, ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        let handle = signals.handle();
        let worker: JoinHandle<()> = thread::Builder::new()
            .name("shutdown-signals".to_owned())
            .spawn(move || {
                let mut received = 0_usize;
                for signal in signals.forever() {
                    received += 1;
                    if received == 1 {
                        info!(
                            target: PROCESS_TARGET,
                            signal,
                            "shutdown signal received"
                        );
                        hooks.request_stop();
                    } else {
                        warn!(
                            target: PROCESS_TARGET,
                            signal,
                            "repeated shutdown signal; forcing exit"
                        );
                        hooks.force_teardown();
                        std::process::exit(i32::from(EXIT_FORCED));
                    }
                }
            })
            .map_err(|source| ShutdownError::Spawn { source })?;
        Ok(ShutdownListener::new(move || {
            handle.close();
            if worker.join().is_err() {
                warn!(
                    target: PROCESS_TARGET,
                    "signal listener panicked"
                );
            }
        }))
    }
}
