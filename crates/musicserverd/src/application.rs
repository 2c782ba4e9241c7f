//! Boundary between the lifecycle manager and the music application.

use std::error::Error as StdError;
use std::fmt;
use std::path::Path;
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;

use thiserror::Error;
use tracing::info;

use musicserver_config::{ServerConfig, ServerConfigError};

use crate::telemetry::{self, TelemetryError};

const APPLICATION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::application");

/// A configured application the lifecycle manager can run and stop.
#[cfg_attr(test, mockall::automock)]
pub trait Application: Send + Sync {
    /// Runs the application, blocking until it finishes or is stopped.
    fn run(&self) -> Result<(), AppError>;

    /// Asks a running application to return from [`Application::run`].
    ///
    /// Called from the shutdown listener thread; must not block.
    fn stop(&self);
}

/// Builds applications from a configuration path.
#[cfg_attr(test, mockall::automock(type App = MockApplication;))]
pub trait ApplicationFactory {
    /// Application type produced by this factory.
    type App: Application + 'static;

    /// Loads the configuration at `config_path` and builds the application.
    fn configure(&self, config_path: &Path) -> Result<Self::App, ConfigError>;
}

/// Failure reported by an application's run loop.
#[derive(Debug)]
pub struct AppError {
    message: String,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl AppError {
    /// Builds an error carrying only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error wrapping an underlying cause.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Human-readable description without the cause chain.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {source}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

/// Errors raised while building an application.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be loaded.
    #[error(transparent)]
    Load(#[from] ServerConfigError),
    /// Logging could not be set up from the configuration.
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
}

/// Factory for [`MusicApplication`].
///
/// Loads the JSON configuration and installs telemetry from its `general`
/// section before handing back the application.
#[derive(Debug, Default, Clone, Copy)]
pub struct MusicApplicationFactory;

impl ApplicationFactory for MusicApplicationFactory {
    type App = MusicApplication;

    fn configure(&self, config_path: &Path) -> Result<Self::App, ConfigError> {
        let config = ServerConfig::load(config_path)?;
        telemetry::initialise(&config)?;
        info!(
            target: APPLICATION_TARGET,
            config = %config_path.display(),
            "configuration loaded"
        );
        Ok(MusicApplication::new(config))
    }
}

/// The music server application.
#[derive(Debug)]
pub struct MusicApplication {
    config: ServerConfig,
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl MusicApplication {
    /// Wraps a loaded configuration.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    /// Configuration the application was built from.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl Application for MusicApplication {
    fn run(&self) -> Result<(), AppError> {
        info!(
            target: APPLICATION_TARGET,
            port = self.config.webserver.port,
            songdir = %self.config.musicserver.songdir.display(),
            playlistsize = self.config.musicserver.playlistsize,
            "music server started"
        );
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            stopped = self
                .wake
                .wait(stopped)
                .unwrap_or_else(PoisonError::into_inner);
        }
        drop(stopped);
        let grace = self.config.musicserver.stop_grace();
        if !grace.is_zero() {
            info!(
                target: APPLICATION_TARGET,
                grace_ms = self.config.musicserver.stopgrace,
                "draining before exit"
            );
            thread::sleep(grace);
        }
        info!(
            target: APPLICATION_TARGET,
            "music server stopped"
        );
        Ok(())
    }

    fn stop(&self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wake.notify_all();
    }
}
