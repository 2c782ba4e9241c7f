//! Structured telemetry initialisation for the server.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, MakeWriter};

use musicserver_config::{LogFormat, ServerConfig};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// The configured log file could not be opened for appending.
    #[error("failed to open log file '{path}': {source}")]
    LogFile {
        /// Resolved log file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Repeated calls are idempotent: the first invocation installs the global
/// subscriber and later ones return a fresh [`TelemetryHandle`] without
/// touching the global state again. `RUST_LOG`, when set, replaces the
/// configured `general.loglevel`.
pub fn initialise(config: &ServerConfig) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(config: &ServerConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;
    let writer = LogWriter::for_config(config)?;
    let ansi = writer.is_terminal();

    let builder = |filter: EnvFilter, writer: LogWriter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(writer)
            .with_ansi(ansi)
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.general.logformat {
        LogFormat::Json => Box::new(builder(filter, writer).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter, writer).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn build_filter(config: &ServerConfig) -> Result<EnvFilter, TelemetryError> {
    let directive = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => config.general.loglevel.filter_directive().to_owned(),
    };
    EnvFilter::try_new(&directive).map_err(|error| TelemetryError::Filter(error.to_string()))
}

/// Destination for formatted log lines.
///
/// A log file is reopened in append mode for every event, so rotation and
/// the working-directory change made while detaching do not lose output.
#[derive(Debug, Clone)]
enum LogWriter {
    Stderr,
    File(PathBuf),
}

impl LogWriter {
    fn for_config(config: &ServerConfig) -> Result<Self, TelemetryError> {
        let Some(logfile) = config.general.logfile.as_deref() else {
            return Ok(Self::Stderr);
        };
        let path = std::path::absolute(logfile).map_err(|source| TelemetryError::LogFile {
            path: logfile.to_path_buf(),
            source,
        })?;
        open_append(&path).map_err(|source| TelemetryError::LogFile {
            path: path.clone(),
            source,
        })?;
        Ok(Self::File(path))
    }

    fn is_terminal(&self) -> bool {
        matches!(self, Self::Stderr) && io::stderr().is_terminal()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Writer handed out per event by [`LogWriter`].
enum LogSink {
    Stderr(io::Stderr),
    File(File),
    Discard,
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stderr(stderr) => stderr.write(buf),
            Self::File(file) => file.write(buf),
            Self::Discard => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stderr(stderr) => stderr.flush(),
            Self::File(file) => file.flush(),
            Self::Discard => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        match self {
            Self::Stderr => LogSink::Stderr(io::stderr()),
            Self::File(path) => open_append(path).map_or(LogSink::Discard, LogSink::File),
        }
    }
}
