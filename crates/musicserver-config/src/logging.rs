use serde::Deserialize;
use strum::{Display, EnumString};
use thiserror::Error;

/// Supported logging output formats.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    Json,
    /// Human-readable single line output.
    #[default]
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

/// Severity threshold for the server log.
///
/// Accepts the level names operators already use in existing configuration
/// files (`"INFO"`, `"WARNING"`, `"CRITICAL"`, case-insensitive) as well as
/// their numeric equivalents (`10`, `20`, ... `50`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize, EnumString, Display,
)]
#[serde(try_from = "RawLogLevel")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    /// Everything, including per-step tracing.
    Trace,
    /// Diagnostic detail.
    Debug,
    /// Routine lifecycle events.
    #[default]
    Info,
    /// Recoverable anomalies.
    #[strum(to_string = "warning", serialize = "warn")]
    Warning,
    /// Failures.
    Error,
    /// Failures the server cannot continue from.
    #[strum(to_string = "critical", serialize = "fatal")]
    Critical,
}

impl LogLevel {
    /// Maps a numeric level (`10` debug through `50` critical) onto a variant.
    #[must_use]
    pub const fn from_number(level: u64) -> Self {
        match level {
            0..=9 => Self::Trace,
            10..=19 => Self::Debug,
            20..=29 => Self::Info,
            30..=39 => Self::Warning,
            40..=49 => Self::Error,
            _ => Self::Critical,
        }
    }

    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

/// Errors raised while reading a [`LogLevel`] from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogLevelParseError {
    /// The level name is not recognised.
    #[error("unknown log level '{0}'")]
    UnknownName(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLogLevel {
    Number(u64),
    Name(String),
}

impl TryFrom<RawLogLevel> for LogLevel {
    type Error = LogLevelParseError;

    fn try_from(raw: RawLogLevel) -> Result<Self, LogLevelParseError> {
        match raw {
            RawLogLevel::Number(level) => Ok(Self::from_number(level)),
            RawLogLevel::Name(name) => name
                .trim()
                .parse()
                .map_err(|_| LogLevelParseError::UnknownName(name)),
        }
    }
}
