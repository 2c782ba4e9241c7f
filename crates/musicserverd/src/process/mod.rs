pub(crate) mod daemonizer;
mod errors;
mod files;
mod guard;
pub(crate) mod launch;
pub(crate) mod shutdown;

pub use errors::{
    EXIT_ALREADY_RUNNING, EXIT_APPLICATION, EXIT_CONFIG, EXIT_DETACH, EXIT_FORCED, EXIT_RUNTIME,
    LaunchError,
};
pub use launch::{DaemonState, run_server};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
