//! Entry point for the `music-server` binary.
//!
//! Delegates to [`musicserverd::run`]. The standard streams are not locked
//! for the whole run: the shutdown listener thread logs to stderr too.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    musicserverd::run(std::env::args_os(), &mut io::stdout(), &mut io::stderr())
}
