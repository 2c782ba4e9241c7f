//! Test suites for the server launcher.

pub(crate) mod support;
