//! Top-level error types.

use std::fmt;
use std::io;

/// A failure severe enough that the process cannot continue starting up.
///
/// Corresponds to `spec.md` §7's `fatal-bootstrap` class: failing to
/// establish the initial parameters, failing the boot-time migration, or
/// failing to bind the HTTP listener.
#[derive(Debug)]
pub enum ExitError {
    Config(String),
    Bootstrap(String),
    Io(io::Error),
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitError::Config(msg) => write!(f, "configuration error: {msg}"),
            ExitError::Bootstrap(msg) => write!(f, "failed to start up: {msg}"),
            ExitError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl From<io::Error> for ExitError {
    fn from(err: io::Error) -> Self {
        ExitError::Io(err)
    }
}
