//! Minimal ANSI color constants for the status command's output.
//!
//! Deliberately simpler than the main daemon crate's styling: the CLI
//! only ever needs a handful of fixed colors for a handful of fixed
//! labels, not a generalized `Print`/`Styled` machinery.

#![allow(unused)]

pub const RED: &str = "\x1b[0;31m";
pub const GREEN: &str = "\x1b[0;32m";
pub const YELLOW: &str = "\x1b[0;33m";
pub const GRAY: &str = "\x1b[38;5;248m";
pub const RESET: &str = "\x1b[0m";
