//! The units the manager spawns onto the shared multi-threaded runtime.
//!
//! Each unit owns nothing but a handle to the processor's command
//! channel (and whatever config it needs); all state lives behind that
//! channel, in the processor's dedicated thread.

pub mod http_server;
pub mod notary_watcher;
