//! Injectable logging capability
//!
//! Library components never talk to a global logger. They receive a
//! [`Logger`] at construction and default to [`NoopLogger`]. The binary
//! plugs in [`TracingLogger`], which forwards to the `tracing` macros.
//!
//! Records must never contain key material, salt bytes, passphrases or
//! payload contents.

use std::sync::Arc;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Sink for diagnostic records.
pub trait Logger: Send + Sync {
    /// Record `message` emitted by component `target` at `level`.
    fn log(&self, level: Level, target: &'static str, message: &str);
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: Level, _target: &'static str, _message: &str) {}
}

/// Forwards records to whatever `tracing` subscriber is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, target: &'static str, message: &str) {
        match level {
            Level::Trace => tracing::trace!(component = target, "{message}"),
            Level::Debug => tracing::debug!(component = target, "{message}"),
            Level::Info => tracing::info!(component = target, "{message}"),
            Level::Warn => tracing::warn!(component = target, "{message}"),
            Level::Error => tracing::error!(component = target, "{message}"),
        }
    }
}

/// Shared handle used by components that hold a logger.
pub type SharedLogger = Arc<dyn Logger>;

/// A [`SharedLogger`] that discards everything.
pub fn noop() -> SharedLogger {
    Arc::new(NoopLogger)
}
