//! Diagnostic logging support for the operator console described in
//! spec §6: per-subsystem debug toggles (`dlog`), an optional mirror
//! to a file (`dlog_file`), and a toggle for the stdout echo
//! (`dlog_std`). The actual line formatting is left to `tracing`; this
//! module only tracks *which* subsystems are currently chatty.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Arc;

use crate::locks::SyncMutex;

/// Registry of named debug subsystems and whether they are currently
/// emitting `debug`-level output. Subsystems are looked up by name so
/// new ones (router, solver, dispatcher, ...) can register without a
/// central enum.
#[derive(Default)]
pub struct DebugLog {
    subsystems: RwLock<HashMap<String, bool>>,
    mirror_file: SyncMutex<Option<File>>,
    echo_stdout: RwLock<bool>,
}

impl DebugLog {
    /// Creates an empty registry with stdout echo enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subsystems: RwLock::new(HashMap::new()),
            mirror_file: SyncMutex::new(None),
            echo_stdout: RwLock::new(true),
        }
    }

    /// Implements `dlog [subsys 0|1]`: with no argument, reports all
    /// known subsystems; with an argument, sets and returns the new state.
    pub fn set_subsystem(&self, name: &str, enabled: bool) {
        self.subsystems.write().insert(name.to_string(), enabled);
    }

    /// Returns whether `name` currently has debug logging enabled.
    /// Unknown subsystems default to disabled.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.subsystems.read().get(name).copied().unwrap_or(false)
    }

    /// Lists all subsystems that have ever been toggled, most recently
    /// touched order is not preserved (this is a flat registry).
    #[must_use]
    pub fn subsystems(&self) -> Vec<(String, bool)> {
        self.subsystems
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Implements `dlog_file [path]`: opens (creating/truncating) a
    /// mirror file for subsequent log lines, or closes the mirror if
    /// `path` is `None`.
    pub fn set_mirror_file(&self, path: Option<&str>) -> std::io::Result<()> {
        let mut guard = self.mirror_file.lock();
        *guard = match path {
            Some(path) => Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?,
            ),
            None => None,
        };
        Ok(())
    }

    /// Implements `dlog_std 0|1`.
    pub fn set_echo_stdout(&self, enabled: bool) {
        *self.echo_stdout.write() = enabled;
    }

    /// Writes a pre-formatted line to whichever sinks are active.
    pub fn write_line(&self, line: &str) {
        if *self.echo_stdout.read() {
            println!("{line}");
        }
        if let Some(file) = self.mirror_file.lock().as_mut() {
            let _ = writeln!(file, "{line}");
        }
    }
}

/// Global debug-log registry, initialized once at process start.
pub static DEBUG_LOG: std::sync::OnceLock<Arc<DebugLog>> = std::sync::OnceLock::new();

/// Initializes the global debug-log registry. Safe to call more than
/// once; later calls are no-ops.
pub fn init_debug_log() -> Arc<DebugLog> {
    DEBUG_LOG
        .get_or_init(|| Arc::new(DebugLog::new()))
        .clone()
}

/// Emits a debug-level trace line for `subsystem`, gated by
/// [`DebugLog::is_enabled`], and also mirrors it through `DEBUG_LOG`'s
/// file/stdout sinks so `dlog_file`/`dlog_std` affect these lines too.
#[macro_export]
macro_rules! dlog {
    ($subsystem:expr, $($arg:tt)+) => {{
        if let Some(log) = $crate::logger::DEBUG_LOG.get() {
            if log.is_enabled($subsystem) {
                let line = format!($($arg)+);
                tracing::debug!(subsystem = $subsystem, "{line}");
                log.write_line(&format!("[{}] {line}", $subsystem));
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_subsystem_defaults_disabled() {
        let log = DebugLog::new();
        assert!(!log.is_enabled("router"));
    }

    #[test]
    fn set_and_query_subsystem() {
        let log = DebugLog::new();
        log.set_subsystem("router", true);
        assert!(log.is_enabled("router"));
        log.set_subsystem("router", false);
        assert!(!log.is_enabled("router"));
    }
}
