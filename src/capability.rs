//! Optional scripting capability.
//!
//! Whether the engine carries an embedded interpreter is a compile-time
//! choice of the engine build, invisible statically. The bridge probes
//! once during initialization and keeps the answer for the lifetime of
//! the session: a boolean flag plus a typed error channel, never a
//! static assumption.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::engine::Engine;
use crate::error::CapabilityError;

/// A probed, installed interpreter state. All code evaluation funnels
/// through this; it is disposed only after every engine thread has
/// drained during shutdown. Successful evaluation yields the
/// interpreter's textual result (may be empty).
pub trait ScriptHost: Send + Sync {
    fn eval(&self, code: &str) -> Result<String, CapabilityError>;
    fn eval_file(&self, path: &Path) -> Result<String, CapabilityError>;
}

/// Outcome of the one-time probe plus the live host, if any.
pub(crate) struct ScriptCapability {
    host: Mutex<Option<Box<dyn ScriptHost>>>,
    /// Set when the probe itself failed (feature present, symbols not
    /// resolvable). Reported on every eval attempt.
    probe_error: Option<CapabilityError>,
}

impl ScriptCapability {
    /// Run the probe once. Never fails the session: an unavailable or
    /// broken capability only affects later eval calls.
    pub(crate) fn probe(engine: &dyn Engine) -> Self {
        match engine.probe_scripting() {
            Ok(Some(host)) => {
                tracing::debug!("scripting capability available");
                Self {
                    host: Mutex::new(Some(host)),
                    probe_error: None,
                }
            }
            Ok(None) => {
                tracing::debug!("scripting capability not present in this engine build");
                Self {
                    host: Mutex::new(None),
                    probe_error: None,
                }
            }
            Err(err) => {
                tracing::warn!("scripting probe failed: {err}");
                Self {
                    host: Mutex::new(None),
                    probe_error: Some(err),
                }
            }
        }
    }

    pub(crate) fn available(&self) -> bool {
        self.host.lock().is_some()
    }

    pub(crate) fn eval(&self, code: &str) -> Result<String, CapabilityError> {
        let host = self.host.lock();
        match host.as_deref() {
            Some(h) => h.eval(code),
            None => Err(self.unavailable()),
        }
    }

    pub(crate) fn eval_file(&self, path: &Path) -> Result<String, CapabilityError> {
        let host = self.host.lock();
        match host.as_deref() {
            Some(h) => h.eval_file(path),
            None => Err(self.unavailable()),
        }
    }

    /// Drop the interpreter state. Callers must have drained the engine
    /// first; its hooks dereference this state from socket threads.
    pub(crate) fn dispose(&self) {
        if self.host.lock().take().is_some() {
            tracing::debug!("scripting state disposed");
        }
    }

    fn unavailable(&self) -> CapabilityError {
        self.probe_error
            .clone()
            .unwrap_or(CapabilityError::NotAvailable)
    }
}

/// Scripts directory beneath the config directory.
pub(crate) fn scripts_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("scripts")
}

/// List `*.lua` files in the scripts directory, sorted by name.
/// Missing directory or filesystem errors yield an empty list.
pub(crate) fn list_scripts(config_dir: &Path) -> Vec<String> {
    let dir = scripts_dir(config_dir);
    let mut scripts = Vec::new();
    if let Ok(entries) = std::fs::read_dir(&dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "lua") {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    scripts.push(name.to_string());
                }
            }
        }
    }
    scripts.sort();
    scripts
}
