//! Error taxonomy for the bridge boundary.
//!
//! Engine failures never cross into the consumer raw: every engine call
//! site catches them and degrades to a false/empty result. The only
//! failures surfaced as typed errors are file-list load/parse and
//! scripting failures, so a consumer can tell "feature absent" apart
//! from "code is broken".

use thiserror::Error;

/// Errors from the optional scripting capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// The engine was built without scripting support.
    #[error("scripting support is not available in this engine build")]
    NotAvailable,
    /// The scripting runtime is present but its entry points could not
    /// be resolved.
    #[error("scripting runtime symbols could not be resolved")]
    SymbolResolution,
    /// The code or script file failed to parse/compile.
    #[error("script load error: {0}")]
    Load(String),
    /// The script raised an error during execution.
    #[error("script runtime error: {0}")]
    Runtime(String),
}

/// Errors surfaced by bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Engine already active process-wide, or the config directory could
    /// not be created.
    #[error("initialization failed: {0}")]
    Initialization(String),
    /// Unknown hub address, user, file-list id or path segment.
    #[error("not found: {0}")]
    NotFound(String),
    /// The underlying engine call failed; caught at the call site.
    #[error("engine call failed: {0}")]
    EngineCall(String),
    /// Scripting capability failure.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    /// Operation attempted before initialize or after shutdown.
    #[error("session is not initialized")]
    Precondition,
}
