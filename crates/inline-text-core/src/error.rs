//! Error types for the widget core.
//!
//! None of these reach the end user. Engine errors are swallowed at the call
//! site with a conservative fallback; save errors are handed back to whoever
//! spawned the save.

use smol_str::SmolStr;
use thiserror::Error;

/// Boxed error returned by host-provided collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by an [`EditingEngine`](crate::engine::EditingEngine).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineError {
    /// The engine is not ready (not initialized, or already removed).
    #[error("editing engine unavailable")]
    Unavailable,

    /// The engine does not know this command name.
    #[error("unknown command: {0}")]
    UnknownCommand(SmolStr),

    /// The engine does not know this format name.
    #[error("unknown format: {0}")]
    UnknownFormat(SmolStr),

    /// The command exists but threw.
    #[error("command {command} failed: {reason}")]
    CommandFailed { command: SmolStr, reason: String },
}

/// A save could not be completed.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SaveError {
    /// The persistence call rejected.
    #[error("widget update failed: {0}")]
    Transport(#[source] BoxError),

    /// The content-transform hook rejected.
    #[error("before-save hook failed: {0}")]
    Hook(#[source] BoxError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    /// No editing engine has been attached yet.
    #[error("no editing engine attached")]
    NotAttached,

    /// An engine is already attached to this session.
    #[error("editing engine already attached")]
    AlreadyAttached,

    /// The widget is not editable in the current environment.
    #[error("widget is not editable in {0} mode")]
    NotEditable(&'static str),
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid widget configuration: {0}")]
    Json(#[from] serde_json::Error),
}
