//! Error handling for the tray engine
//!
//! Every condition the engine cannot continue from (miswired graphs, missing
//! resources, bad parameters) is a `TrayError`. There is no recoverable
//! variant: errors unwind to the driver and end the run.

use crate::tray::frame::Stop;
use thiserror::Error;

/// Main error type for tray operations
#[derive(Error, Debug)]
pub enum TrayError {
    /// Named push onto an outbox the module never declared and nobody connected
    #[error(
        "Module \"{module}\" attempted to push a frame onto outbox \"{outbox}\" which doesn't exist"
    )]
    UnknownOutbox { module: String, outbox: String },

    /// Named push onto a declared outbox that no downstream module drains
    #[error(
        "Module \"{module}\" attempted to push a frame onto outbox \"{outbox}\" which isn't connected to anything"
    )]
    UnwiredOutbox { module: String, outbox: String },

    /// Context lookup for a name that isn't present
    #[error("No resource named \"{name}\" in context of \"{module}\"")]
    MissingResource { module: String, name: String },

    /// Context lookup where the stored resource has a different type
    #[error("Resource \"{name}\" in context of \"{module}\" is not a {expected}")]
    WrongResourceType {
        module: String,
        name: String,
        expected: &'static str,
    },

    /// Service lookup while no module context is active
    #[error("No active context for service lookup of \"{0}\"")]
    NoActiveContext(String),

    #[error("Unknown module \"{0}\"")]
    UnknownModule(String),

    #[error("Module \"{0}\" already exists")]
    DuplicateModule(String),

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Connecting \"{from}\" to \"{to}\" would create a cycle")]
    CycleDetected { from: String, to: String },

    /// Lifecycle operation attempted from the wrong state
    #[error("Cannot {operation} while tray is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Parameter declaration, assignment or lookup failed
    #[error("Configuration error in \"{module}\": {message}")]
    Config { module: String, message: String },

    /// Frame payload misuse (duplicate or missing keys)
    #[error("Frame error on {stop} frame: {message}")]
    Frame { stop: Stop, message: String },

    /// Unrecoverable condition raised by module code
    #[error("Module \"{module}\" failed: {message}")]
    Module { module: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<TrayError>,
    },
}

impl TrayError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        TrayError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Record the error at `error` level and hand it back for propagation.
    ///
    /// This is the engine's "fatal": the message is logged where the
    /// condition was detected, then the error unwinds to the driver.
    pub fn logged(self) -> Self {
        tracing::error!("FATAL: {}", self);
        self
    }

    /// Shorthand for module code that has to give up on the run.
    pub fn module(module: impl Into<String>, message: impl Into<String>) -> Self {
        TrayError::Module {
            module: module.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for tray operations
pub type TrayResult<T> = std::result::Result<T, TrayError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> TrayResult<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> TrayResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for TrayResult<T> {
    fn context(self, context: impl Into<String>) -> TrayResult<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> TrayResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
