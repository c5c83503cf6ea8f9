//! Custom error types for stately.
//!
//! This module defines explicit enum error types. The only boxed error is
//! [`LifecycleError`], the opaque failure a user-supplied lifecycle callback
//! hands back; the engine always wraps it in a typed [`TransitionError`]
//! tagged with the offending state's name.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::StateName;

/// Error returned by user-supplied lifecycle callbacks.
pub type LifecycleError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for the stately engine.
/// All errors are explicit variants - no catch-all or generic handling.
#[derive(Debug, Error)]
pub enum StatelyError {
    // =========================================================================
    // Declaration Errors
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Invalid lifecycle: {0}")]
    InvalidLifecycle(#[from] LifecycleValidationError),

    #[error("State not found: {0}")]
    StateNotFound(StateName),

    #[error("Invalid substitution of {target}: {reason}")]
    InvalidSubstitution { target: StateName, reason: String },

    // =========================================================================
    // Transition Errors - Abort The Current Batch
    // =========================================================================
    #[error("Transition failed: {0}")]
    Transition(#[from] TransitionError),

    // =========================================================================
    // Manifest Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Manifest file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Manifest parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl StatelyError {
    /// Name of the state a transition failure belongs to, if any.
    pub fn failed_state(&self) -> Option<&StateName> {
        match self {
            Self::Transition(err) => Some(err.state()),
            _ => None,
        }
    }
}

/// Hard validation errors reject a declaration or manifest outright.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Duplicate state name: {name}")]
    DuplicateStateName { name: String },

    #[error("State {state} uses unknown state {dependee}")]
    UnknownDependency { state: String, dependee: String },

    #[error("Schema validation failed: {message}")]
    SchemaValidation { message: String },
}

/// Raised at registration time when a lifecycle is malformed.
/// Fatal to that declaration only; the registry is left untouched.
#[derive(Debug, Error)]
pub enum LifecycleValidationError {
    #[error("state {name} has no start function")]
    MissingStart { name: StateName },

    #[error("state {name} can be suspended but has no resume function")]
    SuspendWithoutResume { name: StateName },
}

/// Failures raised while moving a state between run states.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("could not start [{name}] due to {source}")]
    StartFailure {
        name: StateName,
        #[source]
        source: LifecycleError,
    },

    #[error("could not stop [{name}] due to {source}")]
    StopFailure {
        name: StateName,
        #[source]
        source: LifecycleError,
    },

    #[error("could not suspend [{name}] due to {source}")]
    SuspendFailure {
        name: StateName,
        #[source]
        source: LifecycleError,
    },

    #[error("could not resume [{name}] due to {source}")]
    ResumeFailure {
        name: StateName,
        #[source]
        source: LifecycleError,
    },

    #[error("could not resume [{name}]: state is not started")]
    ResumeOnStopped { name: StateName },
}

impl TransitionError {
    /// The state whose transition failed.
    pub fn state(&self) -> &StateName {
        match self {
            Self::StartFailure { name, .. }
            | Self::StopFailure { name, .. }
            | Self::SuspendFailure { name, .. }
            | Self::ResumeFailure { name, .. }
            | Self::ResumeOnStopped { name } => name,
        }
    }
}

/// Errors from process-backed states.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn {command}: {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("Failed to send {signal} to pid {pid}: {reason}")]
    SignalFailed {
        pid: u32,
        signal: &'static str,
        reason: String,
    },

    #[error("Failed to reap pid {pid}: {reason}")]
    WaitFailed { pid: u32, reason: String },

    #[error("State {name} has no process bound")]
    NotBound { name: StateName },
}

/// Result type alias using StatelyError.
pub type StatelyResult<T> = Result<T, StatelyError>;
