// Error taxonomy for the playback control plane

use crate::state::{Operation, PlaybackState};
use thiserror::Error;

/// Error code pair reported by an engine, mirrored into `Error(what, extra)`
/// notifications.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("engine error ({what}, {extra}): {message}")]
pub struct EngineError {
    pub what: i32,
    pub extra: i32,
    pub message: String,
}

impl EngineError {
    pub fn new(what: i32, extra: i32, message: impl Into<String>) -> Self {
        Self {
            what,
            extra,
            message: message.into(),
        }
    }

    /// Unspecified failure with an implementation-defined extra code.
    pub fn unknown(extra: i32, message: impl Into<String>) -> Self {
        Self::new(crate::event::MEDIA_ERROR_UNKNOWN, extra, message)
    }
}

/// Errors surfaced synchronously to the caller of a session operation.
///
/// Runtime failures (engine-class operations issued in the wrong state,
/// asynchronous engine errors) are never returned through this type; they
/// move the session to `Error` and reach the error listener instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    /// Programming-error class operation issued outside its valid states.
    #[error("{operation:?} called in state {state:?}")]
    InvalidState {
        operation: Operation,
        state: PlaybackState,
    },

    /// Source resolution failed before the engine was engaged.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The engine failed while the caller was blocked on it (sync prepare).
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// No engine factory was bootstrapped for this process.
    #[error("no engine factory installed")]
    EngineUnavailable,

    /// The current thread already owns a looper.
    #[error("a looper is already prepared on this thread")]
    LooperAlreadyPrepared,
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Result type alias for engine calls
pub type EngineResult<T> = std::result::Result<T, EngineError>;
