// Core types and traits for the media player control plane

pub mod engine;
pub mod error;
pub mod event;
pub mod source;
pub mod state;

// Re-export commonly used types
pub use engine::{EngineFactory, MediaEngine};
pub use error::{EngineError, EngineResult, PlayerError, Result};
pub use event::{EventSink, Notification, Payload};
pub use source::{AssetDescriptor, ContentResolver, DataSource};
pub use state::{FailurePolicy, Operation, PlaybackState, StateMachine, Verdict};
