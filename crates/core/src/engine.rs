// Engine collaborator interface
// The decoding/rendering engine is opaque; the session only drives it through
// this trait and hears back through an `EventSink`.

use crate::error::{EngineError, EngineResult};
use crate::event::EventSink;
use crate::source::DataSource;
use std::sync::Arc;

/// One engine context, exclusively owned by a session.
///
/// Calls are fire-and-forget except `prepare`, which blocks until the media is
/// ready. Results of asynchronous work arrive later through the sink the
/// engine was created with.
pub trait MediaEngine: Send {
    fn open(&mut self, source: &DataSource) -> EngineResult<()>;

    /// Blocking preparation
    fn prepare(&mut self) -> EngineResult<()>;

    /// Non-blocking preparation, completes with `Prepared` or `Error`
    fn prepare_async(&mut self) -> EngineResult<()>;

    fn start(&mut self) -> EngineResult<()>;

    fn pause(&mut self) -> EngineResult<()>;

    fn stop(&mut self) -> EngineResult<()>;

    /// Completes with `SeekComplete`
    fn seek_to(&mut self, position_ms: u32) -> EngineResult<()>;

    fn current_position(&self) -> EngineResult<u32>;

    fn duration(&self) -> EngineResult<u32>;

    /// `(width, height)`, zero when there is no video
    fn video_size(&self) -> EngineResult<(u32, u32)>;

    fn is_playing(&self) -> bool;

    fn set_volume(&mut self, left: f32, right: f32) -> EngineResult<()>;

    fn set_looping(&mut self, looping: bool) -> EngineResult<()>;

    fn set_audio_stream_type(&mut self, stream_type: i32) -> EngineResult<()>;

    /// Tear down the context. Called at most once per engine.
    fn release(&mut self);
}

/// Creates engine contexts bound to a notification sink.
pub trait EngineFactory: Send + Sync {
    fn create(&self, sink: Arc<dyn EventSink>) -> Result<Box<dyn MediaEngine>, EngineError>;
}

impl<F> EngineFactory for F
where
    F: Fn(Arc<dyn EventSink>) -> Result<Box<dyn MediaEngine>, EngineError> + Send + Sync,
{
    fn create(&self, sink: Arc<dyn EventSink>) -> Result<Box<dyn MediaEngine>, EngineError> {
        self(sink)
    }
}
