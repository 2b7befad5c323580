// Playback session: state machine guard in front of an opaque engine

use crate::bridge::{self, Notifier};
use crate::listener::{
    Listeners, OnBufferingUpdateListener, OnCompletionListener, OnErrorListener, OnInfoListener,
    OnPreparedListener, OnSeekCompleteListener, OnVideoSizeChangedListener,
};
use crate::looper::{self, LooperHandle};
use crate::registry::{self, SessionId};
use mediaplayer_core::event::MEDIA_ERROR_INVALID_OPERATION;
use mediaplayer_core::source::{self, RawDescriptor};
use mediaplayer_core::{
    ContentResolver, DataSource, EngineError, EngineFactory, EngineResult, MediaEngine,
    Notification, Operation, PlaybackState, PlayerError, Result, StateMachine, Verdict,
};
use mediaplayer_power::{DisplaySurface, PowerManager, StayAwake, WakeMode};
use parking_lot::Mutex;
use std::sync::Arc;

/// Which looper a new session delivers its callbacks on
#[derive(Clone, Debug, Default)]
pub enum LooperChoice {
    /// The constructing thread's looper, else the main looper
    #[default]
    Ambient,
    /// A specific looper
    Explicit(LooperHandle),
    /// No delivery at all: notifications are dropped
    Detached,
}

#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    pub looper: LooperChoice,
}

impl SessionOptions {
    pub fn on_looper(handle: LooperHandle) -> Self {
        Self {
            looper: LooperChoice::Explicit(handle),
        }
    }

    pub fn detached() -> Self {
        Self {
            looper: LooperChoice::Detached,
        }
    }

    fn resolve_looper(&self) -> Option<LooperHandle> {
        match &self.looper {
            LooperChoice::Ambient => looper::current_looper().or_else(looper::main_looper),
            LooperChoice::Explicit(handle) => Some(handle.clone()),
            LooperChoice::Detached => None,
        }
    }
}

/// Engine plus the sink it reports through
struct EngineContext {
    engine: Box<dyn MediaEngine>,
    notifier: Arc<Notifier>,
}

impl EngineContext {
    fn release(mut self) {
        // Stop accepting posts first so nothing from this engine is queued
        // once it is gone.
        self.notifier.close();
        self.engine.release();
    }
}

struct Inner {
    machine: StateMachine,
    engine: Option<EngineContext>,
    looping: bool,
    power: StayAwake,
    /// Bumped by `reset`; notifications posted before it are discarded
    epoch: u64,
}

impl Inner {
    fn engine_mut(&mut self) -> EngineResult<&mut dyn MediaEngine> {
        match self.engine.as_mut() {
            Some(ctx) => Ok(ctx.engine.as_mut()),
            None => Err(EngineError::unknown(0, "no engine context")),
        }
    }

    fn engine_ref(&self) -> EngineResult<&dyn MediaEngine> {
        match self.engine.as_ref() {
            Some(ctx) => Ok(ctx.engine.as_ref()),
            None => Err(EngineError::unknown(0, "no engine context")),
        }
    }

    fn release_engine(&mut self) {
        if let Some(ctx) = self.engine.take() {
            ctx.release();
        }
    }
}

pub(crate) struct Shared {
    id: SessionId,
    looper: Option<LooperHandle>,
    factory: Arc<dyn EngineFactory>,
    inner: Mutex<Inner>,
    listeners: Listeners,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.machine.state() != PlaybackState::End {
            log::debug!("{} dropped without release", self.id);
            inner.power.release();
            inner.release_engine();
            inner.machine.transition(PlaybackState::End);
        }
        registry::unregister(self.id);
    }
}

/// Outcome of the state check for one call
enum Gate {
    Run,
    Skip,
}

/// A playback session.
///
/// All operations take `&self` so listeners, which receive the session by
/// reference on the looper thread, can drive it further.
pub struct MediaPlayer {
    shared: Arc<Shared>,
}

impl MediaPlayer {
    /// New session on the bootstrapped engine factory.
    pub fn new() -> Result<Self> {
        let factory = crate::engine_factory().ok_or(PlayerError::EngineUnavailable)?;
        Ok(Self::with_options(factory, SessionOptions::default()))
    }

    pub fn with_factory(factory: Arc<dyn EngineFactory>) -> Self {
        Self::with_options(factory, SessionOptions::default())
    }

    pub fn with_options(factory: Arc<dyn EngineFactory>, options: SessionOptions) -> Self {
        let id = registry::next_id();
        let looper = options.resolve_looper();
        match &looper {
            Some(handle) => log::info!("{} created on looper {}", id, handle.id()),
            None => log::warn!("{} created without a looper, notifications will be dropped", id),
        }

        let shared = Arc::new(Shared {
            id,
            looper,
            factory,
            inner: Mutex::new(Inner {
                machine: StateMachine::new(),
                engine: None,
                looping: false,
                power: StayAwake::new(),
                epoch: 0,
            }),
            listeners: Listeners::new(),
        });
        registry::register(id, &shared);
        Self { shared }
    }

    /// New session with `source` set and synchronously prepared.
    pub fn create(source: DataSource) -> Result<Self> {
        let mp = Self::new()?;
        mp.set_data_source(source)?;
        mp.prepare()?;
        Ok(mp)
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.inner.lock().machine.state()
    }

    /// Whether notifications have somewhere to go.
    pub fn has_looper(&self) -> bool {
        self.shared.looper.is_some()
    }

    // ---------------------------------------------------------------------
    // Source
    // ---------------------------------------------------------------------

    pub fn set_data_source(&self, source: DataSource) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        self.gate(&mut inner, Operation::SetDataSource)?;
        source.validate()?;

        let notifier = Arc::new(Notifier::new(
            self.id(),
            inner.epoch,
            self.shared.looper.clone(),
        ));
        let mut engine = self.shared.factory.create(notifier.clone())?;
        if let Err(err) = engine.open(&source) {
            notifier.close();
            engine.release();
            return Err(PlayerError::SourceUnavailable(err.to_string()));
        }

        inner.engine = Some(EngineContext { engine, notifier });
        inner.machine.transition(PlaybackState::Initialized);
        log::info!("{}: data source set {:?}", self.id(), source);
        Ok(())
    }

    pub fn set_data_source_path(&self, path: impl Into<String>) -> Result<()> {
        self.set_data_source(DataSource::Path(path.into()))
    }

    pub fn set_data_source_fd(&self, fd: RawDescriptor) -> Result<()> {
        self.set_data_source(DataSource::fd(fd))
    }

    pub fn set_data_source_fd_range(
        &self,
        fd: RawDescriptor,
        offset: i64,
        length: i64,
    ) -> Result<()> {
        self.set_data_source(DataSource::Fd { fd, offset, length })
    }

    pub fn set_data_source_uri(&self, resolver: &dyn ContentResolver, uri: &str) -> Result<()> {
        self.set_data_source(source::resolve_uri(resolver, uri))
    }

    // ---------------------------------------------------------------------
    // Preparation
    // ---------------------------------------------------------------------

    /// Prepare synchronously. Blocks until the engine is ready.
    pub fn prepare(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if let Gate::Skip = self.gate(&mut inner, Operation::Prepare)? {
            return Ok(());
        }
        match inner.engine_mut().and_then(|e| e.prepare()) {
            Ok(()) => {
                inner.machine.transition(PlaybackState::Prepared);
                Ok(())
            }
            Err(err) => {
                log::error!("{}: prepare failed: {}", self.id(), err);
                inner.machine.transition(PlaybackState::Error);
                Err(PlayerError::Engine(err))
            }
        }
    }

    /// Start preparing; completion arrives as a `Prepared` or `Error` callback.
    pub fn prepare_async(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if let Gate::Skip = self.gate(&mut inner, Operation::PrepareAsync)? {
            return Ok(());
        }
        inner.machine.transition(PlaybackState::Preparing);
        if let Err(err) = inner.engine_mut().and_then(|e| e.prepare_async()) {
            self.engine_failed(&mut inner, Operation::PrepareAsync, err);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Transport
    // ---------------------------------------------------------------------

    pub fn start(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if let Gate::Skip = self.gate(&mut inner, Operation::Start)? {
            return Ok(());
        }
        // Awake before the engine starts producing output.
        inner.power.stay_awake(true);
        match inner.engine_mut().and_then(|e| e.start()) {
            Ok(()) => inner.machine.transition(PlaybackState::Started),
            Err(err) => self.engine_failed(&mut inner, Operation::Start, err),
        }
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if let Gate::Skip = self.gate(&mut inner, Operation::Pause)? {
            return Ok(());
        }
        match inner.engine_mut().and_then(|e| e.pause()) {
            Ok(()) => {
                inner.machine.transition(PlaybackState::Paused);
                inner.power.stay_awake(false);
            }
            Err(err) => self.engine_failed(&mut inner, Operation::Pause, err),
        }
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if let Gate::Skip = self.gate(&mut inner, Operation::Stop)? {
            return Ok(());
        }
        match inner.engine_mut().and_then(|e| e.stop()) {
            Ok(()) => {
                inner.machine.transition(PlaybackState::Stopped);
                inner.power.stay_awake(false);
            }
            Err(err) => self.engine_failed(&mut inner, Operation::Stop, err),
        }
        Ok(())
    }

    /// Seek; completion arrives as a `SeekComplete` callback.
    pub fn seek_to(&self, position_ms: u32) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if let Gate::Skip = self.gate(&mut inner, Operation::SeekTo)? {
            return Ok(());
        }
        if let Err(err) = inner.engine_mut().and_then(|e| e.seek_to(position_ms)) {
            self.engine_failed(&mut inner, Operation::SeekTo, err);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Current position in milliseconds, 0 before a source is set.
    pub fn current_position(&self) -> Result<u32> {
        self.query(Operation::GetCurrentPosition, |e| e.current_position())
    }

    /// Duration in milliseconds.
    pub fn duration(&self) -> Result<u32> {
        self.query(Operation::GetDuration, |e| e.duration())
    }

    pub fn video_width(&self) -> Result<u32> {
        self.query(Operation::GetVideoWidth, |e| e.video_size().map(|(w, _)| w))
    }

    pub fn video_height(&self) -> Result<u32> {
        self.query(Operation::GetVideoHeight, |e| e.video_size().map(|(_, h)| h))
    }

    pub fn is_playing(&self) -> Result<bool> {
        self.query(Operation::IsPlaying, |e| Ok(e.is_playing()))
    }

    fn query<T: Default>(
        &self,
        op: Operation,
        f: impl FnOnce(&dyn MediaEngine) -> EngineResult<T>,
    ) -> Result<T> {
        let mut inner = self.shared.inner.lock();
        if let Gate::Skip = self.gate(&mut inner, op)? {
            return Ok(T::default());
        }
        if !inner.machine.state().has_engine() {
            return Ok(T::default());
        }
        match inner.engine_ref().and_then(f) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.engine_failed(&mut inner, op, err);
                Ok(T::default())
            }
        }
    }

    // ---------------------------------------------------------------------
    // Engine settings
    // ---------------------------------------------------------------------

    pub fn set_volume(&self, left: f32, right: f32) -> Result<()> {
        self.configure(Operation::SetVolume, |inner| {
            inner.engine_mut()?.set_volume(left, right)
        })
    }

    /// The engine flag and the session's copy change under one lock, so an
    /// end-of-stream dispatch never sees them disagree.
    pub fn set_looping(&self, looping: bool) -> Result<()> {
        self.configure(Operation::SetLooping, |inner| {
            inner.engine_mut()?.set_looping(looping)?;
            inner.looping = looping;
            Ok(())
        })
    }

    pub fn is_looping(&self) -> bool {
        self.shared.inner.lock().looping
    }

    pub fn set_audio_stream_type(&self, stream_type: i32) -> Result<()> {
        self.configure(Operation::SetAudioStreamType, |inner| {
            inner.engine_mut()?.set_audio_stream_type(stream_type)
        })
    }

    fn configure(
        &self,
        op: Operation,
        f: impl FnOnce(&mut Inner) -> EngineResult<()>,
    ) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if let Gate::Skip = self.gate(&mut inner, op)? {
            return Ok(());
        }
        f(&mut inner).map_err(PlayerError::Engine)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Back to `Idle` from anywhere but `End`. The engine context is
    /// released and nothing queued before the reset reaches a listener; the
    /// next source creates a fresh engine.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        self.gate(&mut inner, Operation::Reset)?;
        inner.power.stay_awake(false);
        inner.release_engine();
        inner.looping = false;
        inner.epoch = inner.epoch.wrapping_add(1);
        inner.machine.transition(PlaybackState::Idle);
        log::info!("{}: reset", self.id());
        Ok(())
    }

    /// Terminal release. Safe to call any number of times.
    pub fn release(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.machine.state() == PlaybackState::End {
            log::debug!("{}: already released", self.id());
            return;
        }
        // Wake lock goes before the engine.
        inner.power.release();
        inner.release_engine();
        inner.machine.transition(PlaybackState::End);
        drop(inner);

        self.shared.listeners.clear();
        registry::unregister(self.id());
        log::info!("{}: released", self.id());
    }

    // ---------------------------------------------------------------------
    // Side effects
    // ---------------------------------------------------------------------

    pub fn set_wake_mode(&self, power: &dyn PowerManager, mode: WakeMode) {
        self.shared.inner.lock().power.set_wake_mode(power, mode);
    }

    pub fn set_display(&self, surface: Option<Arc<dyn DisplaySurface>>) {
        self.shared.inner.lock().power.set_display(surface);
    }

    pub fn set_screen_on_while_playing(&self, screen_on: bool) {
        self.shared
            .inner
            .lock()
            .power
            .set_screen_on_while_playing(screen_on);
    }

    pub fn is_staying_awake(&self) -> bool {
        self.shared.inner.lock().power.is_staying_awake()
    }

    pub fn is_wake_lock_held(&self) -> bool {
        self.shared.inner.lock().power.is_wake_lock_held()
    }

    // ---------------------------------------------------------------------
    // Listeners
    // ---------------------------------------------------------------------

    pub fn set_on_prepared_listener(&self, listener: Option<Arc<dyn OnPreparedListener>>) {
        self.shared.listeners.prepared.set(listener);
    }

    pub fn set_on_completion_listener(&self, listener: Option<Arc<dyn OnCompletionListener>>) {
        self.shared.listeners.completion.set(listener);
    }

    pub fn set_on_buffering_update_listener(
        &self,
        listener: Option<Arc<dyn OnBufferingUpdateListener>>,
    ) {
        self.shared.listeners.buffering_update.set(listener);
    }

    pub fn set_on_seek_complete_listener(
        &self,
        listener: Option<Arc<dyn OnSeekCompleteListener>>,
    ) {
        self.shared.listeners.seek_complete.set(listener);
    }

    pub fn set_on_video_size_changed_listener(
        &self,
        listener: Option<Arc<dyn OnVideoSizeChangedListener>>,
    ) {
        self.shared.listeners.video_size_changed.set(listener);
    }

    pub fn set_on_error_listener(&self, listener: Option<Arc<dyn OnErrorListener>>) {
        self.shared.listeners.error.set(listener);
    }

    pub fn set_on_info_listener(&self, listener: Option<Arc<dyn OnInfoListener>>) {
        self.shared.listeners.info.set(listener);
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn gate(&self, inner: &mut Inner, op: Operation) -> Result<Gate> {
        match inner.machine.check(op) {
            Verdict::Proceed => Ok(Gate::Run),
            Verdict::AlreadyThere => Ok(Gate::Skip),
            Verdict::Reject(err) => Err(err),
            Verdict::Corrupt => {
                log::warn!(
                    "{}: {:?} called in state {:?}",
                    self.id(),
                    op,
                    inner.machine.state()
                );
                inner.machine.transition(PlaybackState::Error);
                inner.power.stay_awake(false);
                self.post(
                    inner.epoch,
                    Notification::Error {
                        what: MEDIA_ERROR_INVALID_OPERATION,
                        extra: 0,
                    },
                );
                Ok(Gate::Skip)
            }
        }
    }

    fn engine_failed(&self, inner: &mut Inner, op: Operation, err: EngineError) {
        log::error!("{}: engine rejected {:?}: {}", self.id(), op, err);
        inner.machine.transition(PlaybackState::Error);
        // Unrecoverable until reset; do not wait for the dispatch to let go.
        inner.power.stay_awake(false);
        self.post(
            inner.epoch,
            Notification::Error {
                what: err.what,
                extra: err.extra,
            },
        );
    }

    fn post(&self, epoch: u64, notification: Notification) {
        bridge::post(self.shared.looper.as_ref(), self.id(), epoch, notification, None);
    }

    /// Apply one notification. Runs on the owning looper; no session lock is
    /// held while listeners run.
    pub(crate) fn handle_notification(&self, notification: Notification, epoch: u64) {
        {
            let inner = self.shared.inner.lock();
            if inner.machine.state() == PlaybackState::End {
                log::debug!("{}: released, dropping {:?}", self.id(), notification);
                return;
            }
            if inner.epoch != epoch {
                log::debug!("{}: posted before reset, dropping {:?}", self.id(), notification);
                return;
            }
        }
        log::debug!("{}: dispatch {:?}", self.id(), notification);
        let listeners = &self.shared.listeners;
        match notification {
            Notification::Nop => {}

            Notification::Prepared => {
                {
                    let mut inner = self.shared.inner.lock();
                    if inner.machine.state() == PlaybackState::Preparing {
                        inner.machine.transition(PlaybackState::Prepared);
                    }
                }
                if let Some(l) = listeners.prepared.get() {
                    l.on_prepared(self);
                }
            }

            Notification::PlaybackComplete => {
                {
                    let mut inner = self.shared.inner.lock();
                    if inner.looping {
                        log::debug!("{}: end of stream while looping", self.id());
                        return;
                    }
                    if inner.machine.state() == PlaybackState::Started {
                        inner.machine.transition(PlaybackState::PlaybackCompleted);
                    }
                }
                if let Some(l) = listeners.completion.get() {
                    l.on_completion(self);
                }
                self.shared.inner.lock().power.stay_awake(false);
            }

            Notification::BufferingUpdate { percent } => {
                if let Some(l) = listeners.buffering_update.get() {
                    l.on_buffering_update(self, percent);
                }
            }

            Notification::SeekComplete => {
                if let Some(l) = listeners.seek_complete.get() {
                    l.on_seek_complete(self);
                }
            }

            Notification::VideoSizeChanged { width, height } => {
                if let Some(l) = listeners.video_size_changed.get() {
                    l.on_video_size_changed(self, width, height);
                }
            }

            Notification::Error { what, extra } => {
                log::error!("{}: Error ({},{})", self.id(), what, extra);
                {
                    let mut inner = self.shared.inner.lock();
                    if inner.machine.state() != PlaybackState::End {
                        inner.machine.transition(PlaybackState::Error);
                    }
                }
                let handled = match listeners.error.get() {
                    Some(l) => l.on_error(self, what, extra),
                    None => false,
                };
                if !handled {
                    if let Some(l) = listeners.completion.get() {
                        l.on_completion(self);
                    }
                }
                self.shared.inner.lock().power.stay_awake(false);
            }

            Notification::Info { what, extra } => {
                log::info!("{}: Info ({},{})", self.id(), what, extra);
                if let Some(l) = listeners.info.get() {
                    l.on_info(self, what, extra);
                }
            }
        }
    }
}

impl std::fmt::Debug for MediaPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPlayer")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
