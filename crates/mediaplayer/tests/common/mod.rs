// Shared fixtures: a recording fake engine, fake power sinks and a listener recorder

#![allow(dead_code)]

use mediaplayer::{
    DataSource, EngineError, EngineFactory, EngineResult, EventSink, Looper, MediaEngine,
    MediaPlayer, Notification, PlaybackState, PowerManager, SessionOptions, WakeLock, WakeMode,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// What the fake engine saw, plus knobs to make it fail
#[derive(Default)]
pub struct Recorder {
    pub calls: Mutex<Vec<&'static str>>,
    pub sinks: Mutex<Vec<Arc<dyn EventSink>>>,
    pub created: AtomicUsize,
    pub released: AtomicUsize,
    pub fail_open: AtomicBool,
    pub fail_start: AtomicBool,
    pub fail_prepare: AtomicBool,
    /// Wake lock state observed when the engine was asked to start
    pub awake_at_start: Mutex<Vec<bool>>,
    pub wake_held: Arc<AtomicBool>,
    /// Runs inside the next `set_looping` engine call
    pub on_set_looping: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == call).count()
    }

    /// Sink of the most recently created engine
    pub fn sink(&self) -> Arc<dyn EventSink> {
        self.sinks
            .lock()
            .last()
            .cloned()
            .expect("no engine created yet")
    }

    pub fn emit(&self, notification: Notification) {
        self.sink().post(notification);
    }
}

pub struct FakeEngine {
    rec: Arc<Recorder>,
    playing: bool,
    position_ms: u32,
}

impl FakeEngine {
    fn record(&self, call: &'static str) {
        self.rec.calls.lock().push(call);
    }
}

impl MediaEngine for FakeEngine {
    fn open(&mut self, _source: &DataSource) -> EngineResult<()> {
        self.record("open");
        if self.rec.fail_open.load(Ordering::SeqCst) {
            return Err(EngineError::unknown(-1004, "open failed"));
        }
        Ok(())
    }

    fn prepare(&mut self) -> EngineResult<()> {
        self.record("prepare");
        if self.rec.fail_prepare.load(Ordering::SeqCst) {
            return Err(EngineError::unknown(-1010, "unsupported"));
        }
        Ok(())
    }

    fn prepare_async(&mut self) -> EngineResult<()> {
        self.record("prepare_async");
        Ok(())
    }

    fn start(&mut self) -> EngineResult<()> {
        self.record("start");
        self.rec
            .awake_at_start
            .lock()
            .push(self.rec.wake_held.load(Ordering::SeqCst));
        if self.rec.fail_start.load(Ordering::SeqCst) {
            return Err(EngineError::new(1, -19, "start failed"));
        }
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> EngineResult<()> {
        self.record("pause");
        self.playing = false;
        Ok(())
    }

    fn stop(&mut self) -> EngineResult<()> {
        self.record("stop");
        self.playing = false;
        Ok(())
    }

    fn seek_to(&mut self, position_ms: u32) -> EngineResult<()> {
        self.record("seek_to");
        self.position_ms = position_ms;
        Ok(())
    }

    fn current_position(&self) -> EngineResult<u32> {
        Ok(self.position_ms)
    }

    fn duration(&self) -> EngineResult<u32> {
        Ok(5_000)
    }

    fn video_size(&self) -> EngineResult<(u32, u32)> {
        Ok((1280, 720))
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn set_volume(&mut self, _left: f32, _right: f32) -> EngineResult<()> {
        self.record("set_volume");
        Ok(())
    }

    fn set_looping(&mut self, _looping: bool) -> EngineResult<()> {
        self.record("set_looping");
        if let Some(hook) = self.rec.on_set_looping.lock().take() {
            hook();
        }
        Ok(())
    }

    fn set_audio_stream_type(&mut self, _stream_type: i32) -> EngineResult<()> {
        self.record("set_audio_stream_type");
        Ok(())
    }

    fn release(&mut self) {
        self.record("release");
        self.rec.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeFactory {
    pub rec: Arc<Recorder>,
}

impl EngineFactory for FakeFactory {
    fn create(&self, sink: Arc<dyn EventSink>) -> Result<Box<dyn MediaEngine>, EngineError> {
        self.rec.sinks.lock().push(sink);
        self.rec.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEngine {
            rec: self.rec.clone(),
            playing: false,
            position_ms: 0,
        }))
    }
}

/// Wake lock whose held flag is shared with the recorder
pub struct FakeWakeLock {
    held: Arc<AtomicBool>,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl WakeLock for FakeWakeLock {
    fn acquire(&mut self) {
        assert!(!self.held.swap(true, Ordering::SeqCst), "double acquire");
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&mut self) {
        assert!(self.held.swap(false, Ordering::SeqCst), "double release");
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    fn set_reference_counted(&mut self, _counted: bool) {}
}

pub struct FakePower {
    pub held: Arc<AtomicBool>,
    pub acquired: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl FakePower {
    pub fn sharing(rec: &Recorder) -> Self {
        Self {
            held: rec.wake_held.clone(),
            acquired: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl PowerManager for FakePower {
    fn new_wake_lock(&self, _mode: WakeMode, _tag: &str) -> Box<dyn WakeLock> {
        Box::new(FakeWakeLock {
            held: self.held.clone(),
            acquired: self.acquired.clone(),
            released: self.released.clone(),
        })
    }
}

/// Listener invocations in delivery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heard {
    Prepared,
    Completion,
    Buffering(i32),
    SeekComplete,
    VideoSize(i32, i32),
    Error(i32, i32),
    Info(i32, i32),
}

pub type Journal = Arc<Mutex<Vec<Heard>>>;

/// Register every listener kind; the error listener answers `handle_errors`.
pub fn wire(mp: &MediaPlayer, handle_errors: bool) -> Journal {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));

    let j = journal.clone();
    mp.set_on_prepared_listener(Some(Arc::new(move |_: &MediaPlayer| {
        j.lock().push(Heard::Prepared)
    })));
    let j = journal.clone();
    mp.set_on_completion_listener(Some(Arc::new(move |_: &MediaPlayer| {
        j.lock().push(Heard::Completion)
    })));
    let j = journal.clone();
    mp.set_on_buffering_update_listener(Some(Arc::new(move |_: &MediaPlayer, p: i32| {
        j.lock().push(Heard::Buffering(p))
    })));
    let j = journal.clone();
    mp.set_on_seek_complete_listener(Some(Arc::new(move |_: &MediaPlayer| {
        j.lock().push(Heard::SeekComplete)
    })));
    let j = journal.clone();
    mp.set_on_video_size_changed_listener(Some(Arc::new(
        move |_: &MediaPlayer, w: i32, h: i32| j.lock().push(Heard::VideoSize(w, h)),
    )));
    let j = journal.clone();
    mp.set_on_error_listener(Some(Arc::new(
        move |_: &MediaPlayer, what: i32, extra: i32| -> bool {
            j.lock().push(Heard::Error(what, extra));
            handle_errors
        },
    )));
    let j = journal.clone();
    mp.set_on_info_listener(Some(Arc::new(
        move |_: &MediaPlayer, what: i32, extra: i32| -> bool {
            j.lock().push(Heard::Info(what, extra));
            true
        },
    )));

    journal
}

/// A session bound to `looper` on a fresh fake engine
pub fn session(looper: &Looper) -> (MediaPlayer, Arc<Recorder>) {
    init_test_logging();
    let rec = Arc::new(Recorder::default());
    let factory = Arc::new(FakeFactory {
        rec: rec.clone(),
    });
    let mp = MediaPlayer::with_options(factory, SessionOptions::on_looper(looper.handle()));
    (mp, rec)
}

pub fn fake_source() -> DataSource {
    DataSource::Uri("fake://media/clip".into())
}

/// Walk a fresh session into `target` through legal operations.
pub fn drive_to(mp: &MediaPlayer, rec: &Recorder, looper: &Looper, target: PlaybackState) {
    use PlaybackState::*;
    match target {
        Idle => {}
        Initialized => mp.set_data_source(fake_source()).unwrap(),
        Preparing => {
            drive_to(mp, rec, looper, Initialized);
            mp.prepare_async().unwrap();
        }
        Prepared => {
            drive_to(mp, rec, looper, Initialized);
            mp.prepare().unwrap();
        }
        Started => {
            drive_to(mp, rec, looper, Prepared);
            mp.start().unwrap();
        }
        Paused => {
            drive_to(mp, rec, looper, Started);
            mp.pause().unwrap();
        }
        Stopped => {
            drive_to(mp, rec, looper, Prepared);
            mp.stop().unwrap();
        }
        PlaybackCompleted => {
            drive_to(mp, rec, looper, Started);
            rec.emit(Notification::PlaybackComplete);
        }
        Error => {
            mp.start().unwrap();
        }
        End => mp.release(),
    }
    looper.dispatch_pending();
    assert_eq!(mp.state(), target, "failed to reach {target:?}");
}
