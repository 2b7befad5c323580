// Simulated playback engine
// Runs a worker thread that fakes preparation, playback progress, seeking and
// end of stream, and reports through the session's sink from that thread.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use mediaplayer_core::event::{MEDIA_ERROR_SERVER_DIED, MEDIA_ERROR_UNKNOWN};
use mediaplayer_core::{
    DataSource, EngineError, EngineFactory, EngineResult, EventSink, MediaEngine, Notification,
};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Behaviour of simulated engines
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Media length in milliseconds
    pub duration_ms: u32,
    /// Reported video size, `(0, 0)` for audio only
    pub video_size: (u32, u32),
    /// Time spent preparing, sync or async
    pub prepare_latency: Duration,
    /// Worker wake-up interval while playing
    pub tick: Duration,
    /// Buffering percentages reported while preparing asynchronously
    pub buffering_steps: Vec<i32>,
    /// Refuse every source
    pub fail_open: bool,
    /// `(what, extra)` reported when preparation fails
    pub fail_prepare: Option<(i32, i32)>,
    /// Report an asynchronous error once playback reaches this position
    pub fail_at_ms: Option<u32>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duration_ms: 3_000,
            video_size: (0, 0),
            prepare_latency: Duration::from_millis(20),
            tick: Duration::from_millis(10),
            buffering_steps: Vec::new(),
            fail_open: false,
            fail_prepare: None,
            fail_at_ms: None,
        }
    }
}

/// Creates `SimEngine`s and counts their lifecycle
#[derive(Default)]
pub struct SimEngineFactory {
    config: SimConfig,
    created: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl SimEngineFactory {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            created: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl EngineFactory for SimEngineFactory {
    fn create(&self, sink: Arc<dyn EventSink>) -> Result<Box<dyn MediaEngine>, EngineError> {
        let engine = SimEngine::spawn(self.config.clone(), sink, self.released.clone())?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(engine))
    }
}

enum Command {
    PrepareAsync,
    Start,
    Pause,
    Stop,
    Seek(u32),
    Shutdown,
}

/// State shared between the engine handle and its worker
struct Progress {
    position_ms: AtomicU32,
    playing: AtomicBool,
    looping: AtomicBool,
    prepared: AtomicBool,
}

pub struct SimEngine {
    config: SimConfig,
    sink: Arc<dyn EventSink>,
    progress: Arc<Progress>,
    commands: Sender<Command>,
    worker: Option<thread::JoinHandle<()>>,
    source: Option<DataSource>,
    volume: (f32, f32),
    released: Arc<AtomicUsize>,
}

impl SimEngine {
    fn spawn(
        config: SimConfig,
        sink: Arc<dyn EventSink>,
        released: Arc<AtomicUsize>,
    ) -> Result<Self, EngineError> {
        let progress = Arc::new(Progress {
            position_ms: AtomicU32::new(0),
            playing: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            prepared: AtomicBool::new(false),
        });
        let (commands, rx) = unbounded();

        let worker_config = config.clone();
        let worker_sink = sink.clone();
        let worker_progress = progress.clone();
        let worker = thread::Builder::new()
            .name("sim-engine".to_string())
            .spawn(move || run_worker(worker_config, worker_sink, worker_progress, rx))
            .map_err(|e| EngineError::unknown(0, format!("spawn worker: {e}")))?;

        Ok(Self {
            config,
            sink,
            progress,
            commands,
            worker: Some(worker),
            source: None,
            volume: (1.0, 1.0),
            released,
        })
    }

    pub fn source(&self) -> Option<&DataSource> {
        self.source.as_ref()
    }

    pub fn volume(&self) -> (f32, f32) {
        self.volume
    }

    fn send(&self, command: Command) -> EngineResult<()> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::new(MEDIA_ERROR_SERVER_DIED, 0, "engine worker is gone"))
    }

    fn finish_prepare(&self) {
        self.progress.prepared.store(true, Ordering::SeqCst);
        let (width, height) = self.config.video_size;
        if width > 0 && height > 0 {
            self.sink.post(Notification::VideoSizeChanged {
                width: width as i32,
                height: height as i32,
            });
        }
        self.sink.post(Notification::Prepared);
    }

    fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.commands.send(Command::Shutdown);
            if worker.join().is_err() {
                log::error!("sim engine worker panicked");
            }
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl MediaEngine for SimEngine {
    fn open(&mut self, source: &DataSource) -> EngineResult<()> {
        if self.config.fail_open {
            return Err(EngineError::unknown(-1004, format!("cannot open {source:?}")));
        }
        self.source = Some(source.clone());
        Ok(())
    }

    fn prepare(&mut self) -> EngineResult<()> {
        thread::sleep(self.config.prepare_latency);
        if let Some((what, extra)) = self.config.fail_prepare {
            return Err(EngineError::new(what, extra, "prepare failed"));
        }
        self.progress.position_ms.store(0, Ordering::SeqCst);
        self.finish_prepare();
        Ok(())
    }

    fn prepare_async(&mut self) -> EngineResult<()> {
        self.send(Command::PrepareAsync)
    }

    fn start(&mut self) -> EngineResult<()> {
        if self.progress.position_ms.load(Ordering::SeqCst) >= self.config.duration_ms {
            self.progress.position_ms.store(0, Ordering::SeqCst);
        }
        self.progress.playing.store(true, Ordering::SeqCst);
        self.send(Command::Start)
    }

    fn pause(&mut self) -> EngineResult<()> {
        self.progress.playing.store(false, Ordering::SeqCst);
        self.send(Command::Pause)
    }

    fn stop(&mut self) -> EngineResult<()> {
        self.progress.prepared.store(false, Ordering::SeqCst);
        self.progress.playing.store(false, Ordering::SeqCst);
        self.progress.position_ms.store(0, Ordering::SeqCst);
        self.send(Command::Stop)
    }

    fn seek_to(&mut self, position_ms: u32) -> EngineResult<()> {
        let target = position_ms.min(self.config.duration_ms);
        self.progress.position_ms.store(target, Ordering::SeqCst);
        self.send(Command::Seek(target))
    }

    fn current_position(&self) -> EngineResult<u32> {
        Ok(self.progress.position_ms.load(Ordering::SeqCst))
    }

    fn duration(&self) -> EngineResult<u32> {
        Ok(self.config.duration_ms)
    }

    fn video_size(&self) -> EngineResult<(u32, u32)> {
        if self.progress.prepared.load(Ordering::SeqCst) {
            Ok(self.config.video_size)
        } else {
            Ok((0, 0))
        }
    }

    fn is_playing(&self) -> bool {
        self.progress.playing.load(Ordering::SeqCst)
    }

    fn set_volume(&mut self, left: f32, right: f32) -> EngineResult<()> {
        self.volume = (left, right);
        Ok(())
    }

    fn set_looping(&mut self, looping: bool) -> EngineResult<()> {
        self.progress.looping.store(looping, Ordering::SeqCst);
        Ok(())
    }

    fn set_audio_stream_type(&mut self, _stream_type: i32) -> EngineResult<()> {
        Ok(())
    }

    fn release(&mut self) {
        self.shutdown();
    }
}

impl Drop for SimEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    config: SimConfig,
    sink: Arc<dyn EventSink>,
    progress: Arc<Progress>,
    rx: Receiver<Command>,
) {
    let mut last_tick = Instant::now();
    let mut was_playing = false;
    let mut failed = false;

    loop {
        match rx.recv_timeout(config.tick) {
            Ok(Command::PrepareAsync) => {
                thread::sleep(config.prepare_latency);
                for percent in &config.buffering_steps {
                    sink.post(Notification::BufferingUpdate { percent: *percent });
                }
                match config.fail_prepare {
                    Some((what, extra)) => sink.post(Notification::Error { what, extra }),
                    None => {
                        progress.position_ms.store(0, Ordering::SeqCst);
                        progress.prepared.store(true, Ordering::SeqCst);
                        let (width, height) = config.video_size;
                        if width > 0 && height > 0 {
                            sink.post(Notification::VideoSizeChanged {
                                width: width as i32,
                                height: height as i32,
                            });
                        }
                        sink.post(Notification::Prepared);
                    }
                }
            }
            // Transport state is already applied by the caller; these only
            // wake the worker so the clock restarts promptly.
            Ok(Command::Start) | Ok(Command::Pause) | Ok(Command::Stop) => {}
            Ok(Command::Seek(_)) => sink.post(Notification::SeekComplete),
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        if !progress.playing.load(Ordering::SeqCst) {
            was_playing = false;
            continue;
        }

        let now = Instant::now();
        if !was_playing {
            was_playing = true;
            last_tick = now;
        }
        let elapsed = now.duration_since(last_tick).as_millis() as u32;
        last_tick = now;
        let position = progress.position_ms.load(Ordering::SeqCst).saturating_add(elapsed);

        if let Some(fail_at) = config.fail_at_ms {
            if !failed && position >= fail_at {
                failed = true;
                progress.playing.store(false, Ordering::SeqCst);
                sink.post(Notification::Error {
                    what: MEDIA_ERROR_UNKNOWN,
                    extra: -1007,
                });
                continue;
            }
        }

        if position < config.duration_ms {
            progress.position_ms.store(position, Ordering::SeqCst);
        } else if progress.looping.load(Ordering::SeqCst) {
            log::trace!("sim engine wrapped at end of stream");
            progress.position_ms.store(position % config.duration_ms.max(1), Ordering::SeqCst);
        } else {
            progress.position_ms.store(config.duration_ms, Ordering::SeqCst);
            progress.playing.store(false, Ordering::SeqCst);
            sink.post(Notification::PlaybackComplete);
        }
    }
    log::debug!("sim engine worker exiting");
}
