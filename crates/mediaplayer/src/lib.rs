// Playback session facade: state machine guard plus ordered event delivery
//
// Client -> MediaPlayer (validate + forward) -> engine (opaque)
//        -> [engine thread] -> Notifier -> looper queue
//        -> owning thread -> listener

mod bridge;
mod listener;
pub mod looper;
mod player;
mod registry;

pub use listener::{
    OnBufferingUpdateListener, OnCompletionListener, OnErrorListener, OnInfoListener,
    OnPreparedListener, OnSeekCompleteListener, OnVideoSizeChangedListener,
};
pub use looper::{current_looper, main_looper, set_main_looper, Looper, LooperHandle, LooperThread};
pub use player::{LooperChoice, MediaPlayer, SessionOptions};
pub use registry::{is_registered, SessionId};

pub use mediaplayer_core::{
    event, AssetDescriptor, ContentResolver, DataSource, EngineError, EngineFactory,
    EngineResult, EventSink, FailurePolicy, MediaEngine, Notification, Operation, Payload,
    PlaybackState, PlayerError, Result,
};
pub use mediaplayer_power::{DisplaySurface, PowerManager, WakeLock, WakeMode};

use once_cell::sync::OnceCell;
use std::sync::{Arc, Once};

static ENGINE_FACTORY: OnceCell<Arc<dyn EngineFactory>> = OnceCell::new();
static INIT_LOGGER: Once = Once::new();

/// Initialise logging once. `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    });
}

/// One-time process-wide engine setup.
///
/// The first call installs `factory`; later calls are ignored and return
/// `false`. Must run before `MediaPlayer::new`.
pub fn bootstrap(factory: Arc<dyn EngineFactory>) -> bool {
    init_logging();
    let installed = ENGINE_FACTORY.set(factory).is_ok();
    if installed {
        log::info!("engine factory installed");
    } else {
        log::debug!("engine factory already installed, ignoring");
    }
    installed
}

pub fn is_bootstrapped() -> bool {
    ENGINE_FACTORY.get().is_some()
}

pub(crate) fn engine_factory() -> Option<Arc<dyn EngineFactory>> {
    ENGINE_FACTORY.get().cloned()
}
