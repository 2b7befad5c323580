// C ABI over playback sessions
// Hosts without a Rust looper get a dedicated event thread; callbacks arrive there.

use mediaplayer::{
    event, set_main_looper, AssetDescriptor, ContentResolver, LooperThread, MediaPlayer,
    PlaybackState, PlayerError,
};
use mediaplayer_engine_sim::SimEngineFactory;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr};
use std::io;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Host callback: `(user_data, player_id, what, arg1, arg2)`.
///
/// `what` is one of the `MEDIA_*` message codes. For errors and info the
/// return value tells whether the host handled it; otherwise it is ignored.
pub type EventCallback =
    extern "C" fn(user_data: *mut c_void, player_id: i64, what: i32, arg1: i32, arg2: i32) -> i32;

#[derive(Debug, thiserror::Error)]
enum FfiError {
    #[error("invalid player id {0}")]
    UnknownPlayer(i64),
    #[error("invalid string argument")]
    BadString,
    #[error(transparent)]
    Player(#[from] PlayerError),
}

type Result<T> = std::result::Result<T, FfiError>;

static PLAYER_REGISTRY: Lazy<Mutex<HashMap<i64, Arc<MediaPlayer>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_PLAYER_ID: AtomicI64 = AtomicI64::new(1);
static EVENT_THREAD: OnceCell<LooperThread> = OnceCell::new();

/// C hosts hand over plain paths or URIs, never content-provider handles.
struct NoContentProvider;

impl ContentResolver for NoContentProvider {
    fn open_asset(&self, uri: &str) -> io::Result<AssetDescriptor> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("no content provider for {uri}"),
        ))
    }
}

/// Host pointer carried into listeners, which run on the event thread.
#[derive(Clone, Copy)]
struct UserData(*mut c_void);

// The host promises the pointer may be used from the event thread.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

fn register_player(player: MediaPlayer) -> i64 {
    let id = NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed);
    PLAYER_REGISTRY.lock().insert(id, Arc::new(player));
    id
}

/// Run `f` on the player without holding the registry lock, so callbacks
/// that re-enter the ABI cannot deadlock.
fn with_player<R>(id: i64, f: impl FnOnce(&MediaPlayer) -> Result<R>) -> Result<R> {
    let player = PLAYER_REGISTRY
        .lock()
        .get(&id)
        .cloned()
        .ok_or(FfiError::UnknownPlayer(id))?;
    f(&player)
}

fn to_code(result: Result<()>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1
        }
    }
}

fn read_str<'a>(ptr: *const c_char) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(FfiError::BadString);
    }
    let c_str = unsafe { CStr::from_ptr(ptr) };
    c_str.to_str().map_err(|_| FfiError::BadString)
}

fn state_code(state: PlaybackState) -> i32 {
    match state {
        PlaybackState::Idle => 0,
        PlaybackState::Initialized => 1,
        PlaybackState::Preparing => 2,
        PlaybackState::Prepared => 3,
        PlaybackState::Started => 4,
        PlaybackState::Paused => 5,
        PlaybackState::Stopped => 6,
        PlaybackState::PlaybackCompleted => 7,
        PlaybackState::Error => 8,
        PlaybackState::End => 9,
    }
}

fn install_callback(
    player_id: i64,
    mp: &MediaPlayer,
    callback: EventCallback,
    user_data: UserData,
) {
    let emit = move |what: i32, arg1: i32, arg2: i32| -> bool {
        let user_data = &user_data;
        callback(user_data.0, player_id, what, arg1, arg2) != 0
    };

    mp.set_on_prepared_listener(Some(Arc::new(move |_: &MediaPlayer| {
        emit(event::MEDIA_PREPARED, 0, 0);
    })));
    mp.set_on_completion_listener(Some(Arc::new(move |_: &MediaPlayer| {
        emit(event::MEDIA_PLAYBACK_COMPLETE, 0, 0);
    })));
    mp.set_on_buffering_update_listener(Some(Arc::new(move |_: &MediaPlayer, percent: i32| {
        emit(event::MEDIA_BUFFERING_UPDATE, percent, 0);
    })));
    mp.set_on_seek_complete_listener(Some(Arc::new(move |_: &MediaPlayer| {
        emit(event::MEDIA_SEEK_COMPLETE, 0, 0);
    })));
    mp.set_on_video_size_changed_listener(Some(Arc::new(
        move |_: &MediaPlayer, width: i32, height: i32| {
            emit(event::MEDIA_SET_VIDEO_SIZE, width, height);
        },
    )));
    mp.set_on_error_listener(Some(Arc::new(
        move |_: &MediaPlayer, what: i32, extra: i32| -> bool {
            emit(event::MEDIA_ERROR, what, extra)
        },
    )));
    mp.set_on_info_listener(Some(Arc::new(
        move |_: &MediaPlayer, what: i32, extra: i32| -> bool {
            emit(event::MEDIA_INFO, what, extra)
        },
    )));
}

fn clear_callback(mp: &MediaPlayer) {
    mp.set_on_prepared_listener(None);
    mp.set_on_completion_listener(None);
    mp.set_on_buffering_update_listener(None);
    mp.set_on_seek_complete_listener(None);
    mp.set_on_video_size_changed_listener(None);
    mp.set_on_error_listener(None);
    mp.set_on_info_listener(None);
}

// -------------------------------
// C ABI
// -------------------------------

/// Install the simulated engine and start the event thread. Safe to call
/// more than once.
#[no_mangle]
pub extern "C" fn mediaplayer_ffi_init() -> i32 {
    mediaplayer::bootstrap(Arc::new(SimEngineFactory::default()));
    match EVENT_THREAD.get_or_try_init(|| LooperThread::spawn("mediaplayer-events")) {
        Ok(thread) => {
            set_main_looper(thread.handle());
            0
        }
        Err(err) => {
            log::error!("Failed to start event thread: {}", err);
            -1
        }
    }
}

/// New session id, or `-1` before `mediaplayer_ffi_init`.
#[no_mangle]
pub extern "C" fn mediaplayer_create() -> i64 {
    match MediaPlayer::new() {
        Ok(player) => register_player(player),
        Err(err) => {
            log::error!("Failed to create player: {}", err);
            -1
        }
    }
}

/// `source` is a local path, a `file:` URI or any other URI the engine reads.
#[no_mangle]
pub extern "C" fn mediaplayer_set_data_source(player_id: i64, source: *const c_char) -> i32 {
    to_code(read_str(source).and_then(|source| {
        with_player(player_id, |p| {
            Ok(p.set_data_source_uri(&NoContentProvider, source)?)
        })
    }))
}

#[no_mangle]
pub extern "C" fn mediaplayer_prepare(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| Ok(p.prepare()?)))
}

#[no_mangle]
pub extern "C" fn mediaplayer_prepare_async(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| Ok(p.prepare_async()?)))
}

#[no_mangle]
pub extern "C" fn mediaplayer_start(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| Ok(p.start()?)))
}

#[no_mangle]
pub extern "C" fn mediaplayer_pause(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| Ok(p.pause()?)))
}

#[no_mangle]
pub extern "C" fn mediaplayer_stop(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| Ok(p.stop()?)))
}

#[no_mangle]
pub extern "C" fn mediaplayer_seek_to(player_id: i64, position_ms: i32) -> i32 {
    if position_ms < 0 {
        return -1;
    }
    to_code(with_player(player_id, |p| Ok(p.seek_to(position_ms as u32)?)))
}

#[no_mangle]
pub extern "C" fn mediaplayer_reset(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| Ok(p.reset()?)))
}

/// Release and forget the session. The id is invalid afterwards.
#[no_mangle]
pub extern "C" fn mediaplayer_release(player_id: i64) -> i32 {
    let removed = PLAYER_REGISTRY.lock().remove(&player_id);
    match removed {
        Some(player) => {
            player.release();
            0
        }
        None => -1,
    }
}

#[no_mangle]
pub extern "C" fn mediaplayer_get_state(player_id: i64) -> i32 {
    match with_player(player_id, |p| Ok(p.state())) {
        Ok(state) => state_code(state),
        Err(err) => {
            log::error!("Failed to get state: {}", err);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn mediaplayer_get_current_position(player_id: i64) -> i64 {
    match with_player(player_id, |p| Ok(p.current_position()?)) {
        Ok(pos) => pos as i64,
        Err(err) => {
            log::error!("Failed to get position: {}", err);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn mediaplayer_get_duration(player_id: i64) -> i64 {
    match with_player(player_id, |p| Ok(p.duration()?)) {
        Ok(dur) => dur as i64,
        Err(err) => {
            log::error!("Failed to get duration: {}", err);
            -1
        }
    }
}

/// `1` playing, `0` not, `-1` on error.
#[no_mangle]
pub extern "C" fn mediaplayer_is_playing(player_id: i64) -> i32 {
    match with_player(player_id, |p| Ok(p.is_playing()?)) {
        Ok(playing) => playing as i32,
        Err(err) => {
            log::error!("Failed to query playback: {}", err);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn mediaplayer_set_looping(player_id: i64, looping: i32) -> i32 {
    to_code(with_player(player_id, |p| Ok(p.set_looping(looping != 0)?)))
}

#[no_mangle]
pub extern "C" fn mediaplayer_set_volume(player_id: i64, left: f32, right: f32) -> i32 {
    to_code(with_player(player_id, |p| Ok(p.set_volume(left, right)?)))
}

/// Route every listener kind to `callback`; `None` clears them all.
#[no_mangle]
pub extern "C" fn mediaplayer_set_event_callback(
    player_id: i64,
    callback: Option<EventCallback>,
    user_data: *mut c_void,
) -> i32 {
    to_code(with_player(player_id, |p| {
        match callback {
            Some(callback) => install_callback(player_id, p, callback, UserData(user_data)),
            None => clear_callback(p),
        }
        Ok(())
    }))
}
