// Listener traits and their single-slot storage
// Every listener kind has exactly one slot; setting replaces, `None` clears.

use crate::player::MediaPlayer;
use parking_lot::RwLock;
use std::sync::Arc;

/// Media is ready for playback
pub trait OnPreparedListener: Send + Sync {
    fn on_prepared(&self, mp: &MediaPlayer);
}

/// End of playback was reached, or an unhandled error ended it
pub trait OnCompletionListener: Send + Sync {
    fn on_completion(&self, mp: &MediaPlayer);
}

/// Network buffering progress, `percent` of the stream
pub trait OnBufferingUpdateListener: Send + Sync {
    fn on_buffering_update(&self, mp: &MediaPlayer, percent: i32);
}

pub trait OnSeekCompleteListener: Send + Sync {
    fn on_seek_complete(&self, mp: &MediaPlayer);
}

/// Video size is known or changed; zero when there is no video
pub trait OnVideoSizeChangedListener: Send + Sync {
    fn on_video_size_changed(&self, mp: &MediaPlayer, width: i32, height: i32);
}

/// Asynchronous error. Returning `false` also fires the completion listener.
pub trait OnErrorListener: Send + Sync {
    fn on_error(&self, mp: &MediaPlayer, what: i32, extra: i32) -> bool;
}

/// Informational event or warning. The return value is advisory only.
pub trait OnInfoListener: Send + Sync {
    fn on_info(&self, mp: &MediaPlayer, what: i32, extra: i32) -> bool;
}

impl<F> OnPreparedListener for F
where
    F: Fn(&MediaPlayer) + Send + Sync,
{
    fn on_prepared(&self, mp: &MediaPlayer) {
        self(mp)
    }
}

impl<F> OnCompletionListener for F
where
    F: Fn(&MediaPlayer) + Send + Sync,
{
    fn on_completion(&self, mp: &MediaPlayer) {
        self(mp)
    }
}

impl<F> OnBufferingUpdateListener for F
where
    F: Fn(&MediaPlayer, i32) + Send + Sync,
{
    fn on_buffering_update(&self, mp: &MediaPlayer, percent: i32) {
        self(mp, percent)
    }
}

impl<F> OnSeekCompleteListener for F
where
    F: Fn(&MediaPlayer) + Send + Sync,
{
    fn on_seek_complete(&self, mp: &MediaPlayer) {
        self(mp)
    }
}

impl<F> OnVideoSizeChangedListener for F
where
    F: Fn(&MediaPlayer, i32, i32) + Send + Sync,
{
    fn on_video_size_changed(&self, mp: &MediaPlayer, width: i32, height: i32) {
        self(mp, width, height)
    }
}

impl<F> OnErrorListener for F
where
    F: Fn(&MediaPlayer, i32, i32) -> bool + Send + Sync,
{
    fn on_error(&self, mp: &MediaPlayer, what: i32, extra: i32) -> bool {
        self(mp, what, extra)
    }
}

impl<F> OnInfoListener for F
where
    F: Fn(&MediaPlayer, i32, i32) -> bool + Send + Sync,
{
    fn on_info(&self, mp: &MediaPlayer, what: i32, extra: i32) -> bool {
        self(mp, what, extra)
    }
}

/// One replaceable listener.
///
/// A write is visible to every dispatch that reads the slot afterwards. A
/// dispatch that already took its copy finishes with the previous listener.
pub(crate) struct Slot<T: ?Sized> {
    inner: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> Slot<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    pub fn set(&self, listener: Option<Arc<T>>) {
        *self.inner.write() = listener;
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.inner.read().clone()
    }
}

pub(crate) struct Listeners {
    pub prepared: Slot<dyn OnPreparedListener>,
    pub completion: Slot<dyn OnCompletionListener>,
    pub buffering_update: Slot<dyn OnBufferingUpdateListener>,
    pub seek_complete: Slot<dyn OnSeekCompleteListener>,
    pub video_size_changed: Slot<dyn OnVideoSizeChangedListener>,
    pub error: Slot<dyn OnErrorListener>,
    pub info: Slot<dyn OnInfoListener>,
}

impl Listeners {
    pub fn new() -> Self {
        Self {
            prepared: Slot::new(),
            completion: Slot::new(),
            buffering_update: Slot::new(),
            seek_complete: Slot::new(),
            video_size_changed: Slot::new(),
            error: Slot::new(),
            info: Slot::new(),
        }
    }

    pub fn clear(&self) {
        self.prepared.set(None);
        self.completion.set(None);
        self.buffering_update.set(None);
        self.seek_complete.set(None);
        self.video_size_changed.set(None);
        self.error.set(None);
        self.info.set(None);
    }
}
