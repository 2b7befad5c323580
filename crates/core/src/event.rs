// Notifications emitted by the engine and the codes they carry

use std::any::Any;
use std::sync::Arc;

pub const MEDIA_NOP: i32 = 0;
pub const MEDIA_PREPARED: i32 = 1;
pub const MEDIA_PLAYBACK_COMPLETE: i32 = 2;
pub const MEDIA_BUFFERING_UPDATE: i32 = 3;
pub const MEDIA_SEEK_COMPLETE: i32 = 4;
pub const MEDIA_SET_VIDEO_SIZE: i32 = 5;
pub const MEDIA_ERROR: i32 = 100;
pub const MEDIA_INFO: i32 = 200;

/// Unspecified player error.
pub const MEDIA_ERROR_UNKNOWN: i32 = 1;
/// The engine died; the session must be released and recreated.
pub const MEDIA_ERROR_SERVER_DIED: i32 = 100;
/// Container is not laid out for progressive playback.
pub const MEDIA_ERROR_NOT_VALID_FOR_PROGRESSIVE_PLAYBACK: i32 = 200;
/// An engine-class operation was issued in a state that does not allow it.
pub const MEDIA_ERROR_INVALID_OPERATION: i32 = -38;

pub const MEDIA_INFO_UNKNOWN: i32 = 1;
/// Decoder cannot keep up with the video track.
pub const MEDIA_INFO_VIDEO_TRACK_LAGGING: i32 = 700;
pub const MEDIA_INFO_BAD_INTERLEAVING: i32 = 800;
/// Live or otherwise unseekable media.
pub const MEDIA_INFO_NOT_SEEKABLE: i32 = 801;

/// Opaque object an engine may attach to a notification
pub type Payload = Arc<dyn Any + Send + Sync>;

/// A decoded engine notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Interface liveness test, never delivered to listeners
    Nop,
    Prepared,
    PlaybackComplete,
    BufferingUpdate { percent: i32 },
    SeekComplete,
    VideoSizeChanged { width: i32, height: i32 },
    Error { what: i32, extra: i32 },
    Info { what: i32, extra: i32 },
}

impl Notification {
    /// Decode the raw `(kind, arg1, arg2)` triple an engine reports.
    /// Unknown kinds yield `None`.
    pub fn from_raw(kind: i32, arg1: i32, arg2: i32) -> Option<Self> {
        let notification = match kind {
            MEDIA_NOP => Notification::Nop,
            MEDIA_PREPARED => Notification::Prepared,
            MEDIA_PLAYBACK_COMPLETE => Notification::PlaybackComplete,
            MEDIA_BUFFERING_UPDATE => Notification::BufferingUpdate { percent: arg1 },
            MEDIA_SEEK_COMPLETE => Notification::SeekComplete,
            MEDIA_SET_VIDEO_SIZE => Notification::VideoSizeChanged {
                width: arg1,
                height: arg2,
            },
            MEDIA_ERROR => Notification::Error {
                what: arg1,
                extra: arg2,
            },
            MEDIA_INFO => Notification::Info {
                what: arg1,
                extra: arg2,
            },
            _ => return None,
        };
        Some(notification)
    }

    /// Encode back into the raw triple.
    pub fn to_raw(self) -> (i32, i32, i32) {
        match self {
            Notification::Nop => (MEDIA_NOP, 0, 0),
            Notification::Prepared => (MEDIA_PREPARED, 0, 0),
            Notification::PlaybackComplete => (MEDIA_PLAYBACK_COMPLETE, 0, 0),
            Notification::BufferingUpdate { percent } => (MEDIA_BUFFERING_UPDATE, percent, 0),
            Notification::SeekComplete => (MEDIA_SEEK_COMPLETE, 0, 0),
            Notification::VideoSizeChanged { width, height } => {
                (MEDIA_SET_VIDEO_SIZE, width, height)
            }
            Notification::Error { what, extra } => (MEDIA_ERROR, what, extra),
            Notification::Info { what, extra } => (MEDIA_INFO, what, extra),
        }
    }
}

/// Inbound notification channel handed to an engine.
///
/// Implementations must be callable from any thread and must never block.
pub trait EventSink: Send + Sync {
    fn notify(&self, kind: i32, arg1: i32, arg2: i32, payload: Option<Payload>);

    /// Typed convenience over [`EventSink::notify`].
    fn post(&self, notification: Notification) {
        let (kind, arg1, arg2) = notification.to_raw();
        self.notify(kind, arg1, arg2, None);
    }
}
