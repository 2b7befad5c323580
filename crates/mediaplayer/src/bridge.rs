// Event dispatch bridge
// Engine threads post raw notifications through a `Notifier`; the owning
// looper pops them and hands them to the session, resolved by id.

use crate::looper::{LooperHandle, Message};
use crate::player::MediaPlayer;
use crate::registry::{self, SessionId};
use mediaplayer_core::{EventSink, Notification, Payload};
use std::sync::atomic::{AtomicBool, Ordering};

/// A notification on its way to a session
pub(crate) struct Envelope {
    pub session: SessionId,
    /// Session epoch at post time; a reset makes older envelopes stale
    pub epoch: u64,
    pub notification: Notification,
    pub payload: Option<Payload>,
}

/// Enqueue a notification for `session` on `looper`. Never blocks.
pub(crate) fn post(
    looper: Option<&LooperHandle>,
    session: SessionId,
    epoch: u64,
    notification: Notification,
    payload: Option<Payload>,
) {
    let Some(looper) = looper else {
        log::trace!("{}: no looper, dropping {:?}", session, notification);
        return;
    };
    let envelope = Envelope {
        session,
        epoch,
        notification,
        payload,
    };
    if !looper.send(Message::Notify(envelope)) {
        log::debug!(
            "{}: looper {} is gone, dropping {:?}",
            session,
            looper.id(),
            notification
        );
    }
}

/// Runs on the owning looper thread.
pub(crate) fn dispatch(envelope: Envelope) {
    let Some(shared) = registry::lookup(envelope.session) else {
        log::warn!(
            "{} went away with unhandled events ({:?})",
            envelope.session,
            envelope.notification
        );
        return;
    };
    if envelope.payload.is_some() {
        log::trace!("{}: {:?} carries a payload", envelope.session, envelope.notification);
    }
    MediaPlayer::from_shared(shared).handle_notification(envelope.notification, envelope.epoch);
}

/// Inbound sink handed to one engine context.
///
/// Closed when that engine is released, after which posts are dropped before
/// they reach the queue.
pub(crate) struct Notifier {
    session: SessionId,
    epoch: u64,
    looper: Option<LooperHandle>,
    open: AtomicBool,
}

impl Notifier {
    pub fn new(session: SessionId, epoch: u64, looper: Option<LooperHandle>) -> Self {
        Self {
            session,
            epoch,
            looper,
            open: AtomicBool::new(true),
        }
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

impl EventSink for Notifier {
    fn notify(&self, kind: i32, arg1: i32, arg2: i32, payload: Option<Payload>) {
        if !self.open.load(Ordering::Acquire) {
            log::trace!("{}: engine released, dropping kind {}", self.session, kind);
            return;
        }
        match Notification::from_raw(kind, arg1, arg2) {
            Some(notification) => post(
                self.looper.as_ref(),
                self.session,
                self.epoch,
                notification,
                payload,
            ),
            None => log::error!("{}: unknown message type {}", self.session, kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::looper::Looper;

    #[test]
    fn test_closed_notifier_drops_posts() {
        let looper = Looper::prepare().unwrap();
        let notifier = Notifier::new(registry::next_id(), 0, Some(looper.handle()));

        notifier.post(Notification::SeekComplete);
        assert_eq!(looper.handle().pending(), 1);

        notifier.close();
        notifier.post(Notification::SeekComplete);
        assert_eq!(looper.handle().pending(), 1);

        // Session was never registered: popped and discarded.
        assert_eq!(looper.dispatch_pending(), 1);
        assert_eq!(looper.handle().pending(), 0);
    }

    #[test]
    fn test_unknown_kind_never_reaches_the_queue() {
        let looper = Looper::prepare().unwrap();
        let notifier = Notifier::new(registry::next_id(), 0, Some(looper.handle()));
        notifier.notify(7, 0, 0, None);
        notifier.notify(-1, 0, 0, None);
        assert_eq!(looper.handle().pending(), 0);
    }

    #[test]
    fn test_detached_notifier_is_silent() {
        let notifier = Notifier::new(registry::next_id(), 0, None);
        notifier.post(Notification::Prepared);
        post(None, registry::next_id(), 0, Notification::PlaybackComplete, None);
    }
}
