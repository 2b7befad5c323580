// Wake lock and screen-on handling around playback transitions

mod common;

use common::{drive_to, fake_source, init_test_logging, session, FakeFactory, FakePower, Recorder};
use mediaplayer::{
    DisplaySurface, Looper, MediaPlayer, Notification, PlaybackState, SessionOptions, WakeMode,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Surface {
    screen_on: AtomicBool,
}

impl DisplaySurface for Surface {
    fn set_keep_screen_on(&self, keep_on: bool) {
        self.screen_on.store(keep_on, Ordering::SeqCst);
    }
}

#[test]
fn test_wake_lock_held_before_engine_starts() {
    let looper = Looper::prepare().unwrap();
    let (mp, rec) = session(&looper);
    let power = FakePower::sharing(&rec);
    mp.set_wake_mode(&power, WakeMode::PARTIAL_WAKE_LOCK);
    drive_to(&mp, &rec, &looper, PlaybackState::Prepared);
    assert!(!mp.is_wake_lock_held());

    mp.start().unwrap();
    assert_eq!(*rec.awake_at_start.lock(), vec![true]);
    assert!(mp.is_wake_lock_held());
    assert!(mp.is_staying_awake());

    mp.pause().unwrap();
    assert!(!mp.is_wake_lock_held());

    mp.start().unwrap();
    mp.stop().unwrap();
    assert!(!mp.is_wake_lock_held());
    assert_eq!(*rec.awake_at_start.lock(), vec![true, true]);
    assert_eq!(
        power.acquired.load(Ordering::SeqCst),
        power.released.load(Ordering::SeqCst)
    );
}

#[test]
fn test_completion_and_error_drop_the_wake_lock() {
    let looper = Looper::prepare().unwrap();
    let (mp, rec) = session(&looper);
    let power = FakePower::sharing(&rec);
    mp.set_wake_mode(&power, WakeMode::PARTIAL_WAKE_LOCK);

    drive_to(&mp, &rec, &looper, PlaybackState::Started);
    assert!(mp.is_wake_lock_held());
    rec.emit(Notification::PlaybackComplete);
    looper.dispatch_pending();
    assert!(!mp.is_wake_lock_held());

    mp.start().unwrap();
    assert!(mp.is_wake_lock_held());
    rec.emit(Notification::Error { what: 100, extra: 0 });
    looper.dispatch_pending();
    assert!(!mp.is_wake_lock_held());
    assert_eq!(mp.state(), PlaybackState::Error);
}

#[test]
fn test_failed_start_drops_the_wake_lock_without_a_looper() {
    init_test_logging();
    let rec = Arc::new(Recorder::default());
    let mp = MediaPlayer::with_options(
        Arc::new(FakeFactory { rec: rec.clone() }),
        SessionOptions::detached(),
    );
    let power = FakePower::sharing(&rec);
    mp.set_wake_mode(&power, WakeMode::PARTIAL_WAKE_LOCK);
    mp.set_data_source(fake_source()).unwrap();
    mp.prepare().unwrap();
    rec.fail_start.store(true, Ordering::SeqCst);

    mp.start().unwrap();

    assert_eq!(mp.state(), PlaybackState::Error);
    assert_eq!(*rec.awake_at_start.lock(), vec![true]);
    assert!(!mp.is_wake_lock_held());
    assert!(!mp.is_staying_awake());
    assert_eq!(power.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(power.released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_release_drops_the_wake_lock_once() {
    let looper = Looper::prepare().unwrap();
    let (mp, rec) = session(&looper);
    let power = FakePower::sharing(&rec);
    mp.set_wake_mode(&power, WakeMode::FULL_WAKE_LOCK | WakeMode::ACQUIRE_CAUSES_WAKEUP);
    drive_to(&mp, &rec, &looper, PlaybackState::Started);

    mp.release();
    mp.release();

    assert!(!power.held.load(Ordering::SeqCst));
    assert_eq!(power.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(power.released.load(Ordering::SeqCst), 1);
}

#[test]
fn test_changing_wake_mode_while_playing_moves_the_lock() {
    let looper = Looper::prepare().unwrap();
    let (mp, rec) = session(&looper);
    let first = FakePower::sharing(&rec);
    mp.set_wake_mode(&first, WakeMode::PARTIAL_WAKE_LOCK);
    drive_to(&mp, &rec, &looper, PlaybackState::Started);

    let second = FakePower::sharing(&rec);
    mp.set_wake_mode(&second, WakeMode::SCREEN_DIM_WAKE_LOCK);

    assert_eq!(first.released.load(Ordering::SeqCst), 1);
    assert_eq!(second.acquired.load(Ordering::SeqCst), 1);
    assert!(mp.is_wake_lock_held());
}

#[test]
fn test_screen_stays_on_only_while_playing() {
    let looper = Looper::prepare().unwrap();
    let (mp, rec) = session(&looper);
    let surface = Arc::new(Surface::default());
    mp.set_display(Some(surface.clone()));
    mp.set_screen_on_while_playing(true);
    assert!(!surface.screen_on.load(Ordering::SeqCst));

    drive_to(&mp, &rec, &looper, PlaybackState::Started);
    assert!(surface.screen_on.load(Ordering::SeqCst));

    mp.pause().unwrap();
    assert!(!surface.screen_on.load(Ordering::SeqCst));

    mp.start().unwrap();
    mp.set_screen_on_while_playing(false);
    assert!(!surface.screen_on.load(Ordering::SeqCst));

    mp.reset().unwrap();
    assert!(!mp.is_staying_awake());
}
