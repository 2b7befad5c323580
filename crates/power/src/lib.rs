// Wake lock / keep-screen-on coordination for a playback session
//
// Two independent inputs, "client wants the screen kept on" and "playback
// wants to stay awake", drive the display flag through their conjunction.
// The wake lock follows "stay awake" alone.

use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Power manager wake lock flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WakeMode: u32 {
        const PARTIAL_WAKE_LOCK = 0x0000_0001;
        const SCREEN_DIM_WAKE_LOCK = 0x0000_0006;
        const SCREEN_BRIGHT_WAKE_LOCK = 0x0000_000a;
        const FULL_WAKE_LOCK = 0x0000_001a;
        const ACQUIRE_CAUSES_WAKEUP = 0x1000_0000;
        const ON_AFTER_RELEASE = 0x2000_0000;
    }
}

/// Tag the coordinator attaches to the wake locks it creates
pub const WAKE_LOCK_TAG: &str = "mediaplayer::MediaPlayer";

/// A power-management resource that keeps the device awake while held
pub trait WakeLock: Send {
    fn acquire(&mut self);
    fn release(&mut self);
    fn is_held(&self) -> bool;
    fn set_reference_counted(&mut self, counted: bool);
}

/// Source of wake locks
pub trait PowerManager {
    fn new_wake_lock(&self, mode: WakeMode, tag: &str) -> Box<dyn WakeLock>;
}

/// Display sink with a "keep screen on" flag
pub trait DisplaySurface: Send + Sync {
    fn set_keep_screen_on(&self, keep_on: bool);
}

/// Side-effect coordinator owned by one session
#[derive(Default)]
pub struct StayAwake {
    wake_lock: Option<Box<dyn WakeLock>>,
    surface: Option<Arc<dyn DisplaySurface>>,
    screen_on_while_playing: bool,
    stay_awake: bool,
}

impl StayAwake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the wake lock with one created for `mode`.
    ///
    /// A held lock is handed over: the old one is released and the new one
    /// acquired, so the device never drops out of the awake state.
    pub fn set_wake_mode(&mut self, power: &dyn PowerManager, mode: WakeMode) {
        let mut was_held = false;
        if let Some(mut old) = self.wake_lock.take() {
            if old.is_held() {
                was_held = true;
                old.release();
            }
        }

        let mut lock = power.new_wake_lock(mode | WakeMode::ON_AFTER_RELEASE, WAKE_LOCK_TAG);
        lock.set_reference_counted(false);
        if was_held {
            lock.acquire();
        }
        log::debug!("Wake mode set to {:?} (held: {})", mode, was_held);
        self.wake_lock = Some(lock);
    }

    pub fn set_display(&mut self, surface: Option<Arc<dyn DisplaySurface>>) {
        self.surface = surface;
        self.update_surface_screen_on();
    }

    pub fn set_screen_on_while_playing(&mut self, screen_on: bool) {
        if self.screen_on_while_playing != screen_on {
            self.screen_on_while_playing = screen_on;
            self.update_surface_screen_on();
        }
    }

    pub fn stay_awake(&mut self, awake: bool) {
        if let Some(lock) = self.wake_lock.as_mut() {
            if awake && !lock.is_held() {
                lock.acquire();
            } else if !awake && lock.is_held() {
                lock.release();
            }
        }
        self.stay_awake = awake;
        self.update_surface_screen_on();
    }

    pub fn is_staying_awake(&self) -> bool {
        self.stay_awake
    }

    pub fn keep_screen_on(&self) -> bool {
        self.screen_on_while_playing && self.stay_awake
    }

    pub fn is_wake_lock_held(&self) -> bool {
        self.wake_lock.as_ref().map_or(false, |l| l.is_held())
    }

    /// Drop every side effect and give the wake lock back.
    pub fn release(&mut self) {
        self.stay_awake(false);
        self.wake_lock = None;
    }

    fn update_surface_screen_on(&self) {
        if let Some(surface) = &self.surface {
            surface.set_keep_screen_on(self.keep_screen_on());
        }
    }
}
