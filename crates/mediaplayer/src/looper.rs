// Single-consumer event loop that owns listener invocation
//
// A looper is bound to one thread. Any thread may post into it through a
// `LooperHandle`; only the owning thread pops and dispatches, strictly in
// arrival order.

use crate::bridge::{self, Envelope};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use mediaplayer_core::{PlayerError, Result};
use once_cell::sync::OnceCell;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

pub(crate) enum Message {
    Notify(Envelope),
    Quit,
}

static NEXT_LOOPER_ID: AtomicU64 = AtomicU64::new(1);
static MAIN_LOOPER: OnceCell<LooperHandle> = OnceCell::new();

thread_local! {
    static CURRENT: RefCell<Option<LooperHandle>> = const { RefCell::new(None) };
}

/// Posting side of a looper. Cheap to clone, usable from any thread.
#[derive(Clone, Debug)]
pub struct LooperHandle {
    id: u64,
    tx: Sender<Message>,
}

impl LooperHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Enqueue without blocking. Returns `false` when the looper is gone.
    pub(crate) fn send(&self, message: Message) -> bool {
        self.tx.send(message).is_ok()
    }

    /// Ask the looper to stop after the messages already queued.
    pub fn quit(&self) {
        if !self.send(Message::Quit) {
            log::debug!("looper {} already gone", self.id);
        }
    }

    /// Number of messages waiting to be dispatched.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

/// Looper installed on the current thread, if any.
pub fn current_looper() -> Option<LooperHandle> {
    CURRENT.with(|c| c.borrow().clone())
}

/// Designate the process-wide default looper. The first call wins.
pub fn set_main_looper(handle: LooperHandle) -> bool {
    let installed = MAIN_LOOPER.set(handle).is_ok();
    if !installed {
        log::debug!("main looper already set, ignoring");
    }
    installed
}

pub fn main_looper() -> Option<LooperHandle> {
    MAIN_LOOPER.get().cloned()
}

/// The consuming side of a looper, pinned to the thread that prepared it.
pub struct Looper {
    handle: LooperHandle,
    rx: Receiver<Message>,
    quit: Cell<bool>,
    // Not Send: dispatch must stay on the owning thread.
    _owner: PhantomData<*const ()>,
}

impl Looper {
    /// Install a looper on the current thread.
    pub fn prepare() -> Result<Looper> {
        if current_looper().is_some() {
            return Err(PlayerError::LooperAlreadyPrepared);
        }
        let (tx, rx) = unbounded();
        let handle = LooperHandle {
            id: NEXT_LOOPER_ID.fetch_add(1, Ordering::Relaxed),
            tx,
        };
        Ok(Self::install(handle, rx))
    }

    fn install(handle: LooperHandle, rx: Receiver<Message>) -> Looper {
        CURRENT.with(|c| *c.borrow_mut() = Some(handle.clone()));
        log::debug!(
            "looper {} prepared on {:?}",
            handle.id,
            thread::current().name().unwrap_or("<unnamed>")
        );
        Looper {
            handle,
            rx,
            quit: Cell::new(false),
            _owner: PhantomData,
        }
    }

    pub fn handle(&self) -> LooperHandle {
        self.handle.clone()
    }

    pub fn has_quit(&self) -> bool {
        self.quit.get()
    }

    /// Dispatch everything currently queued, including messages posted by
    /// the listeners that run. Returns the number of notifications handled.
    pub fn dispatch_pending(&self) -> usize {
        let mut handled = 0;
        while !self.quit.get() {
            match self.rx.try_recv() {
                Ok(message) => handled += self.handle_message(message),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        handled
    }

    /// Wait up to `timeout` for work, then drain the queue.
    pub fn poll(&self, timeout: Duration) -> usize {
        if self.quit.get() {
            return 0;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(message) => self.handle_message(message) + self.dispatch_pending(),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Keep polling until `done` returns true or `timeout` elapses.
    /// Returns whether the condition was met.
    pub fn poll_until(&self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.dispatch_pending();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline || self.quit.get() {
                return done();
            }
            self.poll((deadline - now).min(Duration::from_millis(10)));
        }
    }

    /// Block dispatching until `quit` is requested.
    pub fn run(&self) {
        while !self.quit.get() {
            match self.rx.recv() {
                Ok(message) => {
                    self.handle_message(message);
                }
                Err(_) => break,
            }
        }
        log::debug!("looper {} exited", self.handle.id);
    }

    fn handle_message(&self, message: Message) -> usize {
        match message {
            Message::Notify(envelope) => {
                bridge::dispatch(envelope);
                1
            }
            Message::Quit => {
                self.quit.set(true);
                0
            }
        }
    }
}

impl Drop for Looper {
    fn drop(&mut self) {
        CURRENT.with(|c| {
            let mut current = c.borrow_mut();
            if current.as_ref().map(|h| h.id) == Some(self.handle.id) {
                *current = None;
            }
        });
    }
}

/// A dedicated thread running a looper until quit.
pub struct LooperThread {
    handle: LooperHandle,
    join: Option<thread::JoinHandle<()>>,
}

impl LooperThread {
    pub fn spawn(name: &str) -> std::io::Result<LooperThread> {
        let (tx, rx) = unbounded();
        let handle = LooperHandle {
            id: NEXT_LOOPER_ID.fetch_add(1, Ordering::Relaxed),
            tx,
        };
        let thread_handle = handle.clone();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let looper = Looper::install(thread_handle, rx);
                looper.run();
            })?;
        log::info!("looper thread {:?} started (looper {})", name, handle.id);
        Ok(LooperThread {
            handle,
            join: Some(join),
        })
    }

    pub fn handle(&self) -> LooperHandle {
        self.handle.clone()
    }

    /// Stop the loop after queued messages and wait for the thread.
    pub fn quit(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.handle.quit();
        if let Some(join) = self.join.take() {
            if join.thread().id() == thread::current().id() {
                return;
            }
            if join.join().is_err() {
                log::error!("looper thread {} panicked", self.handle.id);
            }
        }
    }
}

impl Drop for LooperThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
