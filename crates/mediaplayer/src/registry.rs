// Session registry: stable ids to weak session references
// The dispatch side only ever holds a `SessionId`; resolving it here never
// extends a session's lifetime past its owner.

use crate::player::Shared;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

static SESSION_REGISTRY: Lazy<RwLock<HashMap<SessionId, Weak<Shared>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_id() -> SessionId {
    SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
}

pub(crate) fn register(id: SessionId, session: &Arc<Shared>) {
    SESSION_REGISTRY.write().insert(id, Arc::downgrade(session));
}

pub(crate) fn unregister(id: SessionId) {
    SESSION_REGISTRY.write().remove(&id);
}

/// Resolve a live session. `None` once it was released or dropped.
pub(crate) fn lookup(id: SessionId) -> Option<Arc<Shared>> {
    SESSION_REGISTRY.read().get(&id).and_then(Weak::upgrade)
}

/// Whether the registry still routes notifications to `id`.
pub fn is_registered(id: SessionId) -> bool {
    SESSION_REGISTRY.read().contains_key(&id)
}
