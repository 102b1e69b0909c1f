//! Process-wide administrative lock.
//!
//! `create`/`acquire` both save and mutate the calling thread's
//! mempolicy for the duration of the mapping dance; two administrative
//! calls racing on the same thread group would stomp each other's saved
//! policy. The original C guards this with a `PTHREAD_RECURSIVE_MUTEX`
//! so a thread already holding the lock (e.g. a caller that wraps
//! `create` in its own locked helper) can re-enter without deadlocking.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

static ADMIN_LOCK: ReentrantMutex<()> = ReentrantMutex::new(());

/// RAII guard holding the administrative lock. Reentrant: the thread
/// that already holds it may acquire it again without blocking.
pub struct AdminGuard {
    _guard: ReentrantMutexGuard<'static, ()>,
}

/// Acquire the administrative lock, blocking until available.
pub fn lock() -> AdminGuard {
    AdminGuard {
        _guard: ADMIN_LOCK.lock(),
    }
}
