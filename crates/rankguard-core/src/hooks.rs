//! Foreign lock system hooks.
//!
//! An independently implemented lock library living in the same process
//! can register a capability object here so the two systems agree on
//! rank checks and panic state, and so lock types can delegate
//! operations to it. Every capability has an "absent" default; the core
//! treats an absent capability as "skip this check / no delegation".
//!
//! Installation is install-once in substance: the first caller wins, and
//! any later install must supply the identical capability object. Two
//! initializers disagreeing about which foreign system is authoritative
//! is a real configuration bug, so disagreement is fatal rather than
//! silently discarded.

use crate::context::TrackingContext;
use crate::rank::Rank;

/// Opaque handle to a lock record owned by the foreign system.
///
/// The core never inspects the token; it only carries it between the
/// lock types and the installed hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForeignLockRef(usize);

impl ForeignLockRef {
    #[must_use]
    pub const fn new(token: usize) -> Self {
        Self(token)
    }

    #[must_use]
    pub const fn token(self) -> usize {
        self.0
    }
}

/// Capability interface to a foreign lock system.
///
/// Default method bodies mean "capability absent": rank queries report
/// nothing held, predicates report false, delegated operations are
/// no-ops. Implementors override only what their system supports.
pub trait ForeignLockSystem: Send + Sync {
    /// List, via warnings, the locks the calling thread holds in the
    /// foreign system. Diagnostic only.
    fn list_held_locks(&self) {}

    /// Highest rank currently held by the calling thread in the foreign
    /// system; [`Rank::UNRANKED`] when nothing is held.
    fn max_held_rank(&self) -> Rank {
        Rank::UNRANKED
    }

    /// Delegated acquire of a foreign lock.
    fn lock(&self, lock: ForeignLockRef) {
        let _ = lock;
    }

    /// Delegated release of a foreign lock.
    fn unlock(&self, lock: ForeignLockRef) {
        let _ = lock;
    }

    /// Delegated try-acquire of a foreign lock.
    fn try_lock(&self, lock: ForeignLockRef) -> bool {
        let _ = lock;
        false
    }

    /// Is the foreign lock held by the calling thread?
    fn is_locked_by_current_thread(&self, lock: ForeignLockRef) -> bool {
        let _ = lock;
        false
    }

    /// Display name of a foreign lock, when the system can provide one.
    fn name(&self, lock: ForeignLockRef) -> Option<String> {
        let _ = lock;
        None
    }

    /// Bridge a panic notification into the foreign system.
    fn set_in_panic(&self) {}

    /// Does the foreign system believe a panic is in progress?
    fn in_panic(&self) -> bool {
        false
    }
}

impl TrackingContext {
    /// Install the foreign lock system capability object.
    ///
    /// Callable more than once, but every invocation after the first
    /// must pass the identical object.
    ///
    /// # Panics
    ///
    /// Installing a different capability object than the one already
    /// stored is a fatal configuration error.
    pub fn install_foreign_hooks(&self, hooks: &'static dyn ForeignLockSystem) {
        let stored: *const dyn ForeignLockSystem = *self.hooks.get_or_init(|| hooks);
        let offered: *const dyn ForeignLockSystem = hooks;

        assert!(
            std::ptr::addr_eq(stored, offered),
            "install_foreign_hooks: conflicting foreign lock integrations"
        );
    }

    /// The installed foreign system, if any.
    #[must_use]
    pub fn foreign_hooks(&self) -> Option<&'static dyn ForeignLockSystem> {
        self.hooks.get().copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    struct CountingForeign {
        rank_queries: AtomicUsize,
        panicking: AtomicBool,
    }

    impl CountingForeign {
        const fn new() -> Self {
            Self {
                rank_queries: AtomicUsize::new(0),
                panicking: AtomicBool::new(false),
            }
        }
    }

    impl ForeignLockSystem for CountingForeign {
        fn max_held_rank(&self) -> Rank {
            self.rank_queries.fetch_add(1, Ordering::Relaxed);
            Rank(40)
        }

        fn set_in_panic(&self) {
            self.panicking.store(true, Ordering::Relaxed);
        }

        fn in_panic(&self) -> bool {
            self.panicking.load(Ordering::Relaxed)
        }
    }

    struct AbsentForeign;

    impl ForeignLockSystem for AbsentForeign {}

    #[test]
    fn defaults_mean_absent() {
        let foreign = AbsentForeign;
        let lock = ForeignLockRef::new(0x1000);
        assert_eq!(foreign.max_held_rank(), Rank::UNRANKED);
        assert!(!foreign.try_lock(lock));
        assert!(!foreign.is_locked_by_current_thread(lock));
        assert!(foreign.name(lock).is_none());
        assert!(!foreign.in_panic());
        foreign.lock(lock);
        foreign.unlock(lock);
        foreign.list_held_locks();
        foreign.set_in_panic();
    }

    #[test]
    fn reinstall_with_same_object_is_idempotent() {
        let ctx = TrackingContext::new();
        let foreign: &'static CountingForeign = Box::leak(Box::new(CountingForeign::new()));
        ctx.install_foreign_hooks(foreign);
        ctx.install_foreign_hooks(foreign);
        assert_eq!(ctx.foreign_hooks().unwrap().max_held_rank(), Rank(40));
        assert_eq!(foreign.rank_queries.load(Ordering::Relaxed), 1);
    }

    #[test]
    #[should_panic(expected = "conflicting foreign lock integrations")]
    fn reinstall_with_different_object_is_fatal() {
        let ctx = TrackingContext::new();
        let first: &'static CountingForeign = Box::leak(Box::new(CountingForeign::new()));
        let second: &'static CountingForeign = Box::leak(Box::new(CountingForeign::new()));
        ctx.install_foreign_hooks(first);
        ctx.install_foreign_hooks(second);
    }

    #[test]
    fn hooks_absent_until_installed() {
        let ctx = TrackingContext::new();
        assert!(ctx.foreign_hooks().is_none());
    }

    #[test]
    fn foreign_lock_ref_round_trips_token() {
        assert_eq!(ForeignLockRef::new(42).token(), 42);
    }
}
