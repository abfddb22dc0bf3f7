//! Acquisition and release tracking.
//!
//! Lock types call [`TrackingContext::acquisition_tracking`] around every
//! acquire and [`TrackingContext::release_tracking`] around every
//! release. Acquisition performs the rank-ordering check against the
//! calling thread's held-lock stack (folding in the foreign system's
//! rank when its hook is installed), records the lock, and feeds the
//! lock tree collector when enabled. Release removes the lock while
//! preserving acquisition order.
//!
//! The ordering check is deliberately first-use-only: a recursive lock
//! is checked exactly once, on entry, matching how a thread naturally
//! re-enters a lock it already holds. An exclusive lock acquired twice
//! gets a second stack entry and immediately dies in the lock's own
//! run-time checking, so no real harm is done.

use std::thread;

use crate::context::TrackingContext;
use crate::header::LockHeader;
use crate::per_thread::{HeaderKey, HeldLock, MAX_LOCKS_PER_THREAD};
use crate::rank::Rank;

/// Fault-injection hook: given a lock's name, decide whether a
/// try-acquire should be forced to report failure. Used in testing to
/// push callers down their failure paths.
pub type TryAcquireFailureHook = fn(name: &str) -> bool;

impl TrackingContext {
    /// Track a lock acquisition by the calling thread.
    ///
    /// When `check_rank` is requested, the lock is ranked, and the
    /// process is not panicking, a first-use acquisition whose rank is
    /// not strictly above everything already held (locally and in the
    /// foreign system) is a rank violation: the full held-lock listing
    /// is warned and the process dies.
    ///
    /// # Panics
    ///
    /// Fatal on a rank violation or on exceeding the per-thread capacity
    /// of [`MAX_LOCKS_PER_THREAD`] held locks.
    pub fn acquisition_tracking(&self, header: &LockHeader, check_rank: bool) {
        let record = self.directory().get_or_create(thread::current().id());

        if record.held().len() >= MAX_LOCKS_PER_THREAD {
            self.dump_and_panic(
                header,
                format!(
                    "acquisition_tracking: thread would exceed {MAX_LOCKS_PER_THREAD} held locks"
                ),
            );
        }

        // Rank checking is abandoned once a panic is in progress; that
        // improves the chances of obtaining a good log and/or core dump.
        if check_rank && header.rank().is_ranked() && !self.in_panic() {
            let (local_max, first_use) = record.held().scan(Some(HeaderKey::of(header)));

            let mut max_rank = local_max;

            if let Some(foreign) = self.foreign_hooks() {
                max_rank = max_rank.max(foreign.max_held_rank());
            }

            if first_use && header.rank() <= max_rank {
                log::warn!(
                    "acquisition_tracking: lock rank violation by thread {}",
                    current_thread_label()
                );
                log::warn!("acquisition_tracking: locks held:");

                if let Some(foreign) = self.foreign_hooks() {
                    foreign.list_held_locks();
                }

                self.list_held_locks();

                self.dump_and_panic(
                    header,
                    format!("acquisition_tracking: rank violation max_rank={max_rank}"),
                );
            }
        }

        if record.held().push(HeldLock::observe(header)).is_err() {
            self.dump_and_panic(
                header,
                format!(
                    "acquisition_tracking: thread would exceed {MAX_LOCKS_PER_THREAD} held locks"
                ),
            );
        }

        self.replay_into_tree(&record);
    }

    /// Track a lock release by the calling thread.
    ///
    /// # Panics
    ///
    /// Fatal when the thread has no tracking record or the lock is not in
    /// its stack: both mean a release without a matching tracked acquire.
    pub fn release_tracking(&self, header: &LockHeader) {
        let thread_id = thread::current().id();

        // acquisition_tracking creates the record; its absence here is a
        // programming error in the caller.
        let Some(record) = self.directory().lookup(thread_id) else {
            self.dump_and_panic(
                header,
                format!("release_tracking: tracking record not found (thread {thread_id:?})"),
            );
        };

        if !record.held().remove(HeaderKey::of(header)) {
            let count = record.held().len();

            self.dump_and_panic(
                header,
                format!("release_tracking: lock not found (thread {thread_id:?}; count {count})"),
            );
        }
    }

    /// Highest rank held by the calling thread, [`Rank::UNRANKED`] when
    /// it holds no tracked locks. Lets cooperating systems fold this
    /// layer's state into their own rank computation.
    #[must_use]
    pub fn current_rank(&self) -> Rank {
        match self.directory().lookup(thread::current().id()) {
            Some(record) => record.held().scan(None).0,
            None => Rank::UNRANKED,
        }
    }

    /// Does the calling thread hold any tracked locks?
    #[must_use]
    pub fn is_current_thread_holding_locks(&self) -> bool {
        self.directory()
            .lookup(thread::current().id())
            .is_some_and(|record| !record.held().is_empty())
    }

    /// List, via warnings, the locks the calling thread has acquired.
    /// Allocates no tracking state when the thread holds nothing.
    pub fn list_held_locks(&self) {
        if let Some(record) = self.directory().lookup(thread::current().id()) {
            for held in record.held().iter() {
                log::warn!(
                    "\tlock {} (serial {}) rank {}",
                    held.name,
                    held.serial_number,
                    held.rank
                );
            }
        }
    }

    /// Install (or clear) the try-acquire fault-injection hook.
    pub fn try_acquire_failure_control(&self, hook: Option<TryAcquireFailureHook>) {
        *self.try_fail.lock() = hook;
    }

    /// Should a try-acquire of the named lock be forced to fail?
    #[must_use]
    pub fn try_acquire_force_fail(&self, name: &str) -> bool {
        match *self.try_fail.lock() {
            Some(hook) => hook(name),
            None => false,
        }
    }
}

fn current_thread_label() -> String {
    let current = thread::current();

    match current.name() {
        Some(name) => name.to_owned(),
        None => format!("{:?}", current.id()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
