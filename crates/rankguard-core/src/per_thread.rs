//! Per-thread lock stack store.
//!
//! A process-wide directory maps thread identity to the ordered stack of
//! lock headers that thread currently holds. Records are created lazily
//! on a thread's first tracked acquisition and live for the life of the
//! process: a record whose thread is gone is pooled on a free list and
//! reused for a different thread identity later. The pooling amortizes
//! allocation; it is not correctness-relevant to lock semantics.
//!
//! Only the owning thread mutates its record's contents, so the
//! per-record mutex is uncontended; the narrow free-list lock is the
//! only point where threads can briefly exclude each other.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::header::LockHeader;
use crate::rank::Rank;

/// Maximum supported recursion depth for a single recursive lock.
pub const MAX_RECURSION_DEPTH: usize = 16;

/// Capacity of a thread's held-lock stack.
pub const MAX_LOCKS_PER_THREAD: usize = 2 * MAX_RECURSION_DEPTH;

/// Pointer identity of a tracked header.
///
/// Used for first-use detection and release matching. Never dereferenced,
/// so a stale key is harmless (it can only fail to match).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeaderKey(usize);

impl HeaderKey {
    pub(crate) fn of(header: &LockHeader) -> Self {
        Self(std::ptr::from_ref(header) as usize)
    }
}

/// Observation of one held lock. A snapshot of the externally owned
/// header's fields; the store is never responsible for the header's
/// destruction.
#[derive(Debug, Clone)]
pub(crate) struct HeldLock {
    pub(crate) key: HeaderKey,
    pub(crate) name: Arc<str>,
    pub(crate) serial_number: u32,
    pub(crate) rank: Rank,
}

impl HeldLock {
    pub(crate) fn observe(header: &LockHeader) -> Self {
        Self {
            key: HeaderKey::of(header),
            name: header.name_shared(),
            serial_number: header.serial_number(),
            rank: header.rank(),
        }
    }
}

/// Attempted to push onto a full held-lock stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CapacityExceeded;

/// Fixed-capacity, insertion-ordered stack of held locks. The last
/// element is the most recently acquired lock.
pub(crate) struct HeldStack {
    entries: Vec<HeldLock>,
}

impl HeldStack {
    fn new() -> Self {
        Self {
            entries: Vec::with_capacity(MAX_LOCKS_PER_THREAD),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a held lock, reporting a distinct condition instead of
    /// growing past capacity.
    pub(crate) fn push(&mut self, held: HeldLock) -> Result<(), CapacityExceeded> {
        if self.entries.len() == MAX_LOCKS_PER_THREAD {
            return Err(CapacityExceeded);
        }

        self.entries.push(held);

        Ok(())
    }

    /// Maximum rank held, and whether an acquisition of `probe` would be
    /// that header's first entry into this stack.
    pub(crate) fn scan(&self, probe: Option<HeaderKey>) -> (Rank, bool) {
        let mut max_rank = Rank::UNRANKED;
        let mut first_use = true;

        for held in &self.entries {
            max_rank = max_rank.max(held.rank);

            if probe == Some(held.key) {
                first_use = false;
            }
        }

        (max_rank, first_use)
    }

    /// Remove the first entry matching `key`, shifting later entries
    /// down so acquisition order stays meaningful for diagnostics.
    /// Returns false when no entry matches.
    pub(crate) fn remove(&mut self, key: HeaderKey) -> bool {
        match self.entries.iter().position(|held| held.key == key) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &HeldLock> {
        self.entries.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// One record per thread that has ever acquired a tracked lock.
pub(crate) struct PerThreadRecord {
    held: Mutex<HeldStack>,
}

impl PerThreadRecord {
    fn new() -> Self {
        Self {
            held: Mutex::new(HeldStack::new()),
        }
    }

    /// The thread's held-lock stack. Uncontended in practice: only the
    /// owning thread mutates it.
    pub(crate) fn held(&self) -> MutexGuard<'_, HeldStack> {
        self.held.lock()
    }
}

/// Process-wide directory of per-thread records, with a free-list victim
/// cache in front of fresh allocation.
pub(crate) struct ThreadDirectory {
    threads: RwLock<HashMap<ThreadId, Arc<PerThreadRecord>>>,
    free_list: Mutex<Vec<Arc<PerThreadRecord>>>,
}

impl ThreadDirectory {
    pub(crate) fn new() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            free_list: Mutex::new(Vec::new()),
        }
    }

    /// The record for `thread`, creating one on first use.
    ///
    /// Allocation happens outside the directory lock; an insertion race
    /// is resolved first-writer-wins and the loser's record goes back to
    /// the free list.
    pub(crate) fn get_or_create(&self, thread: ThreadId) -> Arc<PerThreadRecord> {
        if let Some(record) = self.threads.read().get(&thread) {
            return Arc::clone(record);
        }

        let fresh = self.allocate();

        let winner = match self.threads.write().entry(thread) {
            Entry::Occupied(occupied) => {
                let winner = Arc::clone(occupied.get());
                Some(winner)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&fresh));
                None
            }
        };

        match winner {
            Some(winner) => {
                self.recycle(fresh);
                winner
            }
            None => fresh,
        }
    }

    /// Read-only lookup; never allocates, so threads that never take a
    /// tracked lock pay no tracking cost.
    pub(crate) fn lookup(&self, thread: ThreadId) -> Option<Arc<PerThreadRecord>> {
        self.threads.read().get(&thread).map(Arc::clone)
    }

    /// Pool a record whose owning thread is gone (or was never assigned)
    /// for reuse by a different thread identity.
    pub(crate) fn recycle(&self, record: Arc<PerThreadRecord>) {
        record.held().clear();
        self.free_list.lock().push(record);
    }

    /// Recycled record if one is pooled, else a fresh allocation.
    fn allocate(&self) -> Arc<PerThreadRecord> {
        let recycled = self.free_list.lock().pop();

        match recycled {
            Some(record) => {
                record.held().clear();
                record
            }
            None => Arc::new(PerThreadRecord::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::context::TrackingContext;
    use crate::syndrome::ObjectType;

    fn quiet_dump(_: &LockHeader) {}

    fn header(name: &str, rank: Rank) -> LockHeader {
        let ctx = TrackingContext::new();
        LockHeader::new(&ctx, name, rank, ObjectType::new(1), quiet_dump)
    }

    #[test]
    fn push_scan_remove_preserves_order() {
        let a = header("a", Rank(10));
        let b = header("b", Rank(20));
        let c = header("c", Rank(30));

        let mut stack = HeldStack::new();
        stack.push(HeldLock::observe(&a)).unwrap();
        stack.push(HeldLock::observe(&b)).unwrap();
        stack.push(HeldLock::observe(&c)).unwrap();

        let (max_rank, first_use) = stack.scan(Some(HeaderKey::of(&b)));
        assert_eq!(max_rank, Rank(30));
        assert!(!first_use);

        assert!(stack.remove(HeaderKey::of(&b)));
        let order: Vec<&str> = stack.iter().map(|held| &*held.name).collect();
        assert_eq!(order, ["a", "c"]);
    }

    #[test]
    fn scan_reports_first_use_for_unknown_key() {
        let a = header("a", Rank(10));
        let b = header("b", Rank(20));

        let mut stack = HeldStack::new();
        stack.push(HeldLock::observe(&a)).unwrap();

        let (max_rank, first_use) = stack.scan(Some(HeaderKey::of(&b)));
        assert_eq!(max_rank, Rank(10));
        assert!(first_use);
    }

    #[test]
    fn empty_stack_scans_unranked() {
        let stack = HeldStack::new();
        let (max_rank, first_use) = stack.scan(None);
        assert_eq!(max_rank, Rank::UNRANKED);
        assert!(first_use);
        assert!(stack.is_empty());
    }

    #[test]
    fn push_past_capacity_is_reported() {
        let a = header("a", Rank::UNRANKED);
        let mut stack = HeldStack::new();

        for _ in 0..MAX_LOCKS_PER_THREAD {
            stack.push(HeldLock::observe(&a)).unwrap();
        }

        assert_eq!(stack.push(HeldLock::observe(&a)), Err(CapacityExceeded));
        assert_eq!(stack.len(), MAX_LOCKS_PER_THREAD);
    }

    #[test]
    fn remove_of_absent_key_is_reported() {
        let a = header("a", Rank(10));
        let mut stack = HeldStack::new();
        assert!(!stack.remove(HeaderKey::of(&a)));
    }

    #[test]
    fn get_or_create_is_stable_per_thread() {
        let directory = ThreadDirectory::new();
        let tid = thread::current().id();

        let first = directory.get_or_create(tid);
        let second = directory.get_or_create(tid);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn lookup_never_allocates() {
        let directory = ThreadDirectory::new();
        assert!(directory.lookup(thread::current().id()).is_none());
    }

    #[test]
    fn recycled_records_are_reused_clean() {
        let directory = ThreadDirectory::new();
        let a = header("a", Rank(10));

        let record = directory.get_or_create(thread::current().id());
        record.held().push(HeldLock::observe(&a)).unwrap();

        // Simulate the owning thread going away: the record is pooled and
        // handed out clean for the next identity.
        directory.threads.write().clear();
        directory.recycle(record);

        let reused = directory.get_or_create(thread::current().id());
        assert!(reused.held().is_empty());
    }

    #[test]
    fn distinct_threads_get_distinct_records() {
        let directory = Arc::new(ThreadDirectory::new());
        let local = directory.get_or_create(thread::current().id());

        let remote_directory = Arc::clone(&directory);
        let remote = thread::spawn(move || remote_directory.get_or_create(thread::current().id()))
            .join()
            .unwrap();
        assert!(!Arc::ptr_eq(&local, &remote));
        assert_eq!(directory.threads.read().len(), 2);
    }
}
