//! Lock tree collector glue.
//!
//! The tree itself — the structure recording observed acquisition
//! chains for reporting and visualization — lives outside this crate.
//! The core only owns the hooks into it: after every acquisition it
//! replays the calling thread's entire current stack into the sink,
//! root first, so concrete acquisition chains can be reconstructed.
//! Collection is opt-in and only effective in debug-assertion builds.

use std::sync::atomic::Ordering;

use crate::context::TrackingContext;
use crate::per_thread::PerThreadRecord;
use crate::rank::Rank;

/// Identifier for a node in the external lock tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeNodeId(pub u64);

/// Capability interface to the external lock tree structure.
pub trait LockTreeSink: Send + Sync {
    /// Begin a tree mutation. The sink owns its own exclusion; `enter`
    /// and `exit` bracket each replay.
    fn enter(&self);

    /// End a tree mutation.
    fn exit(&self);

    /// Fold one held-lock frame into the tree under `parent`, returning
    /// the node to use as the parent of the next frame.
    fn add(&self, parent: Option<TreeNodeId>, name: &str, serial_number: u32, rank: Rank)
    -> TreeNodeId;
}

impl TrackingContext {
    /// Install the external tree sink. Single-writer-wins: the first
    /// sink installed is kept for the process lifetime.
    pub fn set_tree_sink(&self, sink: &'static dyn LockTreeSink) {
        let _ = self.tree_sink.set(sink);
    }

    /// Enable or disable locking tree data collection. Effective only in
    /// debug-assertion builds; release builds never collect.
    pub fn locking_tree_collection(&self, enabled: bool) {
        self.collect_tree
            .store(cfg!(debug_assertions) && enabled, Ordering::Release);
    }

    /// Is the lock tracking tree available for reporting?
    #[must_use]
    pub fn is_locking_tree_available(&self) -> bool {
        self.collect_tree.load(Ordering::Acquire)
    }

    /// Replay the whole current stack into the sink, threading each
    /// returned node id as the next frame's parent.
    pub(crate) fn replay_into_tree(&self, record: &PerThreadRecord) {
        if !self.is_locking_tree_available() {
            return;
        }

        let Some(sink) = self.tree_sink.get().copied() else {
            return;
        };

        let held = record.held();

        sink.enter();

        let mut parent = None;

        for lock in held.iter() {
            parent = Some(sink.add(parent, &lock.name, lock.serial_number, lock.rank));
        }

        sink.exit();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
