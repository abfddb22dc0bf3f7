//! Process lock-tracking context.
//!
//! All ambient state of the tracking layer — syndrome, foreign hook
//! table, thread directory, tree-collection controls, panic state — is
//! owned by one [`TrackingContext`] rather than scattered globals. The
//! process uses a single lazily initialized instance ([`context`]);
//! tests construct private instances so fatal-path tests cannot leak
//! panic state into each other.
//!
//! Thread-safety contract: data slots (syndrome, tree sink) follow
//! single-writer-wins; configuration that must not disagree (the foreign
//! hook table) asserts agreement instead. The panic flag is a monotone
//! one-way transition.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU32};

use parking_lot::Mutex;

use crate::hooks::ForeignLockSystem;
use crate::per_thread::ThreadDirectory;
use crate::syndrome::{ObjectType, SyndromeSlot};
use crate::tracking::TryAcquireFailureHook;
use crate::tree::LockTreeSink;

/// Ambient state for one instance of the tracking layer.
pub struct TrackingContext {
    pub(crate) syndrome: SyndromeSlot,
    pub(crate) hooks: OnceLock<&'static dyn ForeignLockSystem>,
    pub(crate) tree_sink: OnceLock<&'static dyn LockTreeSink>,
    pub(crate) collect_tree: AtomicBool,
    pub(crate) try_fail: Mutex<Option<TryAcquireFailureHook>>,
    pub(crate) directory: ThreadDirectory,
    pub(crate) in_panic: AtomicBool,
    pub(crate) dump_attempts: AtomicU32,
}

impl TrackingContext {
    /// Create an empty context. The syndrome is computed lazily on first
    /// use, not here.
    #[must_use]
    pub fn new() -> Self {
        Self {
            syndrome: SyndromeSlot::new(),
            hooks: OnceLock::new(),
            tree_sink: OnceLock::new(),
            collect_tree: AtomicBool::new(false),
            try_fail: Mutex::new(None),
            directory: ThreadDirectory::new(),
            in_panic: AtomicBool::new(false),
            dump_attempts: AtomicU32::new(0),
        }
    }

    /// The process syndrome for this context. Nonzero.
    #[must_use]
    pub fn syndrome(&self) -> u32 {
        self.syndrome.get()
    }

    /// The type-tagged signature for `object_type`.
    #[must_use]
    pub fn signature(&self, object_type: ObjectType) -> u32 {
        self.syndrome.signature(object_type)
    }

    pub(crate) fn directory(&self) -> &ThreadDirectory {
        &self.directory
    }
}

impl Default for TrackingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide tracking context, initialized lazily on first use.
pub fn context() -> &'static TrackingContext {
    static CONTEXT: OnceLock<TrackingContext> = OnceLock::new();

    CONTEXT.get_or_init(TrackingContext::new)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
