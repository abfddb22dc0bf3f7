//! # rankguard-core
//!
//! Debug-time lock-order verification and diagnostics.
//!
//! This crate does not implement locks; it instruments lock acquire and
//! release events to detect rank-ordering bugs before they manifest as
//! deadlocks, and to produce trustworthy diagnostics when a fatal
//! invariant is violated. It never prevents a deadlock by blocking or
//! reordering — it only detects and reports, and only for locks whose
//! rank was chosen correctly by their creator.
//!
//! Lock types embed a [`LockHeader`] and call
//! [`TrackingContext::acquisition_tracking`] /
//! [`TrackingContext::release_tracking`] around every operation,
//! obtaining the process-wide context once via [`context`]. A legacy
//! lock implementation living in the same process can cooperate through
//! the [`ForeignLockSystem`] hook table.
//!
//! Every detected invariant violation is fatal by design: this layer
//! converts silent corruption and deadlock risk into an immediate,
//! diagnosable abort during development, not an error code to handle at
//! runtime.

#![deny(unsafe_code)]

pub mod context;
pub mod header;
pub mod hooks;
pub mod panic;
pub mod per_thread;
pub mod rank;
pub mod syndrome;
pub mod tracking;
pub mod tree;

pub use context::{TrackingContext, context};
pub use header::{DumpFn, LockHeader, allocate_serial_number, log_dump};
pub use hooks::{ForeignLockRef, ForeignLockSystem};
pub use per_thread::{MAX_LOCKS_PER_THREAD, MAX_RECURSION_DEPTH};
pub use rank::Rank;
pub use syndrome::{ObjectType, SIGNATURE_SYNDROME_MASK, SIGNATURE_TYPE_SHIFT};
pub use tracking::TryAcquireFailureHook;
pub use tree::{LockTreeSink, TreeNodeId};
