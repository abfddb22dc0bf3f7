//! Panic coordination.
//!
//! Once a panic is in progress, producing a clean diagnostic matters
//! more than catching further ordering bugs, so the panic flag is a
//! monotone one-way transition and rank enforcement is suppressed
//! process-wide while it is set. A bounded re-entry counter keeps the
//! fatal-diagnostic path from looping forever when dumping diagnostics
//! itself re-enters the panic path.

use std::sync::atomic::Ordering;

use crate::context::TrackingContext;
use crate::header::LockHeader;

/// Re-entries into [`TrackingContext::dump_and_panic`] tolerated before
/// the coordinator forces global panic state.
const MAX_DUMP_ATTEMPTS: u32 = 5;

impl TrackingContext {
    /// Notify the tracking layer that a panic is occurring. Bridged into
    /// the foreign system when its hook is installed. Never reset.
    pub fn set_in_panic(&self) {
        self.in_panic.store(true, Ordering::Release);

        if let Some(foreign) = self.foreign_hooks() {
            foreign.set_in_panic();
        }
    }

    /// Is the process in the midst of a panic, by either this layer's
    /// flag or the foreign system's report?
    #[must_use]
    pub fn in_panic(&self) -> bool {
        self.in_panic.load(Ordering::Acquire)
            || self.foreign_hooks().is_some_and(|foreign| foreign.in_panic())
    }

    /// Dump a lock's diagnostics, log `message`, and die.
    ///
    /// Re-entering here more than [`MAX_DUMP_ATTEMPTS`] times means the
    /// panic path is looping through the tracking layer with no progress;
    /// force panic mode first so nested failures stop re-running the rank
    /// and consistency logic and simply terminate.
    pub fn dump_and_panic(&self, header: &LockHeader, message: String) -> ! {
        if self.dump_attempts.fetch_add(1, Ordering::AcqRel) >= MAX_DUMP_ATTEMPTS {
            self.set_in_panic();
        }

        header.dump();

        log::error!("{message}");

        panic!("{message}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::hooks::ForeignLockSystem;
    use crate::rank::Rank;
    use crate::syndrome::ObjectType;

    fn quiet_dump(_: &LockHeader) {}

    struct PanicBridge {
        panicking: AtomicBool,
    }

    impl ForeignLockSystem for PanicBridge {
        fn set_in_panic(&self) {
            self.panicking.store(true, Ordering::Relaxed);
        }

        fn in_panic(&self) -> bool {
            self.panicking.load(Ordering::Relaxed)
        }
    }

    #[test]
    fn panic_flag_is_monotone() {
        let ctx = TrackingContext::new();
        assert!(!ctx.in_panic());
        ctx.set_in_panic();
        assert!(ctx.in_panic());
        ctx.set_in_panic();
        assert!(ctx.in_panic());
    }

    #[test]
    fn set_in_panic_notifies_foreign_system() {
        let ctx = TrackingContext::new();
        let bridge: &'static PanicBridge = Box::leak(Box::new(PanicBridge {
            panicking: AtomicBool::new(false),
        }));
        ctx.install_foreign_hooks(bridge);

        ctx.set_in_panic();
        assert!(bridge.panicking.load(Ordering::Relaxed));
    }

    #[test]
    fn foreign_panic_report_is_folded_in() {
        let ctx = TrackingContext::new();
        let bridge: &'static PanicBridge = Box::leak(Box::new(PanicBridge {
            panicking: AtomicBool::new(false),
        }));
        ctx.install_foreign_hooks(bridge);

        assert!(!ctx.in_panic());
        bridge.panicking.store(true, Ordering::Relaxed);
        assert!(ctx.in_panic());
    }

    #[test]
    fn dump_and_panic_is_fatal_and_dumps() {
        static DUMPED: AtomicBool = AtomicBool::new(false);

        fn remember_dump(_: &LockHeader) {
            DUMPED.store(true, Ordering::Relaxed);
        }

        let ctx = TrackingContext::new();
        let header = LockHeader::new(&ctx, "m", Rank(1), ObjectType::new(1), remember_dump);

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            ctx.dump_and_panic(&header, "boom".to_owned())
        }));
        assert!(outcome.is_err());
        assert!(DUMPED.load(Ordering::Relaxed));
    }

    #[test]
    fn looping_dump_path_escalates_to_panic_mode() {
        let ctx = TrackingContext::new();
        let header = LockHeader::new(&ctx, "m", Rank(1), ObjectType::new(1), quiet_dump);

        for _ in 0..MAX_DUMP_ATTEMPTS {
            let _ = catch_unwind(AssertUnwindSafe(|| {
                ctx.dump_and_panic(&header, "loop".to_owned())
            }));
            assert!(!ctx.in_panic());
        }

        // One past the bound: the coordinator stops being clever.
        let _ = catch_unwind(AssertUnwindSafe(|| {
            ctx.dump_and_panic(&header, "loop".to_owned())
        }));
        assert!(ctx.in_panic());
    }
}
