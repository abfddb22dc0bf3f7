//! Lock headers.
//!
//! A [`LockHeader`] is embedded in every tracked lock object. The lock
//! type owns it; the tracking core only observes it. Headers carry the
//! lock's display name, its rank, a process-unique serial number, and
//! the syndrome-derived signature used to detect aliased or
//! version-mismatched lock objects.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::context::TrackingContext;
use crate::rank::Rank;
use crate::syndrome::ObjectType;

/// Diagnostic dump routine invoked before any fatal abort involving a
/// header. Lock types install a routine that prints their full state.
pub type DumpFn = fn(&LockHeader);

/// Tracking header embedded in a lock object.
pub struct LockHeader {
    name: Arc<str>,
    rank: Rank,
    serial_number: u32,
    signature: u32,
    /// Sticky: once set, validations of this header short-circuit so a
    /// corrupt header aborts at most once.
    bad_header: AtomicBool,
    dump: DumpFn,
}

impl LockHeader {
    /// Build a header stamped for `ctx`.
    ///
    /// The serial number comes from the process-wide allocator and is
    /// never zero.
    #[must_use]
    pub fn new(
        ctx: &TrackingContext,
        name: &str,
        rank: Rank,
        object_type: ObjectType,
        dump: DumpFn,
    ) -> Self {
        Self {
            name: Arc::from(name),
            rank,
            serial_number: allocate_serial_number(),
            signature: ctx.signature(object_type),
            bad_header: AtomicBool::new(false),
            dump,
        }
    }

    /// Build a header from raw field values.
    ///
    /// For boundaries that receive header state from an untrusted source;
    /// such headers must pass [`TrackingContext::validate_header`] before
    /// being trusted.
    #[must_use]
    pub fn from_parts(
        name: &str,
        rank: Rank,
        serial_number: u32,
        signature: u32,
        dump: DumpFn,
    ) -> Self {
        Self {
            name: Arc::from(name),
            rank,
            serial_number,
            signature,
            bad_header: AtomicBool::new(false),
            dump,
        }
    }

    /// Display name. Not unique.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_shared(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    #[must_use]
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Process-unique serial number; zero means invalid/corrupted.
    #[must_use]
    pub fn serial_number(&self) -> u32 {
        self.serial_number
    }

    #[must_use]
    pub fn signature(&self) -> u32 {
        self.signature
    }

    /// Has this header already failed validation?
    #[must_use]
    pub fn is_bad(&self) -> bool {
        self.bad_header.load(Ordering::Acquire)
    }

    pub(crate) fn mark_bad(&self) {
        self.bad_header.store(true, Ordering::Release);
    }

    /// Invoke the header's diagnostic dump routine.
    pub fn dump(&self) {
        (self.dump)(self);
    }
}

/// Default dump routine: log the header fields at error level.
pub fn log_dump(header: &LockHeader) {
    log::error!(
        "lock {} serial {} rank {} signature {:#x}",
        header.name(),
        header.serial_number(),
        header.rank(),
        header.signature(),
    );
}

/// Allocate a process-unique, nonzero serial number for a new header.
pub fn allocate_serial_number() -> u32 {
    static NEXT_SERIAL: AtomicU32 = AtomicU32::new(1);

    let mut serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);

    // Wraparound only after 2^32 allocations; skip the reserved zero.
    if serial == 0 {
        serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
    }

    serial
}

impl TrackingContext {
    /// Validate a header's integrity before trusting it.
    ///
    /// A signature that does not match this context's signature for
    /// `object_type`, or a zero serial number, marks the header
    /// permanently bad and is fatal. A header already marked bad returns
    /// immediately; there is no need to abort on it repeatedly.
    pub fn validate_header(&self, header: &LockHeader, object_type: ObjectType) {
        if header.is_bad() {
            return;
        }

        let expected = self.signature(object_type);

        if header.signature() != expected {
            header.mark_bad();

            self.dump_and_panic(
                header,
                format!(
                    "validate_header: signature failure! expected {expected:#x} observed {:#x}",
                    header.signature()
                ),
            );
        }

        if header.serial_number() == 0 {
            header.mark_bad();

            self.dump_and_panic(header, "validate_header: invalid serial number".to_owned());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
