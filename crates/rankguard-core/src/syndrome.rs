//! Process syndrome and object signatures.
//!
//! Each loaded copy of this library derives a unique 32-bit syndrome and
//! stamps it into every lock header it creates. A lock created by one
//! copy of the library and handed to another, incompatible copy is then
//! detected at validation time instead of corrupting state silently
//! (aliased locks protect nothing; layout changes corrupt memory).
//!
//! The syndrome is derived from a source external to the program and its
//! libraries (the wall clock) so no code- or data-address scheme can be
//! spoofed by coincidental layout.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Mask selecting the syndrome portion of a signature.
pub const SIGNATURE_SYNDROME_MASK: u32 = 0x0FFF_FFFF;

/// Bit position of the object-type code within a signature.
pub const SIGNATURE_TYPE_SHIFT: u32 = 28;

/// Validated 4-bit object-type code carried in the high nibble of a
/// signature.
///
/// The concrete member list belongs to the lock types built on top of
/// this layer; the core validates codes but assigns no meaning to them.
/// Code 0 is reserved and never assigned, so a zeroed header can never
/// carry a valid signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectType(u8);

impl ObjectType {
    /// Reserved code; constructing an `ObjectType` from it is fatal.
    pub const NEVER_USE_CODE: u8 = 0;

    /// Number of representable object-type codes, reserved one included.
    pub const CODE_SPACE: u8 = 16;

    /// Validate `code` as an object-type code.
    ///
    /// # Panics
    ///
    /// Out-of-range or reserved codes are a fatal programming error.
    #[must_use]
    pub fn new(code: u8) -> Self {
        assert!(
            code < Self::CODE_SPACE && code != Self::NEVER_USE_CODE,
            "invalid object type code {code}"
        );
        Self(code)
    }

    /// The raw 4-bit code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self.0
    }
}

/// Lazily initialized process-syndrome slot.
///
/// The value is computed on first read and published winner-takes-all:
/// if two threads race, one result survives and the loser reads it back.
/// Never zero once initialized.
pub(crate) struct SyndromeSlot(AtomicU32);

impl SyndromeSlot {
    pub(crate) const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// The process syndrome, computing it on first call.
    pub(crate) fn get(&self) -> u32 {
        let mut syndrome = self.0.load(Ordering::Acquire);

        if syndrome == 0 {
            syndrome = Self::raw_source();

            // Protect against a total failure of the source.
            if syndrome == 0 {
                syndrome = 1;
            }

            // Blind publish; if racing, one thread or the other wins and
            // everyone reads back the surviving value.
            let _ = self
                .0
                .compare_exchange(0, syndrome, Ordering::AcqRel, Ordering::Acquire);

            syndrome = self.0.load(Ordering::Acquire);
        }

        debug_assert_ne!(syndrome, 0);

        syndrome
    }

    /// Signature for an object type: the low 28 syndrome bits tagged with
    /// the 4-bit type code in the high nibble.
    pub(crate) fn signature(&self, object_type: ObjectType) -> u32 {
        (self.get() & SIGNATURE_SYNDROME_MASK)
            | (u32::from(object_type.code()) << SIGNATURE_TYPE_SHIFT)
    }

    /// Seconds since the epoch, truncated to 32 bits.
    fn raw_source() -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs() as u32)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
