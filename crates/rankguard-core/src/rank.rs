//! Lock rank domain.
//!
//! Every tracked lock carries a rank drawn from one process-wide total
//! order. A thread may only acquire a ranked lock whose rank is strictly
//! greater than every rank it already holds; honoring that order on all
//! threads rules out circular waits. [`Rank::UNRANKED`] exempts a lock
//! from the check entirely.

use std::fmt;

/// Rank assigned to a lock at creation. Higher ranks must be acquired
/// after lower ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rank(pub u32);

impl Rank {
    /// Sentinel rank exempting a lock from ordering checks. Also the
    /// value reported when a thread holds no tracked locks.
    pub const UNRANKED: Rank = Rank(0);

    /// Returns true if this rank participates in ordering checks.
    #[must_use]
    pub const fn is_ranked(self) -> bool {
        self.0 != Self::UNRANKED.0
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
