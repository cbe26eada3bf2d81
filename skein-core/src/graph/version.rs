//! Build Versions
//!
//! Every completed node carries the build version at which it was last
//! finalized. Versions come from a process-wide monotonically increasing
//! counter owned by the caller, not by any node: the engine only compares
//! them.
//!
//! Version comparison is what turns "a dependency was re-evaluated" into
//! "a dependency actually changed". A dependency that re-completes at the
//! same version it already had is a non-change, and a dependent that
//! re-checks all of its prior dependencies without observing a newer
//! version can be re-stamped clean without recomputing.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonic build version stamp.
///
/// Ordered; strictly-greater means "newer build". `Version::MINIMAL` is the
/// starting point of the clock and is a valid version for the first build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u64);

impl Version {
    /// The lowest version; the clock starts here.
    pub const MINIMAL: Version = Version(0);

    /// Construct a version from a raw counter value.
    pub fn of(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw counter value.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// The next version after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// The process-wide build version counter.
///
/// One clock per graph lifetime. The evaluator reads `current()` to stamp
/// finalized nodes and calls `advance()` once per new build invocation.
#[derive(Debug)]
pub struct VersionClock {
    current: AtomicU64,
}

impl VersionClock {
    /// Create a clock at `Version::MINIMAL`.
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(0),
        }
    }

    /// The version of the build currently in progress.
    pub fn current(&self) -> Version {
        Version(self.current.load(Ordering::Acquire))
    }

    /// Start a new build, returning its version.
    pub fn advance(&self) -> Version {
        Version(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }
}

impl Default for VersionClock {
    fn default() -> Self {
        Self::new()
    }
}
