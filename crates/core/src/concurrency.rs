//! Optimistic concurrency expectations for row-level compare-and-set.

use crate::error::{DomainError, DomainResult};

/// Version expectation declared by a writer for a row it read.
///
/// Lot quantity updates are read-then-write sequences; a commit carrying an
/// `Exact` expectation is rejected when another writer got there first, which
/// serializes concurrent writers at the row level without pessimistic locks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (useful for idempotent replays, migrations, etc.).
    Any,
    /// Require the row to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
