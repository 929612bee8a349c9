//! Optimistic concurrency expectations for stored records.

/// Version a writer expects a stored record to be at when it commits.
///
/// Stores assign version `0` to records that do not exist, and bump the
/// version by one on every committed write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// The record must not exist yet.
    Absent,
    /// Require the record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    /// Expectation matching an observed version (`0` meaning absent).
    pub fn observed(version: u64) -> Self {
        if version == 0 {
            ExpectedVersion::Absent
        } else {
            ExpectedVersion::Exact(version)
        }
    }

    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Absent => actual == 0,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    /// Describe a failed check, or `None` if `actual` satisfies the expectation.
    pub fn mismatch(self, actual: u64) -> Option<String> {
        if self.matches(actual) {
            None
        } else {
            Some(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_zero_means_absent() {
        assert_eq!(ExpectedVersion::observed(0), ExpectedVersion::Absent);
        assert!(ExpectedVersion::observed(0).matches(0));
        assert!(!ExpectedVersion::observed(0).matches(1));
    }

    #[test]
    fn exact_reports_mismatch() {
        assert!(ExpectedVersion::Exact(3).mismatch(3).is_none());
        let msg = ExpectedVersion::Exact(3).mismatch(4).unwrap();
        assert!(msg.contains("actual: 4"));
        assert!(ExpectedVersion::Any.mismatch(99).is_none());
    }
}
