//! CommitId - totally ordered commit identity
//!
//! - Totally orders all committed writes of a collection
//! - No two commits share an identity
//! - Independent of wall-clock time

/// A totally ordered, opaque commit identity.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CommitId(u64);

impl CommitId {
    /// Identity preceding every commit; the bound of a view over an empty
    /// collection.
    pub const ZERO: CommitId = CommitId(0);

    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The identity immediately after this one
    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_id_ordering() {
        let a = CommitId::new(10);
        let b = a.next();
        assert!(a < b);
        assert_eq!(b.value(), 11);
        assert!(CommitId::ZERO < a);
    }
}
