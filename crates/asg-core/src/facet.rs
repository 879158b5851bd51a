//! Facet sets.
//!
//! A facet is an orthogonal capability a node kind can have (positioned,
//! commentable, named, ...). Kinds carry the union of their own and their
//! base kinds' facets; the visitor is dispatched once per facet.

use serde::{Deserialize, Serialize};

use crate::id::FacetId;

/// Maximum number of facets per schema.
pub const MAX_FACETS: usize = 64;

/// A set of facets stored as a 64-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FacetSet(u64);

impl FacetSet {
    pub const EMPTY: FacetSet = FacetSet(0);

    pub fn insert(&mut self, facet: FacetId) {
        self.0 |= 1u64 << facet.0;
    }

    pub fn contains(&self, facet: FacetId) -> bool {
        facet.0 < 64 && self.0 & (1u64 << facet.0) != 0
    }

    pub fn union(self, other: FacetSet) -> FacetSet {
        FacetSet(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Facets in ascending id order.
    pub fn iter(&self) -> FacetIter {
        FacetIter(self.0)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }
}

impl FromIterator<FacetId> for FacetSet {
    fn from_iter<I: IntoIterator<Item = FacetId>>(iter: I) -> Self {
        let mut set = FacetSet::EMPTY;
        for facet in iter {
            set.insert(facet);
        }
        set
    }
}

/// Ascending iterator over a [`FacetSet`].
#[derive(Debug, Clone)]
pub struct FacetIter(u64);

impl Iterator for FacetIter {
    type Item = FacetId;

    fn next(&mut self) -> Option<FacetId> {
        if self.0 == 0 {
            return None;
        }
        let bit = self.0.trailing_zeros();
        self.0 &= self.0 - 1;
        Some(FacetId(bit as u8))
    }
}

impl DoubleEndedIterator for FacetIter {
    fn next_back(&mut self) -> Option<FacetId> {
        if self.0 == 0 {
            return None;
        }
        let bit = 63 - self.0.leading_zeros();
        self.0 &= !(1u64 << bit);
        Some(FacetId(bit as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_in_ascending_order() {
        let set: FacetSet = [FacetId(5), FacetId(0), FacetId(63)].into_iter().collect();
        let ids: Vec<u8> = set.iter().map(|f| f.0).collect();
        assert_eq!(ids, vec![0, 5, 63]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn reverse_iteration() {
        let set: FacetSet = [FacetId(1), FacetId(2), FacetId(7)].into_iter().collect();
        let ids: Vec<u8> = set.iter().rev().map(|f| f.0).collect();
        assert_eq!(ids, vec![7, 2, 1]);
    }

    #[test]
    fn union_and_contains() {
        let a: FacetSet = [FacetId(1)].into_iter().collect();
        let b: FacetSet = [FacetId(2)].into_iter().collect();
        let u = a.union(b);
        assert!(u.contains(FacetId(1)));
        assert!(u.contains(FacetId(2)));
        assert!(!u.contains(FacetId(3)));
        assert!(FacetSet::EMPTY.is_empty());
    }
}
