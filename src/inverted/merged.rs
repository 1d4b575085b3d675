//! The cumulative merged index owned by the merger.

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::inverted::posting::{PostingList, Slot};

/// Mapping from term to the union of every posting folded so far.
///
/// Terms iterate in ascending lexicographic order, posting lists in ascending
/// lexicographic order of document ID. Folding is a set union, so folding the
/// same slot twice leaves the index unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedIndex {
    terms: BTreeMap<String, PostingList>,
}

impl MergedIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a slot into the index by value.
    pub fn fold(&mut self, slot: Slot) {
        for (term, postings) in slot.into_terms() {
            self.merge_postings(term, postings);
        }
    }

    /// Fold a slot without consuming it.
    pub fn fold_ref(&mut self, slot: &Slot) {
        for (term, postings) in slot.iter() {
            self.merge_postings(term.clone(), postings.clone());
        }
    }

    /// Union postings into the entry for `term`.
    pub fn merge_postings(&mut self, term: String, postings: PostingList) {
        match self.terms.entry(term) {
            btree_map::Entry::Occupied(mut entry) => entry.get_mut().union_with(postings),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(postings);
            }
        }
    }

    /// Borrow the postings of a term.
    pub fn get(&self, term: &str) -> Option<&PostingList> {
        self.terms.get(term)
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Total postings across all terms.
    pub fn total_postings(&self) -> usize {
        self.terms.values().map(PostingList::len).sum()
    }

    /// Iterate terms in ascending order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, PostingList> {
        self.terms.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(shard: &str, entries: &[(&str, &[&str])]) -> Slot {
        let mut slot = Slot::new(shard);
        for (term, ids) in entries {
            slot.add_postings(term.to_string(), ids.iter().copied());
        }
        slot
    }

    #[test]
    fn test_fold_unions_across_slots() {
        let mut index = MergedIndex::new();
        index.fold(slot("a", &[("apple", &["d1", "d3"]), ("cherry", &["d5"])]));
        index.fold(slot("b", &[("apple", &["d2", "d3"]), ("banana", &["d4"])]));

        let apple: Vec<&str> = index
            .get("apple")
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(apple, vec!["d1", "d2", "d3"]);

        let terms: Vec<&str> = index.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(terms, vec!["apple", "banana", "cherry"]);
        assert_eq!(index.total_postings(), 5);
    }

    #[test]
    fn test_fold_is_idempotent() {
        let batch = slot("a", &[("apple", &["d1", "d3"]), ("kiwi", &["d9"])]);

        let mut once = MergedIndex::new();
        once.fold_ref(&batch);

        let mut twice = MergedIndex::new();
        twice.fold_ref(&batch);
        twice.fold(batch);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_fold_is_commutative() {
        let a = slot("a", &[("apple", &["d1"]), ("pear", &["d7"])]);
        let b = slot("b", &[("apple", &["d2"])]);

        let mut forward = MergedIndex::new();
        forward.fold_ref(&a);
        forward.fold_ref(&b);

        let mut backward = MergedIndex::new();
        backward.fold(b);
        backward.fold(a);

        assert_eq!(forward, backward);
    }

    #[test]
    fn test_empty_slot_is_noop() {
        let mut index = MergedIndex::new();
        index.fold(Slot::new("exhausted"));
        assert!(index.is_empty());
    }
}
