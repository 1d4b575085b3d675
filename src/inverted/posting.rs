//! Posting lists and slots.
//!
//! A [`PostingList`] is a set of document identifiers. Identifiers are opaque
//! strings and are ordered lexicographically, so `"10"` sorts before `"2"`.
//! A [`Slot`] is one bounded batch of term postings read from a single shard.

use std::collections::BTreeSet;
use std::collections::btree_set;
use std::path::{Path, PathBuf};

use ahash::AHashMap;

/// The set of document IDs associated with a term.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingList {
    doc_ids: BTreeSet<String>,
}

impl PostingList {
    /// Create a new empty posting list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document ID. Returns false if it was already present.
    pub fn insert<S: Into<String>>(&mut self, doc_id: S) -> bool {
        self.doc_ids.insert(doc_id.into())
    }

    /// Union another posting list into this one.
    pub fn union_with(&mut self, other: PostingList) {
        if self.doc_ids.is_empty() {
            self.doc_ids = other.doc_ids;
        } else {
            self.doc_ids.extend(other.doc_ids);
        }
    }

    /// Check whether a document ID is present.
    pub fn contains(&self, doc_id: &str) -> bool {
        self.doc_ids.contains(doc_id)
    }

    /// Number of distinct document IDs.
    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    /// Check if the posting list is empty.
    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Iterate document IDs in ascending lexicographic order.
    pub fn iter(&self) -> btree_set::Iter<'_, String> {
        self.doc_ids.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for PostingList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        PostingList {
            doc_ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PostingList {
    type Item = &'a String;
    type IntoIter = btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.doc_ids.iter()
    }
}

/// One bounded batch of parsed postings from a single pass over one shard.
///
/// Once handed to the slot buffer a slot is never modified again; it moves to
/// the merger by value.
#[derive(Debug, Clone)]
pub struct Slot {
    /// Shard the postings were read from.
    shard: PathBuf,

    /// Term postings collected in this pass.
    terms: AHashMap<String, PostingList>,
}

impl Slot {
    /// Create an empty slot for a shard.
    pub fn new<P: Into<PathBuf>>(shard: P) -> Self {
        Slot {
            shard: shard.into(),
            terms: AHashMap::new(),
        }
    }

    /// Add postings for a term. A term seen twice in the same pass keeps the
    /// union of both occurrences.
    pub fn add_postings<I, S>(&mut self, term: String, doc_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let postings = self.terms.entry(term).or_default();
        for doc_id in doc_ids {
            postings.insert(doc_id);
        }
    }

    /// Check whether the slot holds `capacity` distinct terms.
    pub fn is_full(&self, capacity: usize) -> bool {
        self.terms.len() >= capacity
    }

    /// Shard this slot was read from.
    pub fn shard(&self) -> &Path {
        &self.shard
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Check if the slot is empty.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Borrow the postings of a term.
    pub fn get(&self, term: &str) -> Option<&PostingList> {
        self.terms.get(term)
    }

    /// Iterate over term postings in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PostingList)> {
        self.terms.iter()
    }

    /// Consume the slot, yielding its term postings.
    pub fn into_terms(self) -> impl Iterator<Item = (String, PostingList)> {
        self.terms.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posting_list_dedup_and_order() {
        let mut postings: PostingList = ["d3", "d1", "d2"].into_iter().collect();
        assert!(!postings.insert("d1"));
        assert!(postings.insert("d10"));

        let ids: Vec<&str> = postings.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["d1", "d10", "d2", "d3"]);
    }

    #[test]
    fn test_posting_list_union() {
        let mut left: PostingList = ["d1", "d3"].into_iter().collect();
        let right: PostingList = ["d2", "d3"].into_iter().collect();
        left.union_with(right);

        assert_eq!(left.len(), 3);
        assert!(left.contains("d2"));
    }

    #[test]
    fn test_slot_repeated_term_is_unioned() {
        let mut slot = Slot::new("/shards/a");
        slot.add_postings("apple".to_string(), ["d1", "d3"]);
        slot.add_postings("apple".to_string(), ["d2"]);

        assert_eq!(slot.len(), 1);
        assert_eq!(slot.get("apple").unwrap().len(), 3);
        assert!(slot.is_full(1));
        assert!(!slot.is_full(2));
    }
}
