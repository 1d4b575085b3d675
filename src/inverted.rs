//! Inverted index data structures: posting lists, slots, the merged index and
//! its text writer.

pub mod merged;
pub mod posting;
pub mod writer;

pub use merged::MergedIndex;
pub use posting::{PostingList, Slot};
pub use writer::IndexWriter;
