//! Text serialization of the merged index.
//!
//! Each term becomes one line `term,count,id_1,...,id_count`, terms ascending,
//! IDs ascending. The file is written to a temporary sibling and renamed over
//! the target so no other process observes a partial index.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use log::debug;
use tempfile::NamedTempFile;

use crate::error::{Result, ShardMergeError};
use crate::inverted::merged::MergedIndex;

/// Writes a [`MergedIndex`] to its output file.
#[derive(Debug, Clone)]
pub struct IndexWriter {
    path: PathBuf,
}

impl IndexWriter {
    /// Create a writer targeting `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        IndexWriter { path: path.into() }
    }

    /// Serialize the index into any writer.
    pub fn write_to<W: Write>(index: &MergedIndex, out: &mut W) -> io::Result<()> {
        for (term, postings) in index.iter() {
            write!(out, "{},{}", term, postings.len())?;
            for doc_id in postings {
                write!(out, ",{doc_id}")?;
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Write the index to the target path atomically.
    pub fn write(&self, index: &MergedIndex) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let failed = |e: io::Error| ShardMergeError::write(&self.path, e);
        fs::create_dir_all(&dir).map_err(failed)?;

        let tmp = NamedTempFile::new_in(&dir).map_err(failed)?;
        {
            let mut out = BufWriter::new(tmp.as_file());
            Self::write_to(index, &mut out).map_err(failed)?;
            out.flush().map_err(failed)?;
        }
        tmp.as_file().sync_all().map_err(failed)?;
        tmp.persist(&self.path).map_err(|e| failed(e.error))?;

        debug!("Wrote {} terms to {}", index.len(), self.path.display());
        Ok(())
    }
}
