//! Shard files and their read cursors.
//!
//! The [`ShardCursorTable`] tracks, for every shard, the index of the next
//! unread line or that the shard is exhausted. A cursor only moves forward and
//! never changes again once exhausted. The table is not synchronized itself;
//! the coordinator keeps it behind its lock.
//!
//! Shard files are opened on demand and closed again by the reader of the
//! table, so a run holds one shard file open at a time however many shards
//! it merges.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::Result;

/// Read position of a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardCursor {
    /// Index (0-based) of the next line to read.
    Next(usize),

    /// Every line has been read.
    Exhausted,
}

/// Result of advancing a shard cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextLine {
    /// A line and its 1-based line number.
    Line { number: usize, text: String },

    /// The cursor is past the last line.
    Eof,
}

/// One shard file and its cursor.
///
/// The file is only open between a read and the next [`ShardFile::release`].
/// `offset` is the byte position of the line at `cursor`, so a released or
/// failed reader is reopened with a seek instead of rescanning the file.
pub struct ShardFile {
    path: PathBuf,
    cursor: ShardCursor,
    offset: u64,
    reader: Option<BufReader<File>>,
}

impl std::fmt::Debug for ShardFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardFile")
            .field("path", &self.path)
            .field("cursor", &self.cursor)
            .field("offset", &self.offset)
            .field("open", &self.reader.is_some())
            .finish()
    }
}

impl ShardFile {
    /// Track a shard starting at its first line.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        ShardFile {
            path: path.into(),
            cursor: ShardCursor::Next(0),
            offset: 0,
            reader: None,
        }
    }

    /// Absolute path of the shard.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current cursor.
    pub fn cursor(&self) -> ShardCursor {
        self.cursor
    }

    /// Check if the shard is exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.cursor == ShardCursor::Exhausted
    }

    /// Check if the shard currently holds an open file.
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Close the file. The next read reopens it at the cursor.
    pub fn release(&mut self) {
        self.reader = None;
    }

    fn open(&self) -> io::Result<BufReader<File>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.offset))?;
        Ok(BufReader::new(file))
    }

    fn next_line(&mut self) -> io::Result<NextLine> {
        let line = match self.cursor {
            ShardCursor::Exhausted => return Ok(NextLine::Eof),
            ShardCursor::Next(line) => line,
        };

        if self.reader.is_none() {
            self.reader = Some(self.open()?);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(NextLine::Eof);
        };

        let mut buf = Vec::new();
        let read = match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return Ok(NextLine::Eof),
            Ok(read) => read,
            Err(e) => {
                // Reopen from the unchanged cursor on the next call.
                self.reader = None;
                return Err(e);
            }
        };
        let mut text = match String::from_utf8(buf) {
            Ok(text) => text,
            Err(e) => {
                self.reader = None;
                return Err(io::Error::new(io::ErrorKind::InvalidData, e));
            }
        };
        if text.ends_with('\n') {
            text.pop();
            if text.ends_with('\r') {
                text.pop();
            }
        }

        self.offset += read as u64;
        self.cursor = ShardCursor::Next(line + 1);
        Ok(NextLine::Line {
            number: line + 1,
            text,
        })
    }

    fn mark_exhausted(&mut self) {
        self.cursor = ShardCursor::Exhausted;
        self.reader = None;
    }
}

/// Cursor state for every shard of a run, in a stable enumeration order.
#[derive(Debug, Default)]
pub struct ShardCursorTable {
    shards: Vec<ShardFile>,
}

impl ShardCursorTable {
    /// Build a table from shard paths, keeping their order.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        ShardCursorTable {
            shards: paths.into_iter().map(ShardFile::new).collect(),
        }
    }

    /// Discover the shard files of `dir`.
    ///
    /// Only regular files are taken, as absolute paths sorted by name. `exclude`
    /// names a file to leave out, typically the output when it lives inside
    /// the input directory.
    pub fn discover<P: AsRef<Path>>(dir: P, exclude: Option<&Path>) -> Result<Self> {
        let dir = fs::canonicalize(dir.as_ref())?;
        let exclude = exclude.and_then(absolute_target);

        let mut paths = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if exclude.as_deref() == Some(path.as_path()) {
                debug!("Skipping output file {} in input directory", path.display());
                continue;
            }
            paths.push(path);
        }
        paths.sort();

        debug!("Discovered {} shard files in {}", paths.len(), dir.display());
        Ok(Self::new(paths))
    }

    /// Return the line at the shard's cursor and advance it by one. Returns
    /// [`NextLine::Eof`] without advancing when no line remains. On a read
    /// error the cursor is left unchanged.
    pub fn next_line(&mut self, shard: usize) -> io::Result<NextLine> {
        match self.shards.get_mut(shard) {
            Some(file) => file.next_line(),
            None => Ok(NextLine::Eof),
        }
    }

    /// Close a shard's file until its next read.
    pub fn release(&mut self, shard: usize) {
        if let Some(file) = self.shards.get_mut(shard) {
            file.release();
        }
    }

    /// Number of shards with an open file.
    pub fn open_count(&self) -> usize {
        self.shards.iter().filter(|s| s.is_open()).count()
    }

    /// Mark a shard exhausted. Idempotent.
    pub fn mark_exhausted(&mut self, shard: usize) {
        if let Some(file) = self.shards.get_mut(shard) {
            file.mark_exhausted();
        }
    }

    /// Check whether every shard is exhausted. True for an empty table.
    pub fn all_exhausted(&self) -> bool {
        self.shards.iter().all(ShardFile::is_exhausted)
    }

    /// Check whether one shard is exhausted.
    pub fn is_exhausted(&self, shard: usize) -> bool {
        self.shards
            .get(shard)
            .map(ShardFile::is_exhausted)
            .unwrap_or(true)
    }

    /// Borrow a shard.
    pub fn shard(&self, shard: usize) -> Option<&ShardFile> {
        self.shards.get(shard)
    }

    /// Paths of all shards in enumeration order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.shards.iter().map(|s| s.path.clone()).collect()
    }

    /// Number of shards.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// Check if the table tracks no shards.
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

/// Absolute form of a path that may not exist yet.
fn absolute_target(path: &Path) -> Option<PathBuf> {
    if let Ok(path) = fs::canonicalize(path) {
        return Some(path);
    }
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::canonicalize(parent).ok().map(|p| p.join(name))
}
