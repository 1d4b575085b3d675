//! Shard line parsing.
//!
//! A shard line has the form `term,count,id_1,...,id_count`. Fields are
//! separated by commas with no escaping. Any line whose declared count does
//! not match the number of trailing IDs is corrupted shard data.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShardMergeError};
use crate::shard::{NextLine, ShardCursor, ShardCursorTable};

/// One parsed shard line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// The term.
    pub term: String,

    /// Document IDs in the order they appear on the line.
    pub doc_ids: Vec<String>,
}

/// Parse one raw shard line. `line_no` is 1-based and only used for
/// diagnostics.
pub fn parse_line(shard: &Path, line_no: usize, line: &str) -> Result<ParsedLine> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = line.split(',');

    let term = match fields.next() {
        Some(term) if !term.is_empty() => term,
        _ => return Err(ShardMergeError::format(shard, line_no, "missing term")),
    };

    let count_field = fields.next().ok_or_else(|| {
        ShardMergeError::format(shard, line_no, format!("missing count for term '{term}'"))
    })?;
    let count: usize = count_field.trim().parse().map_err(|_| {
        ShardMergeError::format(
            shard,
            line_no,
            format!("invalid count '{count_field}' for term '{term}'"),
        )
    })?;

    let doc_ids: Vec<String> = fields.map(str::to_string).collect();
    if doc_ids.len() != count {
        return Err(ShardMergeError::format(
            shard,
            line_no,
            format!(
                "term '{term}' declares {count} documents but lists {}",
                doc_ids.len()
            ),
        ));
    }
    if doc_ids.iter().any(String::is_empty) {
        return Err(ShardMergeError::format(
            shard,
            line_no,
            format!("empty document ID for term '{term}'"),
        ));
    }

    Ok(ParsedLine {
        term: term.to_string(),
        doc_ids,
    })
}

/// Totals gathered while checking shards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub shards: usize,
    pub lines: u64,
    pub postings: u64,
}

/// Parse every line of every shard without merging. Stops at the first
/// malformed line or read failure.
pub fn validate_shards(table: &mut ShardCursorTable) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        shards: table.len(),
        ..Default::default()
    };
    for shard in 0..table.len() {
        let path = table
            .shard(shard)
            .map(|s| s.path().to_path_buf())
            .unwrap_or_default();
        loop {
            let line = table.next_line(shard).map_err(|e| {
                let line = match table.shard(shard).map(|s| s.cursor()) {
                    Some(ShardCursor::Next(line)) => line + 1,
                    _ => 0,
                };
                ShardMergeError::shard_read(&path, line, e)
            })?;
            match line {
                NextLine::Line { number, text } => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    let parsed = parse_line(&path, number, &text)?;
                    report.lines += 1;
                    report.postings += parsed.doc_ids.len() as u64;
                }
                NextLine::Eof => {
                    table.mark_exhausted(shard);
                    break;
                }
            }
        }
    }
    Ok(report)
}
