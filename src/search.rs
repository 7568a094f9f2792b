//! Literal text search with context excerpts.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{DedupError, DedupResult};
use crate::record::FileRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub whole_word: bool,
    /// Characters of context kept on each side of a match.
    pub radius: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            whole_word: true,
            radius: 500,
        }
    }
}

/// A window of the source text around one or more matches.
/// All positions are counted in characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Excerpt {
    pub text: String,
    /// Character range of the excerpt within the document.
    pub start: usize,
    pub end: usize,
    /// Match spans relative to `text`.
    pub highlights: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMatches {
    pub path: PathBuf,
    pub excerpts: Vec<Excerpt>,
}

pub fn build_pattern(query: &str, options: &SearchOptions) -> DedupResult<Regex> {
    if query.is_empty() {
        return Err(DedupError::invalid("query", "\"\"", "must not be empty"));
    }
    let escaped = regex::escape(query);
    let mut pattern = if options.whole_word {
        format!(r"\b{}\b", escaped)
    } else {
        escaped
    };
    if !options.case_sensitive {
        pattern.insert_str(0, "(?i)");
    }
    Regex::new(&pattern).map_err(|e| DedupError::invalid("query", query, e.to_string()))
}

/// Excerpts around every match in `text`. A match starting inside the previous
/// excerpt does not open a new one, and a new excerpt never reaches back past
/// the end of the previous one, so excerpts never overlap.
pub fn find_occurrences(text: &str, pattern: &Regex, radius: usize) -> Vec<Excerpt> {
    // Byte offset of every char start, plus the end of the text.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_at = |byte: usize| boundaries.partition_point(|&b| b < byte);
    let char_count = boundaries.len() - 1;

    let matches: Vec<(usize, usize)> = pattern
        .find_iter(text)
        .map(|m| (char_at(m.start()), char_at(m.end())))
        .collect();

    let mut excerpts = Vec::new();
    let mut last_end = 0;
    let mut first = true;
    for &(match_start, match_end) in &matches {
        if !first && match_start < last_end {
            continue;
        }
        first = false;
        let start = match_start.saturating_sub(radius).max(last_end);
        let end = (match_end + radius).min(char_count);
        last_end = end;

        // Matches cut by the excerpt edge are highlighted up to the edge.
        let highlights = matches
            .iter()
            .filter(|&&(s, e)| s < end && e > start)
            .map(|&(s, e)| (s.max(start) - start, e.min(end) - start))
            .collect();
        excerpts.push(Excerpt {
            text: text[boundaries[start]..boundaries[end]].to_string(),
            start,
            end,
            highlights,
        });
    }
    excerpts
}

/// Searches every text record and returns the documents with at least one match.
pub fn search_documents(
    records: &[FileRecord],
    query: &str,
    options: &SearchOptions,
) -> DedupResult<Vec<DocumentMatches>> {
    let pattern = build_pattern(query, options)?;
    Ok(records
        .iter()
        .filter_map(|record| {
            let excerpts = find_occurrences(record.text(), &pattern, options.radius);
            (!excerpts.is_empty()).then(|| DocumentMatches {
                path: record.path.clone(),
                excerpts,
            })
        })
        .collect())
}
