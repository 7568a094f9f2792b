//! N-gram term-count vectorizer producing sparse rows.
//!
//! The vocabulary is fitted from scratch on every call; ids are assigned in
//! lexicographic term order so identical corpora produce identical matrices.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::config::{Number, EPSILON};

const TOKEN_PATTERN: &str = r"\b\w\w+\b";

/// Common English function words dropped before topic modeling.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "almost", "also", "although",
    "always", "am", "among", "an", "and", "another", "any", "are", "around", "as", "at", "be",
    "became", "because", "become", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "cannot", "could", "did", "do", "does", "doing", "done", "down", "during",
    "each", "either", "else", "enough", "etc", "even", "ever", "every", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "however", "if", "in", "into", "is", "it", "its", "itself", "just",
    "least", "less", "many", "may", "me", "might", "more", "most", "much", "must", "my",
    "myself", "neither", "never", "no", "nor", "not", "now", "of", "off", "often", "on", "once",
    "one", "only", "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out",
    "over", "own", "per", "perhaps", "please", "rather", "same", "she", "should", "since", "so",
    "some", "still", "such", "than", "that", "the", "their", "theirs", "them", "themselves",
    "then", "there", "therefore", "these", "they", "this", "those", "though", "through", "thus",
    "to", "together", "too", "toward", "under", "until", "up", "upon", "us", "very", "via",
    "was", "we", "well", "were", "what", "whatever", "when", "where", "whether", "which",
    "while", "who", "whoever", "whole", "whom", "whose", "why", "will", "with", "within",
    "without", "would", "yet", "you", "your", "yours", "yourself", "yourselves",
];

fn token_regex() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| Regex::new(TOKEN_PATTERN).expect("token pattern is valid"))
}

/// Sparse row with strictly increasing column indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<Number>,
}

impl SparseVector {
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| v.abs() <= EPSILON)
    }

    pub fn norm(&self) -> Number {
        self.values.iter().map(|v| v * v).sum::<Number>().sqrt()
    }

    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > EPSILON {
            for v in self.values.iter_mut() {
                *v /= norm;
            }
        }
    }

    pub fn normalized(&self) -> Self {
        let mut copy = self.clone();
        copy.normalize();
        copy
    }

    /// Merge-join dot product over the two sorted index lists.
    pub fn dot(&self, other: &SparseVector) -> Number {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Euclidean distance between two rows.
    pub fn distance(&self, other: &SparseVector) -> Number {
        let sq = self.dot(self) + other.dot(other) - 2.0 * self.dot(other);
        sq.max(0.0).sqrt()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparseMatrix {
    pub rows: Vec<SparseVector>,
    pub vocabulary: Vec<String>,
}

impl SparseMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.vocabulary.len()
    }

    /// L2-normalizes every row in place so cosine similarity is a dot product.
    pub fn normalize_rows(&mut self) {
        for row in self.rows.iter_mut() {
            row.normalize();
        }
    }
}

#[derive(Debug, Clone)]
pub struct CountVectorizer {
    pub ngram_range: (usize, usize),
    pub lowercase: bool,
    pub stop_words: Option<HashSet<String>>,
    /// Minimum number of documents a term must appear in.
    pub min_df: usize,
    /// Maximum fraction of documents a term may appear in.
    pub max_df: f64,
    pub max_features: Option<usize>,
}

impl Default for CountVectorizer {
    fn default() -> Self {
        Self {
            ngram_range: (1, 1),
            lowercase: false,
            stop_words: None,
            min_df: 1,
            max_df: 1.0,
            max_features: None,
        }
    }
}

impl CountVectorizer {
    pub fn new(ngram_min: usize, ngram_max: usize, lowercase: bool) -> Self {
        Self {
            ngram_range: (ngram_min, ngram_max),
            lowercase,
            ..Self::default()
        }
    }

    pub fn with_stop_words(mut self, words: &[&str]) -> Self {
        self.stop_words = Some(words.iter().map(|w| w.to_string()).collect());
        self
    }

    pub fn with_document_frequency(mut self, min_df: usize, max_df: f64) -> Self {
        self.min_df = min_df;
        self.max_df = max_df;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        token_regex()
            .find_iter(text)
            .map(|m| {
                if self.lowercase {
                    m.as_str().to_lowercase()
                } else {
                    m.as_str().to_string()
                }
            })
            .filter(|t| match &self.stop_words {
                Some(stop) => !stop.contains(t),
                None => true,
            })
            .collect()
    }

    fn ngram_counts(&self, text: &str) -> HashMap<String, u32> {
        let tokens = self.tokenize(text);
        let (min_n, max_n) = self.ngram_range;
        let mut counts = HashMap::new();
        for n in min_n.max(1)..=max_n {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                *counts.entry(window.join(" ")).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Builds the vocabulary from `documents` and returns one count row per document.
    pub fn fit_transform<S: AsRef<str>>(&self, documents: &[S]) -> SparseMatrix {
        let per_doc: Vec<HashMap<String, u32>> = documents
            .iter()
            .map(|d| self.ngram_counts(d.as_ref()))
            .collect();

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        let mut total_freq: HashMap<&str, u64> = HashMap::new();
        for counts in &per_doc {
            for (term, &count) in counts {
                *doc_freq.entry(term.as_str()).or_insert(0) += 1;
                *total_freq.entry(term.as_str()).or_insert(0) += count as u64;
            }
        }

        let max_doc_count = self.max_df * documents.len() as f64;
        let mut kept: Vec<&str> = doc_freq
            .iter()
            .filter(|&(_, &df)| df >= self.min_df && df as f64 <= max_doc_count)
            .map(|(&term, _)| term)
            .collect();

        if let Some(limit) = self.max_features {
            if kept.len() > limit {
                kept.sort_by(|a, b| total_freq[b].cmp(&total_freq[a]).then_with(|| a.cmp(b)));
                kept.truncate(limit);
            }
        }
        kept.sort_unstable();

        let ids: HashMap<&str, u32> = kept
            .iter()
            .enumerate()
            .map(|(i, &term)| (term, i as u32))
            .collect();

        let rows = per_doc
            .iter()
            .map(|counts| {
                let mut entries: Vec<(u32, Number)> = counts
                    .iter()
                    .filter_map(|(term, &count)| ids.get(term.as_str()).map(|&id| (id, count as Number)))
                    .collect();
                entries.sort_unstable_by_key(|&(id, _)| id);
                let (indices, values) = entries.into_iter().unzip();
                SparseVector { indices, values }
            })
            .collect();

        tracing::debug!(
            "Vectorized {} documents into {} features",
            documents.len(),
            kept.len()
        );

        SparseMatrix {
            rows,
            vocabulary: kept.into_iter().map(str::to_string).collect(),
        }
    }
}
