use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

/// Hex-encoded SHA-256 of a file's raw bytes.
pub type ContentHash = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Text,
    Image,
    Generic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub content_hash: ContentHash,
    /// `None` for image and generic files; possibly empty for text files.
    pub extracted_text: Option<String>,
    pub category: Category,
}

impl FileRecord {
    pub fn text(&self) -> &str {
        self.extracted_text.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub content_hash: ContentHash,
    pub category: Category,
    pub member_paths: Vec<PathBuf>,
}

/// Records left after exact duplicates were pulled out, split by category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    pub text: Vec<FileRecord>,
    pub image: Vec<FileRecord>,
    pub generic: Vec<FileRecord>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.text.len() + self.image.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.text.iter().chain(self.image.iter()).chain(self.generic.iter())
    }

    pub fn push(&mut self, record: FileRecord) {
        match record.category {
            Category::Text => self.text.push(record),
            Category::Image => self.image.push(record),
            Category::Generic => self.generic.push(record),
        }
    }
}

/// Splits records into a working corpus and duplicate groups.
///
/// Grouping happens per category. Every member of a duplicate group leaves the
/// working corpus; no representative is kept. Input order is preserved both for
/// the corpus and for the members of each group.
pub fn partition_duplicates(records: Vec<FileRecord>) -> (Corpus, Vec<DuplicateGroup>) {
    let mut counts: BTreeMap<(Category, &str), usize> = BTreeMap::new();
    for record in &records {
        *counts
            .entry((record.category, record.content_hash.as_str()))
            .or_insert(0) += 1;
    }
    let duplicated: HashSet<(Category, String)> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((category, hash), _)| (category, hash.to_string()))
        .collect();

    let mut corpus = Corpus::default();
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut group_index: HashMap<(Category, String), usize> = HashMap::new();
    for record in records {
        let key = (record.category, record.content_hash.clone());
        if !duplicated.contains(&key) {
            corpus.push(record);
            continue;
        }
        match group_index.get(&key) {
            Some(&i) => groups[i].member_paths.push(record.path),
            None => {
                group_index.insert(key, groups.len());
                groups.push(DuplicateGroup {
                    content_hash: record.content_hash,
                    category: record.category,
                    member_paths: vec![record.path],
                });
            }
        }
    }

    (corpus, groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn record(path: &str, hash: &str, category: Category) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            content_hash: hash.to_string(),
            extracted_text: None,
            category,
        }
    }

    #[test]
    fn duplicates_are_removed_entirely() {
        let records = vec![
            record("a.txt", "h1", Category::Text),
            record("b.txt", "h1", Category::Text),
            record("c.txt", "h2", Category::Text),
            record("d.txt", "h1", Category::Text),
        ];
        let (corpus, groups) = partition_duplicates(records);
        assert_eq!(corpus.text.len(), 1);
        assert_eq!(corpus.text[0].path, PathBuf::from("c.txt"));
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].member_paths,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b.txt"),
                PathBuf::from("d.txt")
            ]
        );
    }

    #[test]
    fn interleaved_groups_keep_first_seen_order() {
        let records = vec![
            record("a1", "h1", Category::Text),
            record("b1", "h2", Category::Text),
            record("a2", "h1", Category::Text),
            record("c1", "h3", Category::Image),
            record("b2", "h2", Category::Text),
            record("c2", "h3", Category::Image),
        ];
        let (corpus, groups) = partition_duplicates(records);
        assert!(corpus.is_empty());
        let summary: Vec<(&str, usize)> = groups
            .iter()
            .map(|g| (g.content_hash.as_str(), g.member_paths.len()))
            .collect();
        assert_eq!(summary, vec![("h1", 2), ("h2", 2), ("h3", 2)]);
        assert_eq!(groups[1].member_paths, vec![PathBuf::from("b1"), PathBuf::from("b2")]);
    }

    #[test]
    fn same_hash_in_different_categories_is_not_grouped() {
        let records = vec![
            record("a.png", "h1", Category::Image),
            record("a.bin", "h1", Category::Generic),
        ];
        let (corpus, groups) = partition_duplicates(records);
        assert!(groups.is_empty());
        assert_eq!(corpus.len(), 2);
    }

    #[test]
    fn union_of_corpus_and_groups_is_the_input() {
        let records = vec![
            record("1", "x", Category::Text),
            record("2", "y", Category::Generic),
            record("3", "x", Category::Text),
            record("4", "z", Category::Image),
            record("5", "y", Category::Generic),
            record("6", "w", Category::Text),
        ];
        let inputs: HashSet<PathBuf> = records.iter().map(|r| r.path.clone()).collect();
        let (corpus, groups) = partition_duplicates(records);

        let mut seen_hashes = HashSet::new();
        for r in corpus.records() {
            assert!(seen_hashes.insert((r.category, r.content_hash.clone())));
        }
        let mut outputs: HashSet<PathBuf> = corpus.records().map(|r| r.path.clone()).collect();
        for group in &groups {
            assert!(group.member_paths.len() >= 2);
            outputs.extend(group.member_paths.iter().cloned());
        }
        assert_eq!(inputs, outputs);
    }
}
