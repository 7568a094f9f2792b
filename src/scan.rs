//! Directory walk, content hashing and exact-duplicate filtering.

use memmap2::Mmap;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};
use walkdir::WalkDir;

use crate::config::State;
use crate::error::{DedupError, DedupResult};
use crate::extract::TextExtractor;
use crate::progress::Progress;
use crate::record::{partition_duplicates, Category, ContentHash, Corpus, DuplicateGroup, FileRecord};

#[derive(Debug, Clone)]
pub struct ScanOutput {
    pub corpus: Corpus,
    pub duplicates: Vec<DuplicateGroup>,
    /// Every file under the root, lock files included.
    pub files_found: usize,
    /// Files that were hashed (lock files excluded).
    pub files_analysed: usize,
}

impl ScanOutput {
    pub fn duplicates_found(&self) -> usize {
        self.duplicates.iter().map(|g| g.member_paths.len()).sum()
    }
}

/// Lists every regular file below `root` in a stable, name-sorted order.
pub fn discover_files(root: &Path) -> DedupResult<Vec<PathBuf>> {
    if root.as_os_str().is_empty() {
        return Err(DedupError::MissingRoot);
    }
    if !root.is_dir() {
        return Err(DedupError::RootNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(DedupError::FolderEmpty(root.to_path_buf()));
    }
    info!("Found {} files under {}", files.len(), root.display());
    Ok(files)
}

/// True for editor lock files such as Office's `~$report.docx`.
pub fn is_temp_file(path: &Path, prefix: &str) -> bool {
    !prefix.is_empty()
        && path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with(prefix))
            .unwrap_or(false)
}

pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn categorize(ext: &str, state: &State) -> Category {
    if state.is_text_extension(ext) {
        Category::Text
    } else if state.is_image_extension(ext) {
        Category::Image
    } else {
        Category::Generic
    }
}

enum FileBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileBytes::Mapped(mmap) => &mmap[..],
            FileBytes::Owned(bytes) => &bytes[..],
        }
    }
}

fn read_file(path: &Path, mmap_threshold: u64) -> DedupResult<FileBytes> {
    let unreadable = |source: std::io::Error| DedupError::Unreadable {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(unreadable)?;
    let len = file.metadata().map_err(unreadable)?.len();
    if len > 0 && len >= mmap_threshold {
        // The mapping is read-only and dropped before the run ends.
        let mmap = unsafe { Mmap::map(&file) }.map_err(unreadable)?;
        Ok(FileBytes::Mapped(mmap))
    } else {
        std::fs::read(path).map(FileBytes::Owned).map_err(unreadable)
    }
}

pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    hex::encode(Sha256::digest(bytes))
}

/// Reads, hashes and (for text formats) extracts one file.
pub fn load_record(
    path: &Path,
    state: &State,
    extractor: &dyn TextExtractor,
) -> DedupResult<FileRecord> {
    let ext = extension_of(path);
    let category = categorize(&ext, state);
    let bytes = read_file(path, state.mmap_threshold)?;
    let content_hash = hash_bytes(&bytes);
    let extracted_text = match category {
        Category::Text => Some(extractor.extract(path, &ext, &bytes)?),
        Category::Image | Category::Generic => None,
    };
    trace!("Hashed {} ({:?})", path.display(), category);
    Ok(FileRecord {
        path: path.to_path_buf(),
        content_hash,
        extracted_text,
        category,
    })
}

/// Loads every non-lock file in `files`, in order.
///
/// Any unreadable or unparsable file aborts the load.
pub fn load_records(
    root: &Path,
    files: &[PathBuf],
    state: &State,
    extractor: &dyn TextExtractor,
    progress: &dyn Progress,
) -> DedupResult<Vec<FileRecord>> {
    let candidates: Vec<&PathBuf> = files
        .iter()
        .filter(|p| {
            let temp = is_temp_file(p, &state.temp_prefix);
            if temp {
                debug!("Skipping lock file {}", p.display());
            }
            !temp
        })
        .collect();

    let total = candidates.len();
    let mut records = Vec::with_capacity(total);
    for (i, path) in candidates.into_iter().enumerate() {
        let relative = path.strip_prefix(root).unwrap_or(path);
        progress.report(i + 1, total, &format!("Loading {}", relative.display()));
        records.push(load_record(path, state, extractor)?);
    }
    Ok(records)
}

/// Walks `root`, loads every non-lock file and splits out exact duplicates.
pub fn scan(
    root: &Path,
    state: &State,
    extractor: &dyn TextExtractor,
    progress: &dyn Progress,
) -> DedupResult<ScanOutput> {
    let files = discover_files(root)?;
    let records = load_records(root, &files, state, extractor, progress)?;
    Ok(dedup(files.len(), records))
}

/// Splits loaded records into the working corpus and duplicate groups.
pub fn dedup(files_found: usize, records: Vec<FileRecord>) -> ScanOutput {
    let files_analysed = records.len();
    let (corpus, duplicates) = partition_duplicates(records);
    info!(
        "Analysed {} files: {} duplicate groups, {} text / {} image / {} generic left",
        files_analysed,
        duplicates.len(),
        corpus.text.len(),
        corpus.image.len(),
        corpus.generic.len()
    );

    ScanOutput {
        corpus,
        duplicates,
        files_found,
        files_analysed,
    }
}
