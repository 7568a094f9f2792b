//! Content-addressed cache of clustering output.
//!
//! A run is identified by the text documents it saw (path and content hash)
//! and the parameters it was asked for. Two runs with the same identity
//! produce the same output, so the second can reuse the first.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::assemble::ClusteringOutcome;
use crate::error::DedupResult;
use crate::pipeline::ClusteringRequest;
use crate::projection::Projection;
use crate::record::{ContentHash, FileRecord};

pub type RunKey = String;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedRun {
    pub clustering: Option<ClusteringOutcome>,
    pub projection: Option<Projection>,
}

/// Hex SHA-256 over the bincode encoding of the run identity. Paths enter as
/// raw OS bytes, so names that are not valid UTF-8 still get a key. Document
/// order does not affect the key.
pub fn run_key(
    documents: &[FileRecord],
    clustering: Option<&ClusteringRequest>,
    project: bool,
) -> DedupResult<RunKey> {
    let mut identity: Vec<(&[u8], &ContentHash)> = documents
        .iter()
        .map(|record| (record.path.as_os_str().as_encoded_bytes(), &record.content_hash))
        .collect();
    identity.sort();
    let encoded = bincode::serialize(&(identity, clustering, project))?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}

#[derive(Debug, Default)]
pub struct RunCache {
    entries: Mutex<HashMap<RunKey, CachedRun>>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<CachedRun> {
        let entries = self.entries.lock().ok()?;
        let hit = entries.get(key).cloned();
        debug!("Cache {} for run {}", if hit.is_some() { "hit" } else { "miss" }, key);
        hit
    }

    pub fn insert(&self, key: RunKey, run: CachedRun) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, run);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
