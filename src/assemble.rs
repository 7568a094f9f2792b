//! Joins cluster assignments, scores and paths into reportable structures.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::similarity::ClusterSimilarity;
use crate::topic::{TopicAssignment, TopicModel};
use crate::vectorizer::{SparseMatrix, SparseVector};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSimilarityRecord {
    pub path: PathBuf,
    pub cluster_label: i32,
    pub average_similarity: f64,
    pub local_average_similarity: f64,
    #[serde(skip)]
    pub feature_vector: SparseVector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMember {
    pub path: PathBuf,
    pub local_average_similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityCluster {
    pub cluster_id: i32,
    pub average_similarity: f64,
    pub members: Vec<ClusterMember>,
}

/// Flat per-document records, most similar first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityReport {
    pub records: Vec<DocumentSimilarityRecord>,
}

impl SimilarityReport {
    /// Records regrouped by cluster, keeping the record order.
    pub fn clusters(&self) -> Vec<SimilarityCluster> {
        let mut clusters: Vec<SimilarityCluster> = Vec::new();
        let mut index: HashMap<i32, usize> = HashMap::new();
        for record in &self.records {
            let member = ClusterMember {
                path: record.path.clone(),
                local_average_similarity: record.local_average_similarity,
            };
            match index.get(&record.cluster_label) {
                Some(&i) => clusters[i].members.push(member),
                None => {
                    index.insert(record.cluster_label, clusters.len());
                    clusters.push(SimilarityCluster {
                        cluster_id: record.cluster_label,
                        average_similarity: record.average_similarity,
                        members: vec![member],
                    });
                }
            }
        }
        clusters
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCluster {
    pub topic_id: usize,
    pub topic_label: String,
    pub members: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// The corpus held no text documents.
    NoTextDocuments,
    /// No group of two or more similar documents was found.
    NoSimilarDocuments,
    /// No document was assigned a topic.
    NoTopics,
}

/// Result of one clustering request. `Empty` is a successful run that found
/// nothing to show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClusteringOutcome {
    Similarity(SimilarityReport),
    Topics { clusters: Vec<TopicCluster> },
    Empty { reason: EmptyReason },
}

impl ClusteringOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, ClusteringOutcome::Empty { .. })
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Builds the similarity report. `paths` and `matrix` rows share indices.
pub fn assemble_similarity(
    paths: &[PathBuf],
    matrix: &SparseMatrix,
    scored: &[ClusterSimilarity],
) -> ClusteringOutcome {
    let mut records: Vec<DocumentSimilarityRecord> = scored
        .iter()
        .flat_map(|cluster| {
            cluster
                .members
                .iter()
                .zip(&cluster.local_averages)
                .map(move |(&index, &local)| DocumentSimilarityRecord {
                    path: paths[index].clone(),
                    cluster_label: cluster.label,
                    average_similarity: cluster.average_similarity,
                    local_average_similarity: local,
                    feature_vector: matrix.rows[index].clone(),
                })
        })
        .collect();

    if records.is_empty() {
        return ClusteringOutcome::Empty {
            reason: EmptyReason::NoSimilarDocuments,
        };
    }

    records.sort_by(|a, b| {
        descending(a.average_similarity, b.average_similarity)
            .then_with(|| descending(a.local_average_similarity, b.local_average_similarity))
    });
    ClusteringOutcome::Similarity(SimilarityReport { records })
}

/// Groups topic assignments by topic, in order of each topic's first document.
pub fn assemble_topics(
    paths: &[PathBuf],
    model: &TopicModel,
    assignments: &[TopicAssignment],
) -> ClusteringOutcome {
    let mut clusters: Vec<TopicCluster> = Vec::new();
    let mut index: HashMap<usize, usize> = HashMap::new();
    for assignment in assignments {
        let path = paths[assignment.document].clone();
        match index.get(&assignment.topic_id) {
            Some(&i) => clusters[i].members.push(path),
            None => {
                index.insert(assignment.topic_id, clusters.len());
                clusters.push(TopicCluster {
                    topic_id: assignment.topic_id,
                    topic_label: model.label(assignment.topic_id),
                    members: vec![path],
                });
            }
        }
    }

    if clusters.is_empty() {
        ClusteringOutcome::Empty {
            reason: EmptyReason::NoTopics,
        }
    } else {
        ClusteringOutcome::Topics { clusters }
    }
}
