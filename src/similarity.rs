//! Pairwise cosine similarity inside clusters.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::config::EPSILON;
use crate::progress::Progress;
use crate::vectorizer::{SparseMatrix, SparseVector};

/// Cosine similarity clamped to `[0, 1]`. Zero vectors have similarity 0.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let denominator = a.norm() * b.norm();
    if denominator < EPSILON {
        return 0.0;
    }
    ((a.dot(b) / denominator) as f64).clamp(0.0, 1.0)
}

/// Symmetric similarity matrix for the rows named by `members`.
/// Each unordered pair is computed once.
pub fn pairwise_matrix(matrix: &SparseMatrix, members: &[usize]) -> Vec<Vec<f64>> {
    let n = members.len();
    let mut sims = vec![vec![0.0; n]; n];
    for i in 0..n {
        let a = &matrix.rows[members[i]];
        sims[i][i] = cosine_similarity(a, a);
        for j in (i + 1)..n {
            let s = cosine_similarity(a, &matrix.rows[members[j]]);
            sims[i][j] = s;
            sims[j][i] = s;
        }
    }
    sims
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSimilarity {
    pub label: i32,
    /// Row indices into the vector matrix, in ascending order.
    pub members: Vec<usize>,
    /// Mean over every pair of distinct members.
    pub average_similarity: f64,
    /// Per member, the mean similarity to every other member. Aligned with `members`.
    pub local_averages: Vec<f64>,
}

/// Scores one cluster. Clusters with fewer than two members are not scored.
pub fn score_cluster(matrix: &SparseMatrix, label: i32, members: &[usize]) -> Option<ClusterSimilarity> {
    if members.len() < 2 {
        return None;
    }
    let sims = pairwise_matrix(matrix, members);
    let n = members.len();

    let local_averages: Vec<f64> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| j != i)
                .map(|j| sims[i][j])
                .collect::<Vec<f64>>()
                .mean()
        })
        .collect();

    let pairs: Vec<f64> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .map(|(i, j)| sims[i][j])
        .collect();
    let average_similarity = pairs.mean();

    Some(ClusterSimilarity {
        label,
        members: members.to_vec(),
        average_similarity,
        local_averages,
    })
}

/// Scores every cluster in parallel. Output order follows `clusters`.
pub fn score_clusters(
    matrix: &SparseMatrix,
    clusters: &[(i32, Vec<usize>)],
    progress: &dyn Progress,
) -> Vec<ClusterSimilarity> {
    let total: usize = clusters
        .iter()
        .filter(|(_, m)| m.len() >= 2)
        .map(|(_, m)| m.len())
        .sum();
    let done = AtomicUsize::new(0);

    let scored: Vec<ClusterSimilarity> = clusters
        .par_iter()
        .filter_map(|(label, members)| {
            let scored = score_cluster(matrix, *label, members)?;
            let completed = done.fetch_add(members.len(), Ordering::SeqCst) + members.len();
            progress.report(
                completed,
                total,
                &format!("Calculated similarities for cluster {}", label),
            );
            Some(scored)
        })
        .collect();

    debug!("Scored {} clusters over {} documents", scored.len(), total);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::vectorizer::CountVectorizer;

    fn normalized(docs: &[&str]) -> SparseMatrix {
        let mut m = CountVectorizer::new(1, 2, false).fit_transform(docs);
        m.normalize_rows();
        m
    }

    #[test]
    fn similarity_is_bounded_and_self_similarity_is_one() {
        let m = normalized(&["red green blue", "red green", "yellow purple", ""]);
        let members: Vec<usize> = (0..4).collect();
        let sims = pairwise_matrix(&m, &members);
        for i in 0..4 {
            for j in 0..4 {
                assert!((0.0..=1.0).contains(&sims[i][j]));
                assert_eq!(sims[i][j], sims[j][i]);
            }
        }
        for i in 0..3 {
            assert!((sims[i][i] - 1.0).abs() < 1e-5);
        }
        assert_eq!(sims[3][3], 0.0);
        assert_eq!(sims[0][2], 0.0);
    }

    #[test]
    fn averages_exclude_self_pairs() {
        let m = normalized(&["alpha beta", "alpha beta", "gamma delta"]);
        let scored = score_cluster(&m, 0, &[0, 1, 2]).unwrap();
        // pairs: (0,1)=1, (0,2)=0, (1,2)=0
        assert!((scored.average_similarity - 1.0 / 3.0).abs() < 1e-6);
        assert!((scored.local_averages[0] - 0.5).abs() < 1e-6);
        assert!((scored.local_averages[1] - 0.5).abs() < 1e-6);
        assert!(scored.local_averages[2].abs() < 1e-6);
    }

    #[test]
    fn singletons_are_not_scored() {
        let m = normalized(&["only one"]);
        assert!(score_cluster(&m, 0, &[0]).is_none());
        let scored = score_clusters(&m, &[(0, vec![0])], &NoProgress);
        assert!(scored.is_empty());
    }

    #[test]
    fn parallel_scoring_keeps_cluster_order() {
        let m = normalized(&["a1 a2", "a1 a2", "b1 b2", "b1 b2 b3", "c1", "c1"]);
        let clusters = vec![(2, vec![4, 5]), (0, vec![0, 1]), (1, vec![2, 3])];
        let scored = score_clusters(&m, &clusters, &NoProgress);
        let labels: Vec<i32> = scored.iter().map(|c| c.label).collect();
        assert_eq!(labels, vec![2, 0, 1]);
        assert!((scored[1].average_similarity - 1.0).abs() < 1e-5);
    }
}
