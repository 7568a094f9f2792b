//! Density-based clustering over L2-normalized rows.

use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{Number, MIN_SENSITIVITY};
use crate::vectorizer::SparseMatrix;

/// Label given to points that belong to no cluster.
pub const NOISE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dbscan {
    /// Neighbourhood radius (euclidean).
    pub eps: Number,
    /// Points, the point itself included, needed in a neighbourhood to seed a cluster.
    pub min_points: usize,
}

impl Dbscan {
    pub fn new(eps: Number, min_points: usize) -> Self {
        Self { eps, min_points }
    }

    /// Builds a clusterer from a `[0, 1]` sensitivity; zero becomes a small floor.
    pub fn from_sensitivity(sensitivity: Number, min_points: usize) -> Self {
        let eps = if sensitivity <= 0.0 {
            MIN_SENSITIVITY
        } else {
            sensitivity
        };
        Self::new(eps, min_points)
    }

    /// Indices of every row within `eps` of each row. Empty texts give zero
    /// rows, which sit at distance 0 from each other.
    fn neighbourhoods(&self, matrix: &SparseMatrix) -> Vec<Vec<usize>> {
        let rows = &matrix.rows;
        let squared_norms: Vec<Number> = rows.iter().map(|row| row.dot(row)).collect();
        let eps_squared = self.eps * self.eps;
        (0..rows.len())
            .into_par_iter()
            .map(|i| {
                (0..rows.len())
                    .filter(|&j| {
                        let squared = squared_norms[i] + squared_norms[j] - 2.0 * rows[i].dot(&rows[j]);
                        i == j || squared.max(0.0) <= eps_squared
                    })
                    .collect()
            })
            .collect()
    }

    /// One label per row; `NOISE` for unclustered rows. Labels are assigned
    /// in order of each cluster's lowest-index core point.
    pub fn fit_predict(&self, matrix: &SparseMatrix) -> Vec<i32> {
        let n = matrix.n_rows();
        let mut labels = vec![NOISE; n];
        if n == 0 {
            return labels;
        }

        let neighbours = self.neighbourhoods(matrix);
        let is_core: Vec<bool> = neighbours.iter().map(|nb| nb.len() >= self.min_points).collect();
        let mut next_label = 0;

        for seed in 0..n {
            if labels[seed] != NOISE || !is_core[seed] {
                continue;
            }
            labels[seed] = next_label;
            let mut stack = vec![seed];
            while let Some(point) = stack.pop() {
                if !is_core[point] {
                    continue;
                }
                for &neighbour in &neighbours[point] {
                    if labels[neighbour] == NOISE {
                        labels[neighbour] = next_label;
                        stack.push(neighbour);
                    }
                }
            }
            next_label += 1;
        }

        debug!(
            "DBSCAN eps={} found {} clusters, {} noise points",
            self.eps,
            next_label,
            labels.iter().filter(|&&l| l == NOISE).count()
        );
        labels
    }
}

/// Groups row indices by label, dropping noise. Sorted by label.
pub fn group_labels(labels: &[i32]) -> Vec<(i32, Vec<usize>)> {
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (index, &label) in labels.iter().enumerate() {
        if label != NOISE {
            groups.entry(label).or_default().push(index);
        }
    }
    groups.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorizer::CountVectorizer;

    fn normalized(docs: &[&str]) -> SparseMatrix {
        let mut m = CountVectorizer::new(1, 5, false).fit_transform(docs);
        m.normalize_rows();
        m
    }

    fn corpus() -> SparseMatrix {
        normalized(&[
            "the quarterly budget report for the finance team",
            "the quarterly budget report for the finance group",
            "holiday schedule and office closures",
            "holiday schedule and office closures in december",
            "minutes of the safety committee meeting",
            "",
            "",
        ])
    }

    #[test]
    fn near_duplicates_cluster_and_outliers_are_noise() {
        let labels = Dbscan::from_sensitivity(0.9, 2).fit_predict(&corpus());
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], NOISE);
        assert_ne!(labels[2], NOISE);
        assert_ne!(labels[0], labels[2]);
        assert_eq!(labels[4], NOISE);
    }

    #[test]
    fn empty_texts_cluster_with_each_other() {
        let labels = Dbscan::from_sensitivity(0.5, 2).fit_predict(&corpus());
        assert_ne!(labels[5], NOISE);
        assert_eq!(labels[5], labels[6]);
        assert_ne!(labels[5], labels[0]);
        assert_ne!(labels[5], labels[2]);

        let m = normalized(&["", "", "some words here"]);
        assert_eq!(Dbscan::from_sensitivity(0.5, 2).fit_predict(&m), vec![0, 0, NOISE]);
    }

    #[test]
    fn a_single_empty_text_is_noise() {
        let m = normalized(&["", "some words here", "other words there"]);
        assert_eq!(Dbscan::from_sensitivity(0.5, 2).fit_predict(&m)[0], NOISE);
    }

    #[test]
    fn zero_sensitivity_is_floored_and_is_deterministic() {
        let dbscan = Dbscan::from_sensitivity(0.0, 2);
        assert_eq!(dbscan.eps, MIN_SENSITIVITY);
        let m = normalized(&["same words here", "same words here", "other"]);
        let first = dbscan.fit_predict(&m);
        assert_eq!(first, vec![0, 0, NOISE]);
        assert_eq!(first, dbscan.fit_predict(&m));
    }

    #[test]
    fn empty_matrix_yields_no_labels() {
        let labels = Dbscan::from_sensitivity(0.5, 2).fit_predict(&SparseMatrix::default());
        assert!(labels.is_empty());
        assert!(group_labels(&labels).is_empty());
    }

    #[test]
    fn shrinking_radius_never_grows_a_cluster() {
        let m = corpus();
        let mut previous: Option<Vec<i32>> = None;
        for step in (0..=20).rev() {
            let labels = Dbscan::from_sensitivity(step as Number * 0.05, 2).fit_predict(&m);
            if let Some(wider) = &previous {
                // Every tighter cluster must sit inside a single wider cluster.
                for (_, members) in group_labels(&labels) {
                    let parent = wider[members[0]];
                    assert_ne!(parent, NOISE);
                    assert!(members.iter().all(|&i| wider[i] == parent));
                }
            }
            previous = Some(labels);
        }
    }

    #[test]
    fn grouping_drops_noise() {
        let groups = group_labels(&[1, NOISE, 0, 1, NOISE]);
        assert_eq!(groups, vec![(0, vec![2]), (1, vec![0, 3])]);
    }
}
