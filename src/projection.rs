//! Rank-3 truncated SVD of the clustered documents for 3D plotting.
//!
//! Only the left singular vectors are needed for coordinates, so the
//! decomposition runs on the document Gram matrix `A·Aᵀ`, which is small
//! (one row per plotted document) regardless of vocabulary size. Its top
//! eigenvectors are found by power iteration with deflation.

use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use crate::config::{Number, EPSILON};
use crate::vector_ops::{dot_simd, magnitude, normalize_vector, orthogonalize};
use crate::vectorizer::SparseVector;

const SEED: u64 = 42;
const DIMENSIONS: usize = 3;
const MAX_ITERATIONS: usize = 1000;
const TOLERANCE: Number = 1e-6;
/// Eigenvalues below this fraction of the largest count as zero.
const RANK_TOLERANCE: Number = 1e-5;

#[derive(Debug, Clone)]
pub struct ProjectionItem {
    pub path: PathBuf,
    pub label: String,
    pub vector: SparseVector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub path: PathBuf,
    pub label: String,
    pub x: Number,
    pub y: Number,
    pub z: Number,
    /// RGB in `[0, 1)`, shared by every point with the same label.
    pub color: [Number; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Projection {
    Points { points: Vec<ProjectedPoint> },
    /// The vectors span fewer than three dimensions.
    Unsupported { usable_dimensions: usize },
}

fn gram_matrix(items: &[ProjectionItem]) -> Vec<Vec<Number>> {
    let n = items.len();
    let mut gram = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let value = items[i].vector.dot(&items[j].vector);
            gram[i][j] = value;
            gram[j][i] = value;
        }
    }
    gram
}

fn multiply(gram: &[Vec<Number>], v: &[Number]) -> Vec<Number> {
    gram.iter()
        .map(|row| dot_simd(row, v).unwrap_or(0.0))
        .collect()
}

/// Top eigenpairs of a symmetric positive semi-definite matrix, largest first.
fn top_eigenpairs(gram: &[Vec<Number>], count: usize, rng: &mut StdRng) -> Vec<(Number, Vec<Number>)> {
    let n = gram.len();
    let normal = Normal::new(0.0, 1.0).unwrap();
    let mut basis: Vec<Vec<Number>> = Vec::with_capacity(count);
    let mut pairs = Vec::with_capacity(count);

    for _ in 0..count.min(n) {
        let mut v: Vec<Number> = normal.sample_iter(&mut *rng).take(n).collect();
        orthogonalize(&mut v, &basis);
        normalize_vector(&mut v);

        for _ in 0..MAX_ITERATIONS {
            let mut next = multiply(gram, &v);
            orthogonalize(&mut next, &basis);
            if magnitude(&next) < EPSILON {
                v = next;
                break;
            }
            normalize_vector(&mut next);
            let delta: Number = next
                .iter()
                .zip(&v)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<Number>()
                .sqrt();
            v = next;
            if delta < TOLERANCE {
                break;
            }
        }

        let eigenvalue = dot_simd(&v, &multiply(gram, &v)).unwrap_or(0.0).max(0.0);
        basis.push(v.clone());
        pairs.push((eigenvalue, v));
    }
    pairs
}

fn label_colors(items: &[ProjectionItem], rng: &mut StdRng) -> Vec<(String, [Number; 3])> {
    let mut colors: Vec<(String, [Number; 3])> = Vec::new();
    for item in items {
        if !colors.iter().any(|(label, _)| *label == item.label) {
            colors.push((item.label.clone(), [rng.gen(), rng.gen(), rng.gen()]));
        }
    }
    colors
}

/// Projects `items` to 3D. Fewer than three documents, or vectors spanning
/// fewer than three dimensions, give `Projection::Unsupported`.
pub fn project(items: &[ProjectionItem]) -> Projection {
    let mut rng = StdRng::seed_from_u64(SEED);
    let gram = gram_matrix(items);
    let pairs = top_eigenpairs(&gram, DIMENSIONS, &mut rng);

    let largest = pairs.first().map(|(value, _)| *value).unwrap_or(0.0);
    let usable_dimensions = pairs
        .iter()
        .filter(|(value, _)| largest > EPSILON && *value > largest * RANK_TOLERANCE)
        .count();
    if usable_dimensions < DIMENSIONS {
        debug!(
            "Projection unsupported: {} documents span {} dimensions",
            items.len(),
            usable_dimensions
        );
        return Projection::Unsupported { usable_dimensions };
    }

    let colors = label_colors(items, &mut rng);
    let points = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let color = colors
                .iter()
                .find(|(label, _)| *label == item.label)
                .map(|(_, c)| *c)
                .unwrap_or([0.0; 3]);
            ProjectedPoint {
                path: item.path.clone(),
                label: item.label.clone(),
                x: pairs[0].1[i],
                y: pairs[1].1[i],
                z: pairs[2].1[i],
                color,
            }
        })
        .collect();

    Projection::Points { points }
}
