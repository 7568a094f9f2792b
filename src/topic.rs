//! Latent Dirichlet Allocation fitted with collapsed Gibbs sampling.
//!
//! Documents are reduced to lowercase unigram counts with English stop words
//! removed and the vocabulary capped at `n_features` terms. Each document is
//! then given its single strongest topic, provided that topic's share of the
//! document exceeds the caller's cut-off.

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::State;
use crate::progress::Progress;
use crate::vectorizer::{CountVectorizer, ENGLISH_STOP_WORDS};

const SEED: u64 = 42;
const MAX_TOPICS: usize = 400;

#[derive(Debug, Clone)]
pub struct TopicModeler {
    pub iterations: usize,
    pub beta: f64,
    pub min_df: usize,
    pub max_df: f64,
    pub top_words: usize,
    /// Fixed topic count; derived from the corpus size when `None`.
    pub n_topics: Option<usize>,
    pub seed: u64,
}

impl TopicModeler {
    pub fn from_state(state: &State) -> Self {
        Self {
            iterations: state.topic_iterations,
            beta: state.topic_beta,
            min_df: state.topic_min_df,
            max_df: state.topic_max_df,
            top_words: state.topic_words,
            n_topics: state.topic_count,
            seed: SEED,
        }
    }

    fn topic_count(&self, n_docs: usize) -> usize {
        self.n_topics
            .unwrap_or_else(|| ((n_docs as f64).sqrt() as usize).min(MAX_TOPICS))
            .max(1)
    }

    /// Fits a model over `texts`. Returns `None` when no term survives the
    /// vocabulary filters, since there is nothing to model.
    pub fn fit<S: AsRef<str>>(
        &self,
        texts: &[S],
        n_features: usize,
        alpha: f64,
        progress: &dyn Progress,
    ) -> Option<TopicModel> {
        let counts = CountVectorizer::new(1, 1, true)
            .with_stop_words(ENGLISH_STOP_WORDS)
            .with_document_frequency(self.min_df, self.max_df)
            .with_max_features(n_features)
            .fit_transform(texts);
        if counts.n_cols() == 0 {
            info!("Topic vocabulary is empty after filtering {} documents", texts.len());
            return None;
        }

        let n_topics = self.topic_count(texts.len());
        let n_words = counts.n_cols();
        let docs: Vec<Vec<usize>> = counts
            .rows
            .iter()
            .map(|row| {
                row.indices
                    .iter()
                    .zip(&row.values)
                    .flat_map(|(&w, &c)| std::iter::repeat(w as usize).take(c as usize))
                    .collect()
            })
            .collect();

        let mut sampler = GibbsSampler::new(&docs, n_topics, n_words, alpha, self.beta, self.seed);
        for sweep in 0..self.iterations {
            sampler.sweep(&docs);
            progress.report(sweep + 1, self.iterations, "Modeling topics");
        }
        debug!(
            "Fitted {} topics over {} documents and {} terms",
            n_topics,
            docs.len(),
            n_words
        );

        let topic_words: Vec<Vec<String>> = (0..n_topics)
            .map(|k| {
                let mut ranked: Vec<usize> = (0..n_words).filter(|&w| sampler.n_kw[k][w] > 0).collect();
                ranked.sort_by(|&a, &b| sampler.n_kw[k][b].cmp(&sampler.n_kw[k][a]).then(a.cmp(&b)));
                ranked
                    .into_iter()
                    .take(self.top_words)
                    .map(|w| counts.vocabulary[w].clone())
                    .collect()
            })
            .collect();

        Some(TopicModel {
            n_topics,
            topic_words,
            doc_topic: sampler.doc_topic_distribution(),
        })
    }
}

struct GibbsSampler {
    alpha: f64,
    beta: f64,
    n_words: usize,
    z: Vec<Vec<usize>>,
    n_dk: Vec<Vec<u32>>,
    n_kw: Vec<Vec<u32>>,
    n_k: Vec<u32>,
    rng: StdRng,
    weights: Vec<f64>,
}

impl GibbsSampler {
    fn new(docs: &[Vec<usize>], n_topics: usize, n_words: usize, alpha: f64, beta: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut n_dk = vec![vec![0u32; n_topics]; docs.len()];
        let mut n_kw = vec![vec![0u32; n_words]; n_topics];
        let mut n_k = vec![0u32; n_topics];

        let z: Vec<Vec<usize>> = docs
            .iter()
            .enumerate()
            .map(|(d, words)| {
                words
                    .iter()
                    .map(|&w| {
                        let k = rng.gen_range(0..n_topics);
                        n_dk[d][k] += 1;
                        n_kw[k][w] += 1;
                        n_k[k] += 1;
                        k
                    })
                    .collect::<Vec<usize>>()
            })
            .collect();

        Self {
            alpha,
            beta,
            n_words,
            z,
            n_dk,
            n_kw,
            n_k,
            rng,
            weights: vec![0.0; n_topics],
        }
    }

    fn sweep(&mut self, docs: &[Vec<usize>]) {
        let v_beta = self.n_words as f64 * self.beta;
        for (d, words) in docs.iter().enumerate() {
            for (i, &w) in words.iter().enumerate() {
                let old = self.z[d][i];
                self.n_dk[d][old] -= 1;
                self.n_kw[old][w] -= 1;
                self.n_k[old] -= 1;

                let mut total = 0.0;
                for k in 0..self.weights.len() {
                    let word_term = (self.n_kw[k][w] as f64 + self.beta) / (self.n_k[k] as f64 + v_beta);
                    let weight = (self.n_dk[d][k] as f64 + self.alpha) * word_term;
                    self.weights[k] = weight;
                    total += weight;
                }
                if total <= 0.0 {
                    // alpha == 0 and the token is alone in its document.
                    total = 0.0;
                    for k in 0..self.weights.len() {
                        let weight = (self.n_kw[k][w] as f64 + self.beta) / (self.n_k[k] as f64 + v_beta);
                        self.weights[k] = weight;
                        total += weight;
                    }
                }

                let mut target = self.rng.gen::<f64>() * total;
                let mut new = self.weights.len() - 1;
                for (k, &weight) in self.weights.iter().enumerate() {
                    if target < weight {
                        new = k;
                        break;
                    }
                    target -= weight;
                }

                self.z[d][i] = new;
                self.n_dk[d][new] += 1;
                self.n_kw[new][w] += 1;
                self.n_k[new] += 1;
            }
        }
    }

    /// Smoothed per-document topic proportions. Documents with no terms get
    /// an empty distribution.
    fn doc_topic_distribution(&self) -> Vec<Vec<f64>> {
        let n_topics = self.n_k.len() as f64;
        self.n_dk
            .iter()
            .map(|counts| {
                let length: u32 = counts.iter().sum();
                let denominator = length as f64 + n_topics * self.alpha;
                if length == 0 || denominator <= 0.0 {
                    return Vec::new();
                }
                counts
                    .iter()
                    .map(|&c| (c as f64 + self.alpha) / denominator)
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicModel {
    pub n_topics: usize,
    /// Most representative terms per topic, strongest first.
    pub topic_words: Vec<Vec<String>>,
    /// Per document, the probability of each topic.
    pub doc_topic: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAssignment {
    pub document: usize,
    pub topic_id: usize,
    pub strength: f64,
}

impl TopicModel {
    pub fn label(&self, topic_id: usize) -> String {
        self.topic_words
            .get(topic_id)
            .map(|words| words.join(" "))
            .unwrap_or_default()
    }

    /// Strongest topic per document, kept only when its share is above `cut_off`.
    pub fn assign(&self, cut_off: f64) -> Vec<TopicAssignment> {
        self.doc_topic
            .iter()
            .enumerate()
            .filter_map(|(document, dist)| {
                let (topic_id, &strength) = dist
                    .iter()
                    .enumerate()
                    .fold(None, |best: Option<(usize, &f64)>, (k, p)| match best {
                        Some((_, bp)) if bp >= p => best,
                        _ => Some((k, p)),
                    })?;
                (strength > cut_off).then_some(TopicAssignment {
                    document,
                    topic_id,
                    strength,
                })
            })
            .collect()
    }
}
