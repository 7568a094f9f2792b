//! One end-to-end run: scan, dedup, cluster, assemble and project.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

use crate::assemble::{assemble_similarity, assemble_topics, ClusteringOutcome, EmptyReason};
use crate::config::{Number, State};
use crate::dbscan::{group_labels, Dbscan};
use crate::error::{DedupError, DedupResult};
use crate::extract::{DefaultExtractor, TextExtractor};
use crate::memo::{run_key, CachedRun, RunCache};
use crate::progress::Progress;
use crate::projection::{project, Projection, ProjectionItem};
use crate::record::{Category, DuplicateGroup, FileRecord};
use crate::scan::{dedup, discover_files, load_records};
use crate::search::{search_documents, DocumentMatches, SearchOptions};
use crate::similarity::score_clusters;
use crate::topic::TopicModeler;
use crate::vectorizer::{CountVectorizer, SparseMatrix};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRequest {
    /// Neighbourhood radius in `[0, 1]`.
    pub sensitivity: Number,
}

impl SimilarityRequest {
    pub fn new(sensitivity: Number) -> DedupResult<Self> {
        if !(0.0..=1.0).contains(&sensitivity) {
            return Err(DedupError::invalid("sensitivity", sensitivity, "must be within [0, 1]"));
        }
        Ok(Self { sensitivity })
    }

    /// From the 0-100 scale shown to users.
    pub fn from_percent(percent: u32) -> DedupResult<Self> {
        if percent > 100 {
            return Err(DedupError::invalid("sensitivity", percent, "must be within [0, 100]"));
        }
        Self::new(percent as Number / 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopicRequest {
    pub n_features: usize,
    pub alpha: f64,
    pub cut_off: f64,
}

impl TopicRequest {
    pub const MIN_FEATURES: usize = 1000;
    pub const MAX_FEATURES: usize = 15000;

    pub fn new(n_features: usize, alpha: f64, cut_off: f64) -> DedupResult<Self> {
        if !(Self::MIN_FEATURES..=Self::MAX_FEATURES).contains(&n_features) {
            return Err(DedupError::invalid(
                "n_features",
                n_features,
                format!("must be within [{}, {}]", Self::MIN_FEATURES, Self::MAX_FEATURES),
            ));
        }
        if !(0.0..=1.0).contains(&alpha) {
            return Err(DedupError::invalid("alpha", alpha, "must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&cut_off) {
            return Err(DedupError::invalid("cut_off", cut_off, "must be within [0, 1]"));
        }
        Ok(Self {
            n_features,
            alpha,
            cut_off,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ClusteringRequest {
    Similarity(SimilarityRequest),
    Topic(TopicRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRequest {
    pub root: PathBuf,
    /// `None` stops after duplicate detection.
    pub clustering: Option<ClusteringRequest>,
    /// Also compute the 3D projection of the clustered documents.
    pub project: bool,
}

impl PipelineRequest {
    pub fn duplicates(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clustering: None,
            project: false,
        }
    }

    pub fn clustering(root: impl Into<PathBuf>, clustering: ClusteringRequest) -> Self {
        Self {
            root: root.into(),
            clustering: Some(clustering),
            project: false,
        }
    }

    pub fn with_projection(mut self, project: bool) -> Self {
        self.project = project;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    pub discovery: Duration,
    pub loading: Duration,
    pub clustering: Duration,
    pub total: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub files_found: usize,
    pub files_analysed: usize,
    pub duplicates_found: usize,
    pub timings: Timings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub duplicates: Vec<DuplicateGroup>,
    /// Image and generic files left after dedup.
    pub non_text: Vec<FileRecord>,
    pub clustering: Option<ClusteringOutcome>,
    pub projection: Option<Projection>,
    pub stats: RunStats,
}

pub struct Pipeline {
    state: State,
    extractor: Box<dyn TextExtractor>,
    cache: Option<RunCache>,
}

impl Pipeline {
    pub fn new(state: State) -> Self {
        Self {
            state,
            extractor: Box::new(DefaultExtractor),
            cache: None,
        }
    }

    pub fn with_extractor(mut self, extractor: Box<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_cache(mut self, cache: RunCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn cache(&self) -> Option<&RunCache> {
        self.cache.as_ref()
    }

    pub fn run(&self, request: &PipelineRequest, progress: &dyn Progress) -> DedupResult<PipelineResult> {
        let start = Instant::now();
        let mut timings = Timings::default();

        let discovery_start = Instant::now();
        let files = discover_files(&request.root)?;
        timings.discovery = discovery_start.elapsed();

        let loading_start = Instant::now();
        let records = load_records(&request.root, &files, &self.state, self.extractor.as_ref(), progress)?;
        let scanned = dedup(files.len(), records);
        timings.loading = loading_start.elapsed();

        let clustering_start = Instant::now();
        let (clustering, projection) = match &request.clustering {
            Some(clustering) => {
                let run = self.cluster_cached(&scanned.corpus.text, clustering, request.project, progress)?;
                (run.clustering, run.projection)
            }
            None => (None, None),
        };
        timings.clustering = clustering_start.elapsed();
        timings.total = start.elapsed();

        let stats = RunStats {
            files_found: scanned.files_found,
            files_analysed: scanned.files_analysed,
            duplicates_found: scanned.duplicates_found(),
            timings,
        };
        log_stats(&stats);

        let corpus = scanned.corpus;
        let non_text = corpus.image.into_iter().chain(corpus.generic).collect();
        Ok(PipelineResult {
            duplicates: scanned.duplicates,
            non_text,
            clustering,
            projection,
            stats,
        })
    }

    fn cluster_cached(
        &self,
        documents: &[FileRecord],
        request: &ClusteringRequest,
        plot: bool,
        progress: &dyn Progress,
    ) -> DedupResult<CachedRun> {
        let cache = match &self.cache {
            Some(cache) => cache,
            None => return Ok(self.cluster(documents, request, plot, progress)),
        };
        let key = run_key(documents, Some(request), plot)?;
        if let Some(hit) = cache.get(&key) {
            info!("Reusing cached clustering for {} documents", documents.len());
            return Ok(hit);
        }
        let run = self.cluster(documents, request, plot, progress);
        cache.insert(key, run.clone());
        Ok(run)
    }

    /// Clusters the text documents, projecting the clustered ones when `plot`
    /// is set. Degenerate input gives an `Empty` outcome rather than an error.
    pub fn cluster(
        &self,
        documents: &[FileRecord],
        request: &ClusteringRequest,
        plot: bool,
        progress: &dyn Progress,
    ) -> CachedRun {
        if documents.is_empty() {
            info!("No text documents to cluster");
            return CachedRun {
                clustering: Some(ClusteringOutcome::Empty {
                    reason: EmptyReason::NoTextDocuments,
                }),
                projection: plot.then(|| project(&[])),
            };
        }

        let paths: Vec<PathBuf> = documents.iter().map(|r| r.path.clone()).collect();
        let texts: Vec<&str> = documents.iter().map(|r| r.text()).collect();

        let (outcome, items) = match request {
            ClusteringRequest::Similarity(similarity) => {
                let matrix = self.vectorize(&texts);
                let labels =
                    Dbscan::from_sensitivity(similarity.sensitivity, self.state.min_points).fit_predict(&matrix);
                let scored = score_clusters(&matrix, &group_labels(&labels), progress);
                let outcome = assemble_similarity(&paths, &matrix, &scored);
                let items = match &outcome {
                    ClusteringOutcome::Similarity(report) => report
                        .records
                        .iter()
                        .map(|r| ProjectionItem {
                            path: r.path.clone(),
                            label: r.cluster_label.to_string(),
                            vector: r.feature_vector.clone(),
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                (outcome, items)
            }
            ClusteringRequest::Topic(topic) => {
                let modeler = TopicModeler::from_state(&self.state);
                match modeler.fit(&texts, topic.n_features, topic.alpha, progress) {
                    Some(model) => {
                        let assignments = model.assign(topic.cut_off);
                        let outcome = assemble_topics(&paths, &model, &assignments);
                        let items = if plot && !assignments.is_empty() {
                            let matrix = self.vectorize(&texts);
                            assignments
                                .iter()
                                .map(|a| ProjectionItem {
                                    path: paths[a.document].clone(),
                                    label: model.label(a.topic_id),
                                    vector: matrix.rows[a.document].clone(),
                                })
                                .collect()
                        } else {
                            Vec::new()
                        };
                        (outcome, items)
                    }
                    None => (
                        ClusteringOutcome::Empty {
                            reason: EmptyReason::NoTopics,
                        },
                        Vec::new(),
                    ),
                }
            }
        };

        CachedRun {
            clustering: Some(outcome),
            projection: plot.then(|| project(&items)),
        }
    }

    fn vectorize(&self, texts: &[&str]) -> SparseMatrix {
        let mut matrix = CountVectorizer::new(self.state.ngram_min, self.state.ngram_max, self.state.lowercase)
            .fit_transform(texts);
        matrix.normalize_rows();
        matrix
    }

    /// Literal search over every text document under `root`, exact
    /// duplicates included.
    pub fn search(
        &self,
        root: &Path,
        query: &str,
        options: &SearchOptions,
        progress: &dyn Progress,
    ) -> DedupResult<Vec<DocumentMatches>> {
        let files = discover_files(root)?;
        let documents: Vec<FileRecord> = load_records(root, &files, &self.state, self.extractor.as_ref(), progress)?
            .into_iter()
            .filter(|r| r.category == Category::Text)
            .collect();
        let found = search_documents(&documents, query, options)?;
        info!(
            "Query matched {} of {} text documents",
            found.len(),
            documents.len()
        );
        Ok(found)
    }
}

fn log_stats(stats: &RunStats) {
    info!(
        "Run finished: {} files found, {} analysed, {} duplicates",
        stats.files_found, stats.files_analysed, stats.duplicates_found
    );
    info!(
        "Timings: discovery {:?}, loading {:?}, clustering {:?}, total {:?}",
        stats.timings.discovery, stats.timings.loading, stats.timings.clustering, stats.timings.total
    );
}
