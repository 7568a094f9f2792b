pub mod assemble;
pub mod config;
pub mod dbscan;
pub mod error;
pub mod extract;
pub mod memo;
pub mod pipeline;
pub mod progress;
pub mod projection;
pub mod record;
pub mod scan;
pub mod search;
pub mod similarity;
pub mod topic;
pub mod vector_ops;
pub mod vectorizer;

pub use config::State;
pub use error::{DedupError, DedupResult};
pub use pipeline::{ClusteringRequest, Pipeline, PipelineRequest, PipelineResult, SimilarityRequest, TopicRequest};
