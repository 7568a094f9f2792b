use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::EnvFilter;

use docdup::assemble::ClusteringOutcome;
use docdup::progress::LogProgress;
use docdup::search::SearchOptions;
use docdup::{ClusteringRequest, Pipeline, PipelineRequest, SimilarityRequest, State, TopicRequest};

#[derive(Parser)]
#[command(name = "docdup")]
#[command(version = "0.1")]
#[command(about = "Finds duplicate and similar office documents", long_about = None)]
struct Cli {
    /// Raise log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report exact duplicates and non-text files
    Duplicates { root: PathBuf },
    /// Group near-duplicate text documents
    Similar {
        root: PathBuf,
        /// Neighbourhood radius on a 0-100 scale
        #[arg(long, default_value_t = 50)]
        sensitivity: u32,
        /// Include 3D coordinates of the clustered documents
        #[arg(long)]
        plot: bool,
    },
    /// Group text documents by topic
    Topics {
        root: PathBuf,
        #[arg(long, default_value_t = 10000)]
        n_features: usize,
        #[arg(long, default_value_t = 0.5)]
        alpha: f64,
        #[arg(long, default_value_t = 0.25)]
        cut_off: f64,
        #[arg(long)]
        plot: bool,
    },
    /// Find literal occurrences of a query
    Search {
        root: PathBuf,
        query: String,
        #[arg(long)]
        ignore_case: bool,
        /// Match inside words too
        #[arg(long)]
        partial: bool,
    },
    Config,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish();

    let _ = set_global_default(subscriber);
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn duplicates_command(pipeline: &Pipeline, root: PathBuf) -> Result<()> {
    let result = pipeline
        .run(&PipelineRequest::duplicates(&root), &LogProgress)
        .with_context(|| format!("Failed to scan {}", root.display()))?;

    let output = serde_json::json!({
        "duplicates": result.duplicates,
        "non_text": result.non_text.iter().map(|r| serde_json::json!({
            "path": r.path,
            "category": r.category,
        })).collect::<Vec<_>>(),
        "stats": result.stats,
    });
    print_json(&output)
}

fn cluster_command(pipeline: &Pipeline, root: PathBuf, request: ClusteringRequest, plot: bool) -> Result<()> {
    let request = PipelineRequest::clustering(&root, request).with_projection(plot);
    let result = pipeline
        .run(&request, &LogProgress)
        .with_context(|| format!("Failed to cluster {}", root.display()))?;

    let clusters = match &result.clustering {
        Some(ClusteringOutcome::Similarity(report)) => serde_json::to_value(report.clusters())?,
        Some(outcome) => serde_json::to_value(outcome)?,
        None => serde_json::Value::Null,
    };
    let output = serde_json::json!({
        "duplicates": result.duplicates,
        "clusters": clusters,
        "projection": result.projection,
        "stats": result.stats,
    });
    print_json(&output)
}

fn search_command(pipeline: &Pipeline, root: PathBuf, query: &str, options: SearchOptions) -> Result<()> {
    let found = pipeline
        .search(&root, query, &options, &LogProgress)
        .with_context(|| format!("Search failed under {}", root.display()))?;
    print_json(&found)
}

fn config_command(state: &State) -> Result<()> {
    state.print_config();
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let state = State::new().context("Failed to load configuration")?;
    let verbosity = if state.verbose { args.verbose.max(2) } else { args.verbose };
    init_tracing(verbosity);

    let radius = state.excerpt_radius;
    let pipeline = Pipeline::new(state);

    match args.command {
        Commands::Duplicates { root } => duplicates_command(&pipeline, root)?,
        Commands::Similar {
            root,
            sensitivity,
            plot,
        } => {
            let request = ClusteringRequest::Similarity(SimilarityRequest::from_percent(sensitivity)?);
            cluster_command(&pipeline, root, request, plot)?
        }
        Commands::Topics {
            root,
            n_features,
            alpha,
            cut_off,
            plot,
        } => {
            let request = ClusteringRequest::Topic(TopicRequest::new(n_features, alpha, cut_off)?);
            cluster_command(&pipeline, root, request, plot)?
        }
        Commands::Search {
            root,
            query,
            ignore_case,
            partial,
        } => {
            let options = SearchOptions {
                case_sensitive: !ignore_case,
                whole_word: !partial,
                radius,
            };
            search_command(&pipeline, root, &query, options)?
        }
        Commands::Config => config_command(pipeline.state())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_defaults_match_the_interactive_tool() {
        let cli = Cli::try_parse_from(["docdup", "topics", "docs"]).unwrap();
        match cli.command {
            Commands::Topics {
                n_features,
                alpha,
                cut_off,
                plot,
                ..
            } => {
                assert_eq!(n_features, 10000);
                assert_eq!(alpha, 0.5);
                assert_eq!(cut_off, 0.25);
                assert!(!plot);
                assert!(TopicRequest::new(n_features, alpha, cut_off).is_ok());
            }
            _ => panic!("expected the topics command"),
        }
    }
}
