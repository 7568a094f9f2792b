use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc;

use tempfile::TempDir;

use docdup::assemble::{ClusteringOutcome, EmptyReason};
use docdup::memo::RunCache;
use docdup::progress::{ChannelProgress, NoProgress};
use docdup::projection::Projection;
use docdup::search::SearchOptions;
use docdup::{
    ClusteringRequest, DedupError, Pipeline, PipelineRequest, SimilarityRequest, State, TopicRequest,
};

fn write(root: &Path, name: &str, body: &[u8]) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, body).unwrap();
    path
}

fn similarity(percent: u32) -> ClusteringRequest {
    ClusteringRequest::Similarity(SimilarityRequest::from_percent(percent).unwrap())
}

#[test]
fn identical_bytes_form_one_duplicate_group() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", b"quarterly figures");
    write(dir.path(), "b.txt", b"quarterly figures");
    write(dir.path(), "nested/c.txt", b"quarterly figures");
    write(dir.path(), "d.txt", b"something else entirely");

    let result = Pipeline::new(State::default())
        .run(&PipelineRequest::clustering(dir.path(), similarity(50)), &NoProgress)
        .unwrap();

    assert_eq!(result.duplicates.len(), 1);
    assert_eq!(result.duplicates[0].member_paths.len(), 3);
    assert_eq!(result.stats.files_found, 4);
    assert_eq!(result.stats.duplicates_found, 3);
    // One text document left: nothing can pair with it.
    assert_eq!(
        result.clustering,
        Some(ClusteringOutcome::Empty {
            reason: EmptyReason::NoSimilarDocuments
        })
    );
}

#[test]
fn same_text_with_different_bytes_clusters_together() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "unix.txt", b"alpha beta gamma\n");
    write(dir.path(), "windows.txt", b"alpha beta gamma \r\n");
    write(dir.path(), "other.txt", b"delta epsilon zeta");

    let result = Pipeline::new(State::default())
        .run(&PipelineRequest::clustering(dir.path(), similarity(50)), &NoProgress)
        .unwrap();

    assert!(result.duplicates.is_empty());
    let report = match result.clustering {
        Some(ClusteringOutcome::Similarity(report)) => report,
        other => panic!("unexpected outcome {:?}", other),
    };
    let clusters = report.clusters();
    assert_eq!(clusters.len(), 1);
    assert!((clusters[0].average_similarity - 1.0).abs() < 1e-6);
    let names: Vec<_> = clusters[0]
        .members
        .iter()
        .map(|m| m.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["unix.txt", "windows.txt"]);
}

#[test]
fn empty_folder_halts_the_run() {
    let dir = TempDir::new().unwrap();
    let err = Pipeline::new(State::default())
        .run(&PipelineRequest::duplicates(dir.path()), &NoProgress)
        .unwrap_err();
    assert!(matches!(err, DedupError::FolderEmpty(_)));
    assert!(err.to_string().contains("empty"));
}

#[test]
fn full_topic_cut_off_excludes_every_document() {
    let dir = TempDir::new().unwrap();
    let bodies = [
        "wheat harvest yield soil rain",
        "soil harvest wheat rain tractor",
        "invoice payment budget audit ledger",
        "budget audit invoice payment tax",
    ];
    for (i, body) in bodies.iter().enumerate() {
        write(dir.path(), &format!("doc{}.txt", i), body.as_bytes());
    }

    let request = ClusteringRequest::Topic(TopicRequest::new(1000, 0.1, 1.0).unwrap());
    let result = Pipeline::new(State::default())
        .run(&PipelineRequest::clustering(dir.path(), request), &NoProgress)
        .unwrap();
    assert_eq!(
        result.clustering,
        Some(ClusteringOutcome::Empty {
            reason: EmptyReason::NoTopics
        })
    );
}

#[test]
fn noise_is_excluded_and_records_are_sorted() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a1.txt", b"minutes of the board meeting held in march");
    write(dir.path(), "a2.txt", b"minutes of the board meeting held in april");
    write(dir.path(), "b1.txt", b"shipping manifest for container seven");
    write(dir.path(), "b2.txt", b"shipping manifest for container seven.");
    write(dir.path(), "lonely.txt", b"recipe for lemon cake");
    write(dir.path(), "blank.txt", b"");
    write(dir.path(), "blank2.txt", b"  \n");

    let result = Pipeline::new(State::default())
        .run(&PipelineRequest::clustering(dir.path(), similarity(90)), &NoProgress)
        .unwrap();
    let report = match result.clustering {
        Some(ClusteringOutcome::Similarity(report)) => report,
        other => panic!("unexpected outcome {:?}", other),
    };

    for record in &report.records {
        let name = record.path.file_name().unwrap().to_string_lossy();
        assert_ne!(name, "lonely.txt");
        assert!(record.cluster_label >= 0);
    }
    for pair in report.records.windows(2) {
        let key = |r: &docdup::assemble::DocumentSimilarityRecord| {
            (r.average_similarity, r.local_average_similarity)
        };
        assert!(key(&pair[0]) >= key(&pair[1]));
    }

    // Texts without words group together with zero similarity, after the rest.
    let clusters = report.clusters();
    assert_eq!(clusters.len(), 3);
    let blanks = clusters.last().unwrap();
    assert_eq!(blanks.average_similarity, 0.0);
    let names: Vec<_> = blanks
        .members
        .iter()
        .map(|m| m.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["blank.txt", "blank2.txt"]);
}

#[test]
fn lock_files_are_ignored_and_images_reported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "report.txt", b"body");
    write(dir.path(), "~$report.txt", b"lock");
    write(dir.path(), "photo.jpg", b"\xff\xd8\xff");
    write(dir.path(), "archive.bin", b"\x00\x01");

    let result = Pipeline::new(State::default())
        .run(&PipelineRequest::duplicates(dir.path()), &NoProgress)
        .unwrap();
    assert_eq!(result.stats.files_found, 4);
    assert_eq!(result.stats.files_analysed, 3);
    assert_eq!(result.non_text.len(), 2);
    assert!(result.clustering.is_none());
    assert!(result.projection.is_none());
}

#[test]
fn loading_reports_progress_per_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", b"one");
    write(dir.path(), "b.txt", b"two");

    let (tx, rx) = mpsc::channel();
    let progress = ChannelProgress::new(tx);
    Pipeline::new(State::default())
        .run(&PipelineRequest::duplicates(dir.path()), &progress)
        .unwrap();
    drop(progress);

    let events: Vec<_> = rx.iter().collect();
    assert_eq!(events.len(), 2);
    assert_eq!((events[1].completed, events[1].total), (2, 2));
}

#[test]
fn projection_of_a_degenerate_corpus_is_unsupported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", b"same words here");
    write(dir.path(), "b.txt", b"same words here ");

    let request = PipelineRequest::clustering(dir.path(), similarity(50)).with_projection(true);
    let result = Pipeline::new(State::default()).run(&request, &NoProgress).unwrap();
    assert!(matches!(result.projection, Some(Projection::Unsupported { .. })));
}

#[test]
fn repeated_runs_reuse_the_cache() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", b"alpha beta");
    write(dir.path(), "b.txt", b"alpha beta ");

    let pipeline = Pipeline::new(State::default()).with_cache(RunCache::new());
    let request = PipelineRequest::clustering(dir.path(), similarity(50));
    let first = pipeline.run(&request, &NoProgress).unwrap();
    let second = pipeline.run(&request, &NoProgress).unwrap();
    assert_eq!(first.clustering, second.clustering);
    assert_eq!(pipeline.cache().unwrap().len(), 1);
}

#[test]
fn search_covers_duplicates_too() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", b"Budget for the year");
    write(dir.path(), "b.txt", b"Budget for the year");
    write(dir.path(), "c.txt", b"no match here");

    let options = SearchOptions {
        case_sensitive: false,
        whole_word: true,
        radius: 500,
    };
    let found = Pipeline::new(State::default())
        .search(dir.path(), "budget", &options, &NoProgress)
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].excerpts[0].highlights, vec![(0, 6)]);
}

#[test]
fn cli_prints_duplicate_groups_as_json() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", b"same");
    write(dir.path(), "b.txt", b"same");

    let output = Command::new(env!("CARGO_BIN_EXE_docdup"))
        .arg("duplicates")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["duplicates"][0]["member_paths"].as_array().unwrap().len(), 2);
}

#[test]
fn cli_rejects_out_of_range_sensitivity() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", b"text");

    let output = Command::new(env!("CARGO_BIN_EXE_docdup"))
        .args(["similar", "--sensitivity", "150"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
}
