mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use common::{setup_backend, MemScanner, StubExtractor};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use ckg::config::Config;
use ckg::context::ContextBuilder;
use ckg::db::GraphBackend;
use ckg::embeddings::EmbeddingService;
use ckg::error::CkgError;
use ckg::indexer::{
    ChangeKind, FileChangeEvent, IncrementalIndexer, IndexProgressEvent, IndexState,
    LineChunkSplitter,
};
use ckg::models::NodeType;
use ckg::symbols::SymbolIndex;

const PROJECT: &str = "proj-index";

fn build_indexer(
    db: &Arc<dyn GraphBackend>,
    scanner: MemScanner,
) -> (IncrementalIndexer, CancellationToken) {
    let mut config = Config::default();
    config.embeddings.model = "local/statistical-384".to_string();
    config.embeddings.batch_delay_ms = 0;

    let embeddings =
        Arc::new(EmbeddingService::new(Arc::clone(db), &config.embeddings).unwrap());
    let symbols = SymbolIndex::new(Arc::clone(db), 100, Duration::from_secs(300));
    let context = Arc::new(ContextBuilder::new(
        Arc::clone(db),
        Arc::clone(&embeddings),
        &config.context,
    ));
    let cancel = CancellationToken::new();
    let indexer = IncrementalIndexer::new(
        Arc::clone(db),
        embeddings,
        Arc::new(StubExtractor),
        Arc::new(LineChunkSplitter::default()),
        Arc::new(scanner),
        symbols,
        context,
        16,
        16,
        cancel.clone(),
    );
    (indexer, cancel)
}

#[tokio::test]
async fn full_index_walks_and_batches() {
    let (db, _tmp) = setup_backend().await;
    let scanner = MemScanner::new(&[
        ("a.ts", "fn alpha\nfn beta"),
        ("b.ts", "class Widget"),
        ("notes.md", "not indexed"),
    ]);
    let (indexer, _cancel) = build_indexer(&db, scanner);

    let stats = indexer.full_index(PROJECT, Path::new("/src")).await.unwrap();
    assert_eq!(stats.files_indexed, 2);
    assert_eq!(stats.files_failed, 0);
    // 2 file nodes + 2 functions + 1 class.
    assert_eq!(stats.nodes, 5);
    assert!(stats.chunks > 0);
    assert_eq!(stats.embeddings, stats.chunks);
    assert_eq!(indexer.state(PROJECT), IndexState::Watching);

    let functions = db
        .find_nodes_by_type(Some(NodeType::Function), PROJECT, 100)
        .await
        .unwrap();
    assert_eq!(functions.len(), 2);
}

#[tokio::test]
async fn full_index_skips_broken_files() {
    let (db, _tmp) = setup_backend().await;
    let scanner = MemScanner::new(&[("good.ts", "fn ok"), ("broken.ts", "fn nope")]);
    let (indexer, _cancel) = build_indexer(&db, scanner);

    let mut progress = indexer.subscribe_progress();
    let stats = indexer.full_index(PROJECT, Path::new("/src")).await.unwrap();
    assert_eq!(stats.files_indexed, 1);
    assert_eq!(stats.files_failed, 1);

    let mut saw_failure = false;
    while let Ok(event) = progress.try_recv() {
        if let IndexProgressEvent::FileFailed { path, .. } = event {
            assert_eq!(path, "broken.ts");
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn reindexing_unchanged_file_is_idempotent() {
    let (db, _tmp) = setup_backend().await;
    let scanner = MemScanner::new(&[("a.ts", "fn alpha\nfn beta\nref alpha")]);
    let (indexer, _cancel) = build_indexer(&db, scanner);

    let event = FileChangeEvent::new(PROJECT, "a.ts", ChangeKind::Modified);
    indexer.apply_change(&event).await.unwrap();

    let nodes_after_first = db.find_nodes_by_type(None, PROJECT, 100).await.unwrap();
    let edges_after_first = db.get_edges_by_project(PROJECT, None).await.unwrap();

    indexer.apply_change(&event).await.unwrap();

    let nodes_after_second = db.find_nodes_by_type(None, PROJECT, 100).await.unwrap();
    let edges_after_second = db.get_edges_by_project(PROJECT, None).await.unwrap();

    assert_eq!(nodes_after_first.len(), nodes_after_second.len());
    assert_eq!(edges_after_first.len(), edges_after_second.len());

    // Same logical symbols, no duplicate live definitions.
    let mut first_keys: Vec<String> =
        nodes_after_first.iter().map(|n| n.identity_key()).collect();
    let mut second_keys: Vec<String> =
        nodes_after_second.iter().map(|n| n.identity_key()).collect();
    first_keys.sort();
    second_keys.sort();
    assert_eq!(first_keys, second_keys);
}

#[tokio::test]
async fn deleted_file_leaves_nothing_behind() {
    let (db, _tmp) = setup_backend().await;
    let scanner = MemScanner::new(&[("a.ts", "fn alpha")]);
    let (indexer, _cancel) = build_indexer(&db, scanner);

    indexer
        .apply_change(&FileChangeEvent::new(PROJECT, "a.ts", ChangeKind::Created))
        .await
        .unwrap();
    assert!(!db
        .find_nodes_by_path(PROJECT, "a.ts")
        .await
        .unwrap()
        .is_empty());

    indexer
        .apply_change(&FileChangeEvent::new(PROJECT, "a.ts", ChangeKind::Deleted))
        .await
        .unwrap();
    assert!(db
        .find_nodes_by_path(PROJECT, "a.ts")
        .await
        .unwrap()
        .is_empty());
    assert!(db
        .find_nodes_by_type(None, PROJECT, 100)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(db.count_embeddings(PROJECT).await.unwrap(), 0);
}

#[tokio::test]
async fn queued_changes_are_drained_in_order() {
    let (db, _tmp) = setup_backend().await;
    let scanner = MemScanner::new(&[("a.ts", "fn alpha")]);
    let (indexer, _cancel) = build_indexer(&db, scanner);

    let mut progress = indexer.subscribe_progress();
    indexer
        .enqueue_change(FileChangeEvent::new(PROJECT, "a.ts", ChangeKind::Created))
        .await
        .unwrap();
    indexer
        .enqueue_change(FileChangeEvent::new(PROJECT, "a.ts", ChangeKind::Deleted))
        .await
        .unwrap();

    // Wait for both FileUpdated events from the worker.
    let mut kinds = Vec::new();
    for _ in 0..2 {
        let event = tokio::time::timeout(Duration::from_secs(5), progress.recv())
            .await
            .expect("worker progress")
            .expect("channel open");
        if let IndexProgressEvent::FileUpdated { kind, .. } = event {
            kinds.push(kind);
        }
    }
    assert_eq!(kinds, vec![ChangeKind::Created, ChangeKind::Deleted]);
    assert!(db
        .find_nodes_by_path(PROJECT, "a.ts")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn cancelled_indexer_stops_accepting_work() {
    let (db, _tmp) = setup_backend().await;
    let scanner = MemScanner::new(&[("a.ts", "fn alpha")]);
    let (indexer, cancel) = build_indexer(&db, scanner);

    assert!(indexer.is_running());
    cancel.cancel();
    assert!(!indexer.is_running());

    let err = indexer
        .full_index(PROJECT, Path::new("/src"))
        .await
        .unwrap_err();
    assert!(matches!(err, CkgError::Cancelled(_)));
    assert_eq!(indexer.state(PROJECT), IndexState::Idle);
}

#[tokio::test]
async fn stop_project_returns_to_idle() {
    let (db, _tmp) = setup_backend().await;
    let scanner = MemScanner::new(&[("a.ts", "fn alpha")]);
    let (indexer, _cancel) = build_indexer(&db, scanner);

    indexer.full_index(PROJECT, Path::new("/src")).await.unwrap();
    assert_eq!(indexer.state(PROJECT), IndexState::Watching);

    indexer.stop_project(PROJECT);
    assert_eq!(indexer.state(PROJECT), IndexState::Idle);
}
