use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::ContextBuilder;
use crate::db::GraphBackend;
use crate::embeddings::EmbeddingService;
use crate::error::{CkgError, Result};
use crate::indexer::events::{ChangeKind, FileChangeEvent, IndexProgressEvent};
use crate::indexer::extract::{ChunkSplitter, Extraction, FileScanner, SymbolExtractor};
use crate::models::{CodeChunk, NodeType};
use crate::symbols::SymbolIndex;

/// Per-project indexing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Idle,
    FullIndexing,
    Watching,
}

/// Counters reported by a full index run.
#[derive(Debug, Clone, Default)]
pub struct FullIndexStats {
    pub files_indexed: usize,
    pub files_failed: usize,
    pub nodes: usize,
    pub edges: usize,
    pub chunks: usize,
    pub embeddings: usize,
}

struct Inner {
    db: Arc<dyn GraphBackend>,
    embeddings: Arc<EmbeddingService>,
    extractor: Arc<dyn SymbolExtractor>,
    splitter: Arc<dyn ChunkSplitter>,
    scanner: Arc<dyn FileScanner>,
    symbol_index: SymbolIndex,
    context: Arc<ContextBuilder>,
    states: Mutex<HashMap<String, IndexState>>,
    progress_tx: broadcast::Sender<IndexProgressEvent>,
    cancel: CancellationToken,
}

/// Keeps project graphs consistent as files change. Change events are
/// enqueued and drained by a single in-order worker; every update is
/// delete-then-recreate so rapid edit sequences cannot leave duplicate or
/// orphaned definitions behind.
pub struct IncrementalIndexer {
    inner: Arc<Inner>,
    change_tx: mpsc::Sender<FileChangeEvent>,
}

impl IncrementalIndexer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<dyn GraphBackend>,
        embeddings: Arc<EmbeddingService>,
        extractor: Arc<dyn SymbolExtractor>,
        splitter: Arc<dyn ChunkSplitter>,
        scanner: Arc<dyn FileScanner>,
        symbol_index: SymbolIndex,
        context: Arc<ContextBuilder>,
        change_queue_size: usize,
        progress_channel_size: usize,
        cancel: CancellationToken,
    ) -> Self {
        let (change_tx, change_rx) = mpsc::channel(change_queue_size.max(1));
        let (progress_tx, _) = broadcast::channel(progress_channel_size.max(1));

        let inner = Arc::new(Inner {
            db,
            embeddings,
            extractor,
            splitter,
            scanner,
            symbol_index,
            context,
            states: Mutex::new(HashMap::new()),
            progress_tx,
            cancel,
        });

        Self::spawn_worker(Arc::clone(&inner), change_rx);
        Self { inner, change_tx }
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<IndexProgressEvent> {
        self.inner.progress_tx.subscribe()
    }

    pub fn state(&self, project_id: &str) -> IndexState {
        self.inner
            .states
            .lock()
            .map(|states| states.get(project_id).copied().unwrap_or(IndexState::Idle))
            .unwrap_or(IndexState::Idle)
    }

    /// False once shutdown has closed the change worker.
    pub fn is_running(&self) -> bool {
        !self.change_tx.is_closed() && !self.inner.cancel.is_cancelled()
    }

    /// Queues a file change for the drain worker.
    pub async fn enqueue_change(&self, event: FileChangeEvent) -> Result<()> {
        self.change_tx
            .send(event)
            .await
            .map_err(|e| CkgError::Indexing(format!("change queue closed: {e}")))
    }

    /// Walks the project, extracts every supported file and performs one
    /// batched insert at the end. Per-file extraction failures are logged
    /// and skipped. Leaves the project in the watching state.
    pub async fn full_index(&self, project_id: &str, root: &Path) -> Result<FullIndexStats> {
        let inner = &self.inner;
        inner.set_state(project_id, IndexState::FullIndexing);

        let result = self.full_index_inner(project_id, root).await;
        match &result {
            Ok(stats) => {
                inner.set_state(project_id, IndexState::Watching);
                info!(
                    project_id,
                    files = stats.files_indexed,
                    failed = stats.files_failed,
                    nodes = stats.nodes,
                    edges = stats.edges,
                    "full index complete"
                );
            }
            Err(e) => {
                inner.set_state(project_id, IndexState::Idle);
                error!(project_id, error = %e, "full index aborted");
            }
        }
        result
    }

    async fn full_index_inner(&self, project_id: &str, root: &Path) -> Result<FullIndexStats> {
        let inner = &self.inner;
        let files = inner.scanner.scan(root).await?;
        let total_files = files.len();
        inner.emit(IndexProgressEvent::Started {
            project_id: project_id.to_string(),
            total_files,
        });

        let mut accumulated = Extraction::default();
        let mut stats = FullIndexStats::default();

        for (processed, file) in files.iter().enumerate() {
            if inner.cancel.is_cancelled() {
                return Err(CkgError::Cancelled(format!("full index of {project_id}")));
            }
            if !inner.extractor.supports(&file.path) {
                continue;
            }

            match inner
                .extractor
                .extract_file(project_id, &file.path, &file.content)
                .await
            {
                Ok(mut extraction) => {
                    extraction
                        .chunks
                        .extend(inner.file_chunks(project_id, &extraction, &file.path, &file.content));
                    accumulated.merge(extraction);
                    stats.files_indexed += 1;
                    inner.emit(IndexProgressEvent::FileIndexed {
                        project_id: project_id.to_string(),
                        path: file.path.clone(),
                        processed: processed + 1,
                        total_files,
                    });
                }
                Err(e) => {
                    stats.files_failed += 1;
                    warn!(project_id, path = %file.path, error = %e, "extraction failed; skipping file");
                    inner.emit(IndexProgressEvent::FileFailed {
                        project_id: project_id.to_string(),
                        path: file.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        stats.nodes = accumulated.nodes.len();
        stats.edges = accumulated.edges.len();
        stats.chunks = accumulated.chunks.len();

        // One batched insert for the whole walk.
        let chunks = std::mem::take(&mut accumulated.chunks);
        inner.db.upsert_nodes_batch(&accumulated.nodes).await?;
        inner.db.upsert_edges_batch(&accumulated.edges).await?;
        inner.db.create_chunks_batch(&chunks).await?;
        inner
            .db
            .create_references_batch(&accumulated.references)
            .await?;
        inner
            .db
            .create_diagnostics_batch(&accumulated.diagnostics)
            .await?;

        stats.embeddings = inner
            .embeddings
            .batch_generate_embeddings(&chunks, &inner.cancel)
            .await?;

        inner.invalidate(project_id);
        inner.emit(IndexProgressEvent::Completed {
            project_id: project_id.to_string(),
            nodes: stats.nodes,
            edges: stats.edges,
        });

        Ok(stats)
    }

    /// Applies one change synchronously, bypassing the queue. The worker
    /// uses this; callers may too when they need the result immediately.
    pub async fn apply_change(&self, event: &FileChangeEvent) -> Result<()> {
        self.inner.apply_change(event).await
    }

    /// Marks a project idle and notifies subscribers.
    pub fn stop_project(&self, project_id: &str) {
        self.inner.set_state(project_id, IndexState::Idle);
        self.inner.emit(IndexProgressEvent::Stopped {
            project_id: project_id.to_string(),
        });
    }

    fn spawn_worker(inner: Arc<Inner>, mut change_rx: mpsc::Receiver<FileChangeEvent>) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = inner.cancel.cancelled() => {
                        debug!("change worker shutting down");
                        break;
                    }
                    event = change_rx.recv() => {
                        let Some(event) = event else { break };
                        if let Err(e) = inner.apply_change(&event).await {
                            error!(
                                project_id = %event.project_id,
                                path = %event.path,
                                error = %e,
                                "failed to apply file change"
                            );
                        }
                    }
                }
            }
        });
    }
}

impl Inner {
    /// Delete-then-recreate for one path. Never patches in place.
    async fn apply_change(&self, event: &FileChangeEvent) -> Result<()> {
        let removed = self
            .db
            .delete_nodes_by_path(&event.project_id, &event.path)
            .await?;
        debug!(
            project_id = %event.project_id,
            path = %event.path,
            kind = ?event.kind,
            removed,
            "processing file change"
        );

        if matches!(event.kind, ChangeKind::Created | ChangeKind::Modified) {
            let content = self.scanner.read_file(Path::new(&event.path)).await?;
            if self.extractor.supports(&event.path) {
                let mut extraction = self
                    .extractor
                    .extract_file(&event.project_id, &event.path, &content)
                    .await?;
                extraction.chunks.extend(self.file_chunks(
                    &event.project_id,
                    &extraction,
                    &event.path,
                    &content,
                ));

                let chunks = std::mem::take(&mut extraction.chunks);
                self.db.upsert_nodes_batch(&extraction.nodes).await?;
                self.db.upsert_edges_batch(&extraction.edges).await?;
                self.db.create_chunks_batch(&chunks).await?;
                self.db.create_references_batch(&extraction.references).await?;
                self.db
                    .create_diagnostics_batch(&extraction.diagnostics)
                    .await?;
                self.embeddings
                    .batch_generate_embeddings(&chunks, &self.cancel)
                    .await?;
            }
        }

        self.invalidate(&event.project_id);
        self.emit(IndexProgressEvent::FileUpdated {
            project_id: event.project_id.clone(),
            path: event.path.clone(),
            kind: event.kind,
        });
        Ok(())
    }

    /// File-level chunks for the file node the extractor produced.
    fn file_chunks(
        &self,
        project_id: &str,
        extraction: &Extraction,
        path: &str,
        content: &str,
    ) -> Vec<CodeChunk> {
        let Some(file_node) = extraction
            .nodes
            .iter()
            .find(|n| n.node_type == NodeType::File && n.path == path)
        else {
            return Vec::new();
        };

        self.splitter
            .split(path, content)
            .into_iter()
            .map(|chunk| {
                CodeChunk::new(&file_node.id, project_id, &chunk.content, chunk.chunk_type)
            })
            .collect()
    }

    fn invalidate(&self, project_id: &str) {
        self.symbol_index.invalidate_project(project_id);
        self.context.invalidate_project(project_id);
    }

    fn set_state(&self, project_id: &str, state: IndexState) {
        if let Ok(mut states) = self.states.lock() {
            states.insert(project_id.to_string(), state);
        }
    }

    fn emit(&self, event: IndexProgressEvent) {
        // No subscribers is fine.
        let _ = self.progress_tx.send(event);
    }
}
