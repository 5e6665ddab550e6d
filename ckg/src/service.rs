use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::rerank::rerank;
use crate::context::ContextBuilder;
use crate::context::extract_candidates;
use crate::db::{Database, GraphBackend, LibSqlBackend};
use crate::embeddings::EmbeddingService;
use crate::error::Result;
use crate::graph::{GraphAnalytics, GraphService};
use crate::indexer::{
    ChangeKind, FileChangeEvent, FileScanner, FullIndexStats, IncrementalIndexer,
    LineChunkSplitter, SymbolExtractor,
};
use crate::models::{
    ContextBundle, ContextMetadata, ContextOptions, GraphInsights, GraphNode, RankedResult,
    RerankWeights, ResultSource, SearchOptions, SearchResponse, SectionKind,
    SemanticSearchOptions,
};
use crate::symbols::{ImpactAnalyzer, SymbolIndex};

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Keep the existing graph and only (re)index on top of it.
    pub incremental: bool,
    pub commit_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub context: ContextBundle,
    pub insights: GraphInsights,
    pub metadata: ContextMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub ok: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
}

/// The orchestration façade: wires the store, indexes, embedding service
/// and context pipeline together and exposes the build/query/search
/// operations a transport layer would call.
pub struct CkgService {
    db: Arc<dyn GraphBackend>,
    graph: GraphService,
    analytics: GraphAnalytics,
    symbols: SymbolIndex,
    impact: ImpactAnalyzer,
    embeddings: Arc<EmbeddingService>,
    context: Arc<ContextBuilder>,
    indexer: IncrementalIndexer,
    cancel: CancellationToken,
}

impl CkgService {
    pub async fn new(
        config: &Config,
        extractor: Arc<dyn SymbolExtractor>,
        scanner: Arc<dyn FileScanner>,
    ) -> Result<Self> {
        let database = Database::new(&config.database).await?;
        let backend: Arc<dyn GraphBackend> = Arc::new(LibSqlBackend::new(database));
        Self::with_backend(backend, config, extractor, scanner)
    }

    /// Wires the service over an injected backend. Tests use this with an
    /// in-memory database.
    pub fn with_backend(
        db: Arc<dyn GraphBackend>,
        config: &Config,
        extractor: Arc<dyn SymbolExtractor>,
        scanner: Arc<dyn FileScanner>,
    ) -> Result<Self> {
        let embeddings = Arc::new(EmbeddingService::new(Arc::clone(&db), &config.embeddings)?);
        let symbols = SymbolIndex::new(
            Arc::clone(&db),
            config.context.cache_size,
            Duration::from_secs(config.context.cache_ttl_secs),
        );
        let context = Arc::new(ContextBuilder::new(
            Arc::clone(&db),
            Arc::clone(&embeddings),
            &config.context,
        ));
        let cancel = CancellationToken::new();
        let indexer = IncrementalIndexer::new(
            Arc::clone(&db),
            Arc::clone(&embeddings),
            extractor,
            Arc::new(LineChunkSplitter::default()),
            scanner,
            symbols.clone(),
            Arc::clone(&context),
            config.indexing.change_queue_size,
            config.indexing.progress_channel_size,
            cancel.clone(),
        );

        Ok(Self {
            graph: GraphService::new(Arc::clone(&db)),
            analytics: GraphAnalytics::new(Arc::clone(&db)),
            impact: ImpactAnalyzer::new(Arc::clone(&db)),
            symbols,
            embeddings,
            context,
            indexer,
            cancel,
            db,
        })
    }

    /// Indexes a project from scratch (or on top of the existing graph
    /// when `incremental`), recording the indexed commit in metadata.
    pub async fn build_knowledge_graph(
        &self,
        project_id: &str,
        root_path: &Path,
        options: &BuildOptions,
    ) -> Result<FullIndexStats> {
        if !options.incremental {
            let removed = self.graph.clear_project(project_id).await?;
            if removed > 0 {
                info!(project_id, removed, "cleared previous graph before rebuild");
            }
        }

        let stats = self.indexer.full_index(project_id, root_path).await?;

        self.db
            .set_meta(
                &format!("last_indexed:{project_id}"),
                &Utc::now().to_rfc3339(),
            )
            .await?;
        if let Some(ref commit) = options.commit_hash {
            self.db
                .set_meta(&format!("commit:{project_id}"), commit)
                .await?;
        }

        Ok(stats)
    }

    /// Builds token-bounded context for a query, with graph insights for
    /// the top result.
    pub async fn query_with_context(
        &self,
        query: &str,
        project_id: Option<&str>,
        options: &ContextOptions,
    ) -> Result<QueryResponse> {
        let context = self.context.build_context(query, project_id, options).await?;

        let insights = match project_id {
            Some(pid) => {
                let focus = context
                    .section(SectionKind::TargetSymbols)
                    .and_then(|s| s.items.first())
                    .and_then(|item| item.node_id.as_deref());
                self.analytics.build_insights(pid, focus).await?
            }
            None => GraphInsights::default(),
        };

        let metadata = context.metadata.clone();
        Ok(QueryResponse {
            context,
            insights,
            metadata,
        })
    }

    /// Runs the symbolic, semantic and plain-text retrieval legs side by
    /// side and returns them separately plus a combined reranked list.
    pub async fn search(
        &self,
        query: &str,
        project_id: Option<&str>,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        let mut response = SearchResponse::default();
        let limit = options.limit.max(1);

        if options.include_symbolic {
            if let Some(pid) = project_id {
                let mut seen: HashSet<String> = HashSet::new();
                for candidate in extract_candidates(query) {
                    for node in self.db.find_node(&candidate, None, pid).await? {
                        if seen.insert(node.id.clone()) {
                            response.symbolic.push(node);
                        }
                    }
                }
                response.symbolic.truncate(limit);
            }
        }

        if options.include_semantic {
            let semantic_opts = SemanticSearchOptions {
                limit,
                ..SemanticSearchOptions::default()
            };
            response.semantic = self
                .embeddings
                .semantic_search(query, project_id, &semantic_opts)
                .await?;
        }

        if options.include_text {
            if let Some(pid) = project_id {
                let pattern = format!("%{}%", query.trim());
                response.text = self
                    .db
                    .find_nodes_by_name_like(pid, &pattern, limit as u32)
                    .await?;
            }
        }

        response.combined = self
            .combine_results(&response, query, project_id, limit)
            .await?;
        Ok(response)
    }

    /// Queues a single file update for the in-order change worker.
    pub async fn update_file_in_graph(
        &self,
        path: &str,
        project_id: &str,
        change: ChangeKind,
    ) -> Result<()> {
        self.indexer
            .enqueue_change(FileChangeEvent::new(project_id, path, change))
            .await
    }

    /// Component probes aggregated to ok / degraded / critical.
    pub async fn health(&self) -> HealthReport {
        let mut components = Vec::new();

        let database_ok = self.db.get_meta("schema_version").await;
        components.push(ComponentHealth {
            name: "database".to_string(),
            ok: database_ok.is_ok(),
            detail: database_ok.err().map(|e| e.to_string()),
        });

        let provider_probe = self.embeddings.probe().await;
        if let Err(ref e) = provider_probe {
            warn!(error = %e, "embedding provider probe failed; local fallback active");
        }
        components.push(ComponentHealth {
            name: "embeddings".to_string(),
            ok: provider_probe.is_ok(),
            detail: provider_probe.err().map(|e| e.to_string()),
        });

        components.push(ComponentHealth {
            name: "indexer".to_string(),
            ok: self.indexer.is_running(),
            detail: None,
        });

        let healthy = components.iter().filter(|c| c.ok).count();
        let status = if healthy == components.len() {
            HealthStatus::Ok
        } else if healthy > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Critical
        };

        HealthReport { status, components }
    }

    /// Stops background work. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn graph(&self) -> &GraphService {
        &self.graph
    }

    pub fn analytics(&self) -> &GraphAnalytics {
        &self.analytics
    }

    pub fn symbols(&self) -> &SymbolIndex {
        &self.symbols
    }

    pub fn impact(&self) -> &ImpactAnalyzer {
        &self.impact
    }

    pub fn embeddings(&self) -> &EmbeddingService {
        &self.embeddings
    }

    pub fn context(&self) -> &ContextBuilder {
        &self.context
    }

    pub fn indexer(&self) -> &IncrementalIndexer {
        &self.indexer
    }

    async fn combine_results(
        &self,
        response: &SearchResponse,
        query: &str,
        project_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RankedResult>> {
        let mut combined: Vec<RankedResult> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for node in &response.symbolic {
            if seen.insert(node.id.clone()) {
                combined.push(RankedResult::new(node.clone(), 1.0, ResultSource::Symbolic));
            }
        }

        let semantic_ids: Vec<String> = response
            .semantic
            .iter()
            .map(|c| c.node_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let nodes: Vec<GraphNode> = self.db.get_nodes_by_ids(&semantic_ids).await?;
        for chunk in &response.semantic {
            let Some(node) = nodes.iter().find(|n| n.id == chunk.node_id) else {
                continue;
            };
            if seen.insert(node.id.clone()) {
                combined.push(
                    RankedResult::new(node.clone(), chunk.score, ResultSource::Semantic)
                        .with_snippet(chunk.content.clone()),
                );
            }
        }

        for node in &response.text {
            if seen.insert(node.id.clone()) {
                combined.push(RankedResult::new(node.clone(), 0.5, ResultSource::Symbolic));
            }
        }

        if let Some(pid) = project_id {
            let flagged: HashSet<String> =
                self.db.nodes_with_diagnostics(pid).await?.into_iter().collect();
            for result in combined.iter_mut() {
                result.has_diagnostics = flagged.contains(&result.node.id);
            }
        }

        rerank(&mut combined, query, &RerankWeights::default());
        combined.truncate(limit);
        Ok(combined)
    }
}
