use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{content_key, TtlCache};
use crate::config::ContextConfig;
use crate::context::assemble::{assemble, CandidateItem};
use crate::context::rerank::rerank;
use crate::context::semantic::SemanticExpander;
use crate::context::symbolic::SymbolicRetriever;
use crate::db::{GraphBackend, Neighbor};
use crate::embeddings::EmbeddingService;
use crate::error::Result;
use crate::models::{
    ChunkType, ContextBundle, ContextOptions, Direction, NodeType, RankedResult, Relationship,
    SectionKind,
};

const MAX_HEADER_FILES: usize = 3;
const MAX_FOCUS_RESULTS: usize = 3;

/// The four-phase context pipeline: symbolic pre-filter, semantic
/// expansion, composite rerank, budgeted assembly. Bundles are cached
/// for a short TTL keyed by project, query and options.
pub struct ContextBuilder {
    db: Arc<dyn GraphBackend>,
    symbolic: SymbolicRetriever,
    semantic: SemanticExpander,
    cache: TtlCache<ContextBundle>,
    default_budget: usize,
}

impl ContextBuilder {
    pub fn new(
        db: Arc<dyn GraphBackend>,
        embeddings: Arc<EmbeddingService>,
        config: &ContextConfig,
    ) -> Self {
        Self {
            symbolic: SymbolicRetriever::new(Arc::clone(&db)),
            semantic: SemanticExpander::new(Arc::clone(&db), embeddings),
            cache: TtlCache::new(config.cache_size, Duration::from_secs(config.cache_ttl_secs)),
            default_budget: config.default_token_budget,
            db,
        }
    }

    pub async fn build_context(
        &self,
        query: &str,
        project_id: Option<&str>,
        options: &ContextOptions,
    ) -> Result<ContextBundle> {
        let budget = options.token_budget.unwrap_or(self.default_budget);
        let weights = options.weights.unwrap_or_default();

        let cache_key = format!(
            "{}:context:{}:{}:{}:{}",
            project_id.unwrap_or("_"),
            content_key(query),
            budget,
            options.include_diagnostics,
            options.include_examples,
        );
        // Custom weights bypass the cache so policy experiments see
        // fresh scores.
        let cacheable = options.weights.is_none();
        if cacheable {
            if let Some(hit) = self.cache.get(&cache_key) {
                return Ok(hit);
            }
        }

        // Phase 1: symbolic pre-filter (needs a project scope).
        let symbolic = match project_id {
            Some(pid) => self.symbolic.retrieve(query, pid).await?,
            None => Vec::new(),
        };

        // Phase 2: semantic expansion.
        let semantic = self.semantic.expand(query, project_id, &symbolic).await?;

        let mut results: Vec<RankedResult> = symbolic;
        results.extend(semantic);

        if let Some(pid) = project_id {
            let flagged: HashSet<String> =
                self.db.nodes_with_diagnostics(pid).await?.into_iter().collect();
            for result in results.iter_mut() {
                result.has_diagnostics = flagged.contains(&result.node.id);
            }
        }

        // Phase 3: composite rerank.
        rerank(&mut results, query, &weights);
        let result_count = results.len();
        debug!(query, result_count, "context retrieval complete");

        // Phase 4: budgeted assembly.
        let inputs = self.gather_sections(&results, options).await?;
        let bundle = assemble(query, project_id, budget, weights, result_count, inputs);

        if cacheable {
            self.cache.put(cache_key, bundle.clone());
        }
        Ok(bundle)
    }

    /// Renders an assembled bundle to a single text blob.
    pub fn format_for_ai(bundle: &ContextBundle) -> String {
        crate::context::assemble::format_for_ai(bundle)
    }

    pub fn invalidate_project(&self, project_id: &str) {
        self.cache.invalidate_prefix(&format!("{project_id}:"));
    }

    async fn gather_sections(
        &self,
        results: &[RankedResult],
        options: &ContextOptions,
    ) -> Result<Vec<(SectionKind, Vec<CandidateItem>)>> {
        let mut inputs: Vec<(SectionKind, Vec<CandidateItem>)> = Vec::new();

        inputs.push((SectionKind::FileHeaders, self.header_items(results).await?));
        inputs.push((SectionKind::TargetSymbols, Self::symbol_items(results)));
        inputs.push((SectionKind::Callers, self.caller_items(results).await?));
        inputs.push((SectionKind::Imports, self.import_items(results).await?));
        if options.include_diagnostics {
            inputs.push((
                SectionKind::Diagnostics,
                self.diagnostic_items(results).await?,
            ));
        }
        if options.include_examples {
            inputs.push((SectionKind::Examples, self.example_items(results).await?));
        }

        Ok(inputs)
    }

    async fn header_items(&self, results: &[RankedResult]) -> Result<Vec<CandidateItem>> {
        let mut paths: Vec<&str> = Vec::new();
        for result in results {
            if !paths.contains(&result.node.path.as_str()) {
                paths.push(&result.node.path);
            }
            if paths.len() >= MAX_HEADER_FILES {
                break;
            }
        }

        let mut items = Vec::new();
        for path in paths {
            let project_id = match results.first() {
                Some(r) => &r.node.project_id,
                None => continue,
            };
            let files = self.db.find_nodes_by_path(project_id, path).await?;
            let Some(file) = files.into_iter().find(|n| n.node_type == NodeType::File) else {
                continue;
            };
            let chunks = self.db.get_chunks_by_node(&file.id).await?;
            let Some(header) = chunks
                .into_iter()
                .find(|c| c.chunk_type == ChunkType::FileHeader)
            else {
                continue;
            };
            items.push(CandidateItem {
                node_id: Some(file.id),
                title: path.to_string(),
                content: header.content,
                score: 0.0,
            });
        }
        Ok(items)
    }

    fn symbol_items(results: &[RankedResult]) -> Vec<CandidateItem> {
        results
            .iter()
            .map(|result| {
                let node = &result.node;
                let content = result
                    .snippet
                    .clone()
                    .or_else(|| node.signature().map(str::to_string))
                    .unwrap_or_else(|| {
                        format!("{} {} defined in {}", node.node_type, node.name, node.path)
                    });
                CandidateItem {
                    node_id: Some(node.id.clone()),
                    title: format!("{} ({}) in {}", node.name, node.node_type, node.path),
                    content,
                    score: result.score,
                }
            })
            .collect()
    }

    async fn caller_items(&self, results: &[RankedResult]) -> Result<Vec<CandidateItem>> {
        let mut items = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for result in results.iter().take(MAX_FOCUS_RESULTS) {
            let neighbors = self
                .db
                .get_neighbors(&result.node.id, Some(Relationship::Calls), Direction::Incoming)
                .await?;
            for Neighbor { node, .. } in neighbors {
                if !seen.insert(node.id.clone()) {
                    continue;
                }
                items.push(CandidateItem {
                    node_id: Some(node.id.clone()),
                    title: format!("{} ({})", node.name, node.path),
                    content: node
                        .signature()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{} calls {}", node.name, result.node.name)),
                    score: result.score,
                });
            }
        }
        Ok(items)
    }

    async fn import_items(&self, results: &[RankedResult]) -> Result<Vec<CandidateItem>> {
        let mut items = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for result in results.iter().take(MAX_FOCUS_RESULTS) {
            for relationship in [Relationship::Imports, Relationship::Exports] {
                let neighbors = self
                    .db
                    .get_neighbors(&result.node.id, Some(relationship), Direction::Both)
                    .await?;
                for Neighbor { edge, node } in neighbors {
                    if !seen.insert(node.id.clone()) {
                        continue;
                    }
                    items.push(CandidateItem {
                        node_id: Some(node.id.clone()),
                        title: format!("{} ({})", node.name, node.path),
                        content: format!("{} {}", edge.relationship, node.path),
                        score: result.score,
                    });
                }
            }
        }
        Ok(items)
    }

    async fn diagnostic_items(&self, results: &[RankedResult]) -> Result<Vec<CandidateItem>> {
        let mut items = Vec::new();
        for result in results.iter().filter(|r| r.has_diagnostics) {
            for diagnostic in self.db.get_diagnostics_by_node(&result.node.id).await? {
                let location = match diagnostic.line {
                    Some(line) => format!("{}:{line}", result.node.path),
                    None => result.node.path.clone(),
                };
                items.push(CandidateItem {
                    node_id: Some(result.node.id.clone()),
                    title: format!("{} ({location})", diagnostic.severity),
                    content: diagnostic.message,
                    score: result.score,
                });
            }
        }
        Ok(items)
    }

    async fn example_items(&self, results: &[RankedResult]) -> Result<Vec<CandidateItem>> {
        let mut items = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for result in results.iter().take(MAX_FOCUS_RESULTS) {
            let references = self.db.get_references_to_symbol(&result.node.id).await?;
            for reference in references {
                if !seen.insert(reference.reference_node_id.clone()) {
                    continue;
                }
                let chunks = self
                    .db
                    .get_chunks_by_node(&reference.reference_node_id)
                    .await?;
                let Some(chunk) = chunks.into_iter().next() else {
                    continue;
                };
                items.push(CandidateItem {
                    node_id: Some(reference.reference_node_id),
                    title: format!("use of {}", result.node.name),
                    content: chunk.content,
                    score: result.score,
                });
            }
        }
        Ok(items)
    }
}
