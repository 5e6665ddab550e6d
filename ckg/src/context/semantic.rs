use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::db::{GraphBackend, Neighbor};
use crate::embeddings::EmbeddingService;
use crate::error::Result;
use crate::models::{Direction, RankedResult, ResultSource};

const NEIGHBOR_RELEVANCE: f32 = 0.6;
const SEMANTIC_LIMIT: u32 = 10;
const TOP_SYMBOLIC_FOR_EXPANSION: usize = 3;

/// Phase 2: vector-similarity retrieval plus 1-hop graph expansion around
/// the strongest symbolic hits.
pub struct SemanticExpander {
    db: Arc<dyn GraphBackend>,
    embeddings: Arc<EmbeddingService>,
}

impl SemanticExpander {
    pub fn new(db: Arc<dyn GraphBackend>, embeddings: Arc<EmbeddingService>) -> Self {
        Self { db, embeddings }
    }

    /// Similar chunks become results at their similarity score; the 1-hop
    /// neighborhood of the top symbolic results joins at a flat 0.6.
    /// Nodes already discovered symbolically are not re-added.
    pub async fn expand(
        &self,
        query: &str,
        project_id: Option<&str>,
        symbolic: &[RankedResult],
    ) -> Result<Vec<RankedResult>> {
        let mut seen: HashSet<String> = symbolic.iter().map(|r| r.node.id.clone()).collect();
        let mut results: Vec<RankedResult> = Vec::new();

        let chunks = self
            .embeddings
            .find_similar_chunks(query, project_id, SEMANTIC_LIMIT)
            .await?;
        debug!(hits = chunks.len(), "semantic chunk hits");

        let node_ids: Vec<String> = chunks
            .iter()
            .map(|c| c.node_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let nodes: HashMap<String, _> = self
            .db
            .get_nodes_by_ids(&node_ids)
            .await?
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();

        for chunk in chunks {
            let Some(node) = nodes.get(&chunk.node_id) else {
                continue;
            };
            if seen.insert(node.id.clone()) {
                results.push(
                    RankedResult::new(node.clone(), chunk.score, ResultSource::Semantic)
                        .with_snippet(chunk.content),
                );
            }
        }

        for symbolic_hit in symbolic.iter().take(TOP_SYMBOLIC_FOR_EXPANSION) {
            let neighbors = self
                .db
                .get_neighbors(&symbolic_hit.node.id, None, Direction::Both)
                .await?;
            for Neighbor { node, .. } in neighbors {
                if seen.insert(node.id.clone()) {
                    results.push(RankedResult::new(
                        node,
                        NEIGHBOR_RELEVANCE,
                        ResultSource::Semantic,
                    ));
                }
            }
        }

        Ok(results)
    }
}
